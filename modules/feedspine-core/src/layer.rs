use serde::{Deserialize, Serialize};

/// Logical data-maturity tier. Totally ordered: `Bronze < Silver < Gold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Bronze,
    Silver,
    Gold,
}

impl Default for Layer {
    fn default() -> Self {
        Layer::Bronze
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Layer::Bronze => write!(f, "bronze"),
            Layer::Silver => write!(f, "silver"),
            Layer::Gold => write!(f, "gold"),
        }
    }
}

impl std::str::FromStr for Layer {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "bronze" => Ok(Layer::Bronze),
            "silver" => Ok(Layer::Silver),
            "gold" => Ok(Layer::Gold),
            other => Err(format!("unknown layer: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_order() {
        assert!(Layer::Bronze < Layer::Silver);
        assert!(Layer::Silver < Layer::Gold);
        assert!(Layer::Bronze < Layer::Gold);
    }

    #[test]
    fn round_trips_through_str() {
        for l in [Layer::Bronze, Layer::Silver, Layer::Gold] {
            let s = l.to_string();
            assert_eq!(s.parse::<Layer>().unwrap(), l);
        }
    }
}
