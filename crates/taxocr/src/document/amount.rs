use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A monetary amount in whole currency units.
///
/// Model output is inconsistent about number formatting, so deserialization
/// is lenient: integers and floats are truncated, strings may carry
/// thousands separators or spaces, and blanks, `-`, `null` or anything
/// unparseable read as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Amount(pub i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn value(self) -> i64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Lenient conversion from an arbitrary JSON value.
    pub fn from_json(value: &Value) -> Amount {
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map(Amount)
                .unwrap_or_default(),
            Value::String(s) => Amount::parse_lenient(s),
            _ => Amount::ZERO,
        }
    }

    pub fn parse_lenient(raw: &str) -> Amount {
        let cleaned: String = raw
            .chars()
            .filter(|c| *c != ',' && !c.is_whitespace())
            .collect();
        if cleaned.is_empty() || cleaned == "-" {
            return Amount::ZERO;
        }
        cleaned
            .parse::<i64>()
            .ok()
            .or_else(|| cleaned.parse::<f64>().ok().map(|f| f as i64))
            .map(Amount)
            .unwrap_or_default()
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(Amount::from_json(&value))
    }
}

impl From<i64> for Amount {
    fn from(v: i64) -> Self {
        Amount(v)
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_sub(rhs.0))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
