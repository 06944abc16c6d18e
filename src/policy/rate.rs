//! Rate expressions such as `"15/minute"`.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::RateSyntaxError;

/// Time unit a rate capacity is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Minute,
    Hour,
    Day,
}

impl TimeUnit {
    /// Get the wall-clock length of this unit.
    pub fn duration(&self) -> Duration {
        match self {
            TimeUnit::Minute => Duration::from_secs(60),
            TimeUnit::Hour => Duration::from_secs(3600),
            TimeUnit::Day => Duration::from_secs(86400),
        }
    }

    /// Match a unit name case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "minute" => Some(TimeUnit::Minute),
            "hour" => Some(TimeUnit::Hour),
            "day" => Some(TimeUnit::Day),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Minute => "minute",
            TimeUnit::Hour => "hour",
            TimeUnit::Day => "day",
        }
    }
}

/// A compiled rate: `capacity` requests per `unit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Rate {
    /// Number of requests allowed per unit, always greater than zero
    pub capacity: u64,
    /// The time unit
    pub unit: TimeUnit,
}

impl Rate {
    pub fn new(capacity: u64, unit: TimeUnit) -> Self {
        Self { capacity, unit }
    }

    /// Length of the window the capacity applies to.
    pub fn window(&self) -> Duration {
        self.unit.duration()
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.capacity, self.unit.as_str())
    }
}

impl FromStr for Rate {
    type Err = RateSyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_rate(s)
    }
}

/// Remove all whitespace from a rate expression, so `" 3/ minut e"` becomes
/// `"3/minute"`.
pub fn sanitize_rate(expr: &str) -> String {
    expr.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Parse a rate expression of the form `<capacity>/<unit>`.
pub fn parse_rate(expr: &str) -> Result<Rate, RateSyntaxError> {
    let sanitized = sanitize_rate(expr);
    let parts: Vec<&str> = sanitized.split('/').collect();
    let (capacity, unit) = match parts.as_slice() {
        [capacity, unit] => (*capacity, *unit),
        _ => {
            return Err(RateSyntaxError::Format {
                expr: expr.to_string(),
            })
        }
    };

    let capacity: i64 = capacity
        .parse()
        .map_err(|_| RateSyntaxError::InvalidCapacity {
            expr: expr.to_string(),
            capacity: capacity.to_string(),
        })?;
    if capacity <= 0 {
        return Err(RateSyntaxError::NonPositiveCapacity {
            expr: expr.to_string(),
            capacity,
        });
    }

    let unit = TimeUnit::from_name(unit).ok_or_else(|| RateSyntaxError::UnknownUnit {
        expr: expr.to_string(),
        unit: unit.to_string(),
    })?;

    Ok(Rate::new(capacity as u64, unit))
}
