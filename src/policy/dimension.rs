//! Rate dimensions: how requests are grouped before a rate is applied.
//!
//! Two dimensions are built in: `IP` groups by client address and `JWT` is
//! reserved for grouping by authenticated identity. Operators add their own
//! header-based dimensions through `CustomRates`, each with a validity rule
//! that is either an allow list or a regular expression.

use regex::Regex;
use std::fmt;
use std::net::IpAddr;

use super::rules::CustomRateSpec;
use crate::error::DimensionError;

/// Name of the built-in client address dimension.
pub const IP_DIMENSION: &str = "IP";
/// Name of the built-in token identity dimension.
pub const JWT_DIMENSION: &str = "JWT";
/// Names no custom dimension may use.
pub const RESERVED_DIMENSIONS: [&str; 2] = [IP_DIMENSION, JWT_DIMENSION];

/// Returns true if `name` belongs to a built-in dimension.
pub fn is_reserved(name: &str) -> bool {
    RESERVED_DIMENSIONS.contains(&name)
}

/// The capability pair the serving engine needs from a dimension.
pub trait Grouping {
    /// Whether a request carrying `value` may be rate limited under this
    /// dimension at all. Invalid requests are rejected with the dimension's
    /// failure response.
    fn is_valid(&self, value: &str) -> bool;

    /// The group identity requests with `value` are counted under.
    fn signature(&self, value: &str) -> String;
}

/// A regular expression compiled once and compared by its source text.
#[derive(Clone)]
pub struct CompiledPattern(Regex);

impl CompiledPattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(CompiledPattern)
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.0.is_match(haystack)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl PartialEq for CompiledPattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for CompiledPattern {}

impl fmt::Debug for CompiledPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CompiledPattern").field(&self.as_str()).finish()
    }
}

/// How a custom header value is judged valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidityRule {
    /// The value must equal one of the listed values
    AnyOf(Vec<String>),
    /// The value must match the pattern
    Matches(CompiledPattern),
}

impl ValidityRule {
    pub fn is_valid(&self, value: &str) -> bool {
        match self {
            ValidityRule::AnyOf(values) => values.iter().any(|allowed| allowed == value),
            ValidityRule::Matches(pattern) => pattern.is_match(value),
        }
    }
}

/// Where a dimension reads its value from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DimensionSource {
    /// The client's network address
    ClientAddress,
    /// An authentication token carried in `header`
    AuthToken {
        header: String,
        user_claim: Option<String>,
    },
    /// A custom request header
    Header { name: String, rule: ValidityRule },
}

/// Response the serving engine returns when a value fails validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureResponse {
    pub code: u16,
    pub message: String,
}

/// A compiled rate dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateDimension {
    pub name: String,
    pub source: DimensionSource,
    pub failure: FailureResponse,
}

impl RateDimension {
    /// The built-in `IP` dimension.
    pub fn client_address() -> Self {
        Self {
            name: IP_DIMENSION.to_string(),
            source: DimensionSource::ClientAddress,
            failure: FailureResponse {
                code: 400,
                message: "cannot determine client address".to_string(),
            },
        }
    }

    /// The built-in `JWT` dimension.
    ///
    /// Token verification is not implemented yet, so no value is considered
    /// valid and requests on routes limited by `JWT` are refused.
    pub fn auth_token(header: &str, user_claim: Option<&str>) -> Self {
        Self {
            name: JWT_DIMENSION.to_string(),
            source: DimensionSource::AuthToken {
                header: header.to_string(),
                user_claim: user_claim.map(str::to_string),
            },
            failure: FailureResponse {
                code: 401,
                message: "unauthenticated".to_string(),
            },
        }
    }

    /// The request header this dimension reads, if any.
    pub fn header(&self) -> Option<&str> {
        match &self.source {
            DimensionSource::ClientAddress => None,
            DimensionSource::AuthToken { header, .. } => Some(header),
            DimensionSource::Header { name, .. } => Some(name),
        }
    }
}

impl Grouping for RateDimension {
    fn is_valid(&self, value: &str) -> bool {
        match &self.source {
            DimensionSource::ClientAddress => value.parse::<IpAddr>().is_ok(),
            DimensionSource::AuthToken { .. } => false,
            DimensionSource::Header { rule, .. } => rule.is_valid(value),
        }
    }

    fn signature(&self, value: &str) -> String {
        match &self.source {
            DimensionSource::ClientAddress => value
                .parse::<IpAddr>()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| value.to_string()),
            // Requests are grouped by the verbatim header value.
            DimensionSource::AuthToken { .. } | DimensionSource::Header { .. } => {
                value.to_string()
            }
        }
    }
}

/// Build a header-based dimension named `name` from its declaration.
pub fn compile_dimension(name: &str, spec: &CustomRateSpec) -> Result<RateDimension, DimensionError> {
    if is_reserved(&spec.header) {
        return Err(DimensionError::ReservedName {
            name: spec.header.clone(),
        });
    }

    let rule = match (spec.allow_list(), spec.pattern()) {
        (Some(values), None) => ValidityRule::AnyOf(values.to_vec()),
        (None, Some(pattern)) => {
            let compiled =
                CompiledPattern::new(pattern).map_err(|source| DimensionError::InvalidPattern {
                    pattern: pattern.to_string(),
                    source,
                })?;
            ValidityRule::Matches(compiled)
        }
        (allow_list, pattern) => {
            return Err(DimensionError::AmbiguousValidityRule {
                header: spec.header.clone(),
                declared: allow_list.is_some() as usize + pattern.is_some() as usize,
            })
        }
    };

    Ok(RateDimension {
        name: name.to_string(),
        source: DimensionSource::Header {
            name: spec.header.clone(),
            rule,
        },
        failure: FailureResponse {
            code: spec.fail_code,
            message: spec.fail_message.clone(),
        },
    })
}
