//! Error types for Rategate.
//!
//! Validation is fail-fast: the first problem found is returned with enough
//! context (custom rate name, route index and pattern) to locate it in the
//! configuration file.

use thiserror::Error;

/// Flat error taxonomy, independent of where in the configuration the error
/// was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UpstreamUrl,
    EmptyRoutes,
    RateSyntax,
    ReservedNameCollision,
    AmbiguousValidityRule,
    PatternCompile,
    UnknownRateBy,
    EmptyMethods,
    InvalidMethodName,
    Decode,
    Io,
}

/// A malformed rate expression such as `"1.5/minute"` or `"1/second"`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RateSyntaxError {
    #[error("rate {expr:?} is not in the form <capacity>/<unit>, for example 15/minute")]
    Format { expr: String },

    #[error("rate {expr:?} has capacity {capacity:?} which is not an integer")]
    InvalidCapacity { expr: String, capacity: String },

    #[error("rate {expr:?} has capacity {capacity} but capacity must be greater than zero")]
    NonPositiveCapacity { expr: String, capacity: i64 },

    #[error("rate {expr:?} uses unit {unit:?}; valid units are minute, hour and day")]
    UnknownUnit { expr: String, unit: String },
}

/// Errors raised while compiling a single custom rate dimension.
#[derive(Error, Debug)]
pub enum DimensionError {
    #[error("{name:?} is a predefined rate dimension and cannot be redefined")]
    ReservedName { name: String },

    #[error(
        "custom rate on header {header:?} must declare exactly one of ValidIfIn or \
         ValidIfMatchesRegex, found {declared}"
    )]
    AmbiguousValidityRule { header: String, declared: usize },

    #[error("cannot compile ValidIfMatchesRegex {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Errors raised while validating a single route.
#[derive(Error, Debug)]
pub enum RouteError {
    #[error("cannot compile Pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("route declares no methods")]
    EmptyMethods,

    #[error("method name {method:?} is invalid, only letters are allowed")]
    InvalidMethodName { method: String },

    #[error("rate by {name:?} is unknown, valid rate keys are {known:?}")]
    UnknownRateBy { name: String, known: Vec<String> },

    #[error("rate for {dimension:?} is invalid: {source}")]
    Rate {
        dimension: String,
        #[source]
        source: RateSyntaxError,
    },
}

/// Main error type for Rategate operations.
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("upstream url {url:?} is invalid: {reason}")]
    UpstreamUrl { url: String, reason: String },

    #[error("configuration declares no routes")]
    EmptyRoutes,

    #[error("custom rate {name:?}: {source}")]
    Dimension {
        name: String,
        #[source]
        source: DimensionError,
    },

    #[error("route #{index} ({pattern:?}): {source}")]
    Route {
        index: usize,
        pattern: String,
        #[source]
        source: RouteError,
    },

    /// JSON decoding errors
    #[error("cannot decode configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML decoding errors
    #[error("cannot decode configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Service settings errors
    #[error("settings error: {0}")]
    Settings(#[from] ::config::ConfigError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PolicyError {
    /// The taxonomy entry this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PolicyError::UpstreamUrl { .. } => ErrorKind::UpstreamUrl,
            PolicyError::EmptyRoutes => ErrorKind::EmptyRoutes,
            PolicyError::Dimension { source, .. } => match source {
                DimensionError::ReservedName { .. } => ErrorKind::ReservedNameCollision,
                DimensionError::AmbiguousValidityRule { .. } => ErrorKind::AmbiguousValidityRule,
                DimensionError::InvalidPattern { .. } => ErrorKind::PatternCompile,
            },
            PolicyError::Route { source, .. } => match source {
                RouteError::InvalidPattern { .. } => ErrorKind::PatternCompile,
                RouteError::EmptyMethods => ErrorKind::EmptyMethods,
                RouteError::InvalidMethodName { .. } => ErrorKind::InvalidMethodName,
                RouteError::UnknownRateBy { .. } => ErrorKind::UnknownRateBy,
                RouteError::Rate { .. } => ErrorKind::RateSyntax,
            },
            PolicyError::Json(_) | PolicyError::Yaml(_) | PolicyError::Settings(_) => {
                ErrorKind::Decode
            }
            PolicyError::Io(_) => ErrorKind::Io,
        }
    }
}

/// Result type alias for Rategate operations.
pub type Result<T> = std::result::Result<T, PolicyError>;
