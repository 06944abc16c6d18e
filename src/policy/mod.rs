//! Rate limit policy: decoding, validation and compilation.
//!
//! ```text
//! Configuration (decoded JSON/YAML)
//!     → validate_config (fail-fast checks, patterns compiled once)
//!     → ValidatedConfig
//!     → compile_config (adds built-in dimensions)
//!     → RuntimePolicySet (immutable, handed to the serving engine)
//! ```

mod compile;
mod dimension;
mod rate;
mod route;
mod rules;
mod store;
mod validate;

use std::path::Path;

pub use compile::{compile_config, DimensionSummary, PolicySummary, RouteSummary, RuntimePolicySet};
pub use dimension::{
    compile_dimension, is_reserved, CompiledPattern, DimensionSource, FailureResponse, Grouping,
    RateDimension, ValidityRule, IP_DIMENSION, JWT_DIMENSION, RESERVED_DIMENSIONS,
};
pub use rate::{parse_rate, sanitize_rate, Rate, TimeUnit};
pub use route::{is_valid_method, validate_route, CompiledRoute};
pub use rules::{Configuration, CustomRateSpec, RouteSpec, DEFAULT_FAIL_CODE, DEFAULT_JWT_HEADER};
pub use store::PolicyStore;
pub use validate::{known_dimensions, parse_upstream, validate_config, ValidatedConfig};

use crate::error::Result;

/// Read, validate and compile the configuration at `path`.
pub fn load_policy<P: AsRef<Path>>(path: P) -> Result<RuntimePolicySet> {
    let config = Configuration::from_file(path)?;
    let validated = validate_config(&config)?;
    Ok(compile_config(&validated))
}
