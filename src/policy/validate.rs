//! Whole-configuration validation.
//!
//! Checks run in a fixed order and stop at the first failure:
//! upstream URL, presence of routes, every custom rate, then every route.
//! The full set of dimension names is collected before any route is looked
//! at, so a route may reference a custom rate regardless of where it is
//! declared.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};
use url::Url;

use super::dimension::{compile_dimension, is_reserved, RateDimension, RESERVED_DIMENSIONS};
use super::route::{validate_route, CompiledRoute};
use super::rules::Configuration;
use crate::error::{DimensionError, PolicyError, Result};

/// A configuration that passed validation, holding the pieces compiled
/// along the way. Only `validate_config` constructs one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedConfig {
    pub(crate) upstream: Url,
    pub(crate) custom_dimensions: BTreeMap<String, RateDimension>,
    pub(crate) routes: Vec<CompiledRoute>,
    pub(crate) jwt_header: String,
    pub(crate) jwt_user_claim: Option<String>,
}

impl ValidatedConfig {
    pub fn upstream(&self) -> &Url {
        &self.upstream
    }
}

/// Names a route may use as a rate key: the built-in dimensions plus every
/// declared custom rate.
pub fn known_dimensions(config: &Configuration) -> BTreeSet<String> {
    RESERVED_DIMENSIONS
        .iter()
        .map(|name| name.to_string())
        .chain(config.custom_rates.keys().cloned())
        .collect()
}

/// Parse the upstream target, requiring a host.
pub fn parse_upstream(upstream: &str) -> Result<Url> {
    let url = Url::parse(upstream).map_err(|e| PolicyError::UpstreamUrl {
        url: upstream.to_string(),
        reason: e.to_string(),
    })?;
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(PolicyError::UpstreamUrl {
            url: upstream.to_string(),
            reason: "url has no host".to_string(),
        }),
    }
}

/// Validate a configuration, returning the first error found.
pub fn validate_config(config: &Configuration) -> Result<ValidatedConfig> {
    let upstream = parse_upstream(&config.upstream)?;

    if config.routes.is_empty() {
        return Err(PolicyError::EmptyRoutes);
    }

    let known = known_dimensions(config);
    let mut custom_dimensions = BTreeMap::new();
    for (name, spec) in &config.custom_rates {
        if is_reserved(name) {
            return Err(PolicyError::Dimension {
                name: name.clone(),
                source: DimensionError::ReservedName { name: name.clone() },
            });
        }
        let dimension = compile_dimension(name, spec).map_err(|source| PolicyError::Dimension {
            name: name.clone(),
            source,
        })?;
        debug!(name = %name, header = %spec.header, "Custom rate validated");
        custom_dimensions.insert(name.clone(), dimension);
    }

    let mut routes = Vec::with_capacity(config.routes.len());
    for (index, route) in config.routes.iter().enumerate() {
        let compiled = validate_route(route, &known).map_err(|source| PolicyError::Route {
            index,
            pattern: route.pattern.clone(),
            source,
        })?;
        routes.push(compiled);
    }

    info!(
        upstream = %upstream,
        routes = routes.len(),
        custom_rates = custom_dimensions.len(),
        "Configuration validated"
    );

    Ok(ValidatedConfig {
        upstream,
        custom_dimensions,
        routes,
        jwt_header: config.jwt_header().to_string(),
        jwt_user_claim: config.jwt_auth_get_user_by.clone(),
    })
}
