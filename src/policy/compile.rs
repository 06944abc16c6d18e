//! Assembly of the runtime policy set handed to the serving engine.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};
use url::Url;

use super::dimension::{
    DimensionSource, RateDimension, ValidityRule, IP_DIMENSION, JWT_DIMENSION,
};
use super::route::CompiledRoute;
use super::validate::ValidatedConfig;

/// The immutable, compiled rate limit policy.
///
/// Routes keep their declaration order; the engine uses the first route that
/// matches a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePolicySet {
    upstream: Url,
    routes: Vec<CompiledRoute>,
    dimensions: BTreeMap<String, RateDimension>,
}

impl RuntimePolicySet {
    /// Where allowed requests are forwarded.
    pub fn upstream(&self) -> &Url {
        &self.upstream
    }

    pub fn routes(&self) -> &[CompiledRoute] {
        &self.routes
    }

    /// All dimensions, built-in ones included, keyed by name.
    pub fn dimensions(&self) -> &BTreeMap<String, RateDimension> {
        &self.dimensions
    }

    pub fn dimension(&self, name: &str) -> Option<&RateDimension> {
        self.dimensions.get(name)
    }

    /// Find the first route covering this method and path.
    pub fn route_for(&self, method: &str, path: &str) -> Option<&CompiledRoute> {
        self.routes.iter().find(|route| route.matches(method, path))
    }

    /// A serializable view of the policy for display.
    pub fn summary(&self) -> PolicySummary {
        PolicySummary {
            upstream: self.upstream.to_string(),
            routes: self
                .routes
                .iter()
                .map(|route| RouteSummary {
                    pattern: route.pattern.as_str().to_string(),
                    methods: route.methods.iter().cloned().collect(),
                    rates: route
                        .rates
                        .iter()
                        .map(|(name, rate)| (name.clone(), rate.to_string()))
                        .collect(),
                })
                .collect(),
            dimensions: self.dimensions.values().map(DimensionSummary::from).collect(),
        }
    }
}

/// Build the runtime policy from a validated configuration.
///
/// Validation already compiled every pattern and rate, so this cannot fail.
pub fn compile_config(validated: &ValidatedConfig) -> RuntimePolicySet {
    let mut dimensions = validated.custom_dimensions.clone();
    dimensions.insert(IP_DIMENSION.to_string(), RateDimension::client_address());
    dimensions.insert(
        JWT_DIMENSION.to_string(),
        RateDimension::auth_token(&validated.jwt_header, validated.jwt_user_claim.as_deref()),
    );

    for (index, route) in validated.routes.iter().enumerate() {
        if route.rates.contains_key(JWT_DIMENSION) {
            warn!(
                index = index,
                pattern = %route.pattern.as_str(),
                "Route limits by JWT, which is not implemented; its requests will be refused"
            );
        }
    }

    info!(
        routes = validated.routes.len(),
        dimensions = dimensions.len(),
        "Rate limit policy compiled"
    );

    RuntimePolicySet {
        upstream: validated.upstream.clone(),
        routes: validated.routes.clone(),
        dimensions,
    }
}

/// Serializable view of a `RuntimePolicySet`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicySummary {
    pub upstream: String,
    pub routes: Vec<RouteSummary>,
    pub dimensions: Vec<DimensionSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteSummary {
    pub pattern: String,
    pub methods: Vec<String>,
    pub rates: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DimensionSummary {
    pub name: String,
    pub source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_if_in: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_if_matches_regex: Option<String>,
    pub fail_code: u16,
    pub fail_message: String,
}

impl From<&RateDimension> for DimensionSummary {
    fn from(dimension: &RateDimension) -> Self {
        let (source, valid_if_in, valid_if_matches_regex) = match &dimension.source {
            DimensionSource::ClientAddress => ("client_address", None, None),
            DimensionSource::AuthToken { .. } => ("auth_token", None, None),
            DimensionSource::Header { rule, .. } => match rule {
                ValidityRule::AnyOf(values) => ("header", Some(values.clone()), None),
                ValidityRule::Matches(pattern) => {
                    ("header", None, Some(pattern.as_str().to_string()))
                }
            },
        };
        Self {
            name: dimension.name.clone(),
            source,
            header: dimension.header().map(str::to_string),
            valid_if_in,
            valid_if_matches_regex,
            fail_code: dimension.failure.code,
            fail_message: dimension.failure.message.clone(),
        }
    }
}
