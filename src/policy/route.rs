//! Route validation and the compiled route form.

use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

use super::dimension::CompiledPattern;
use super::rate::{parse_rate, Rate};
use super::rules::RouteSpec;
use crate::error::RouteError;

/// A route ready for request matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledRoute {
    /// Pattern matched against the request path
    pub pattern: CompiledPattern,
    /// Upper-cased method names
    pub methods: BTreeSet<String>,
    /// Dimension name to rate
    pub rates: BTreeMap<String, Rate>,
}

impl CompiledRoute {
    /// Whether a request with this method and path falls under the route.
    pub fn matches(&self, method: &str, path: &str) -> bool {
        self.methods.contains(&method.to_ascii_uppercase()) && self.pattern.is_match(path)
    }

    /// The rate applied under `dimension`, if the route limits by it.
    pub fn rate_for(&self, dimension: &str) -> Option<Rate> {
        self.rates.get(dimension).copied()
    }
}

/// HTTP method names are letters only.
pub fn is_valid_method(method: &str) -> bool {
    !method.is_empty() && method.chars().all(|c| c.is_ascii_alphabetic())
}

/// Validate a route against the set of dimensions it may reference and
/// return its compiled form.
pub fn validate_route(
    route: &RouteSpec,
    known_dimensions: &BTreeSet<String>,
) -> Result<CompiledRoute, RouteError> {
    let pattern =
        CompiledPattern::new(&route.pattern).map_err(|source| RouteError::InvalidPattern {
            pattern: route.pattern.clone(),
            source,
        })?;

    if route.methods.is_empty() {
        return Err(RouteError::EmptyMethods);
    }
    let mut methods = BTreeSet::new();
    for method in &route.methods {
        if !is_valid_method(method) {
            return Err(RouteError::InvalidMethodName {
                method: method.clone(),
            });
        }
        methods.insert(method.to_ascii_uppercase());
    }

    let mut rates = BTreeMap::new();
    for (dimension, expr) in &route.rates {
        if !known_dimensions.contains(dimension) {
            return Err(RouteError::UnknownRateBy {
                name: dimension.clone(),
                known: known_dimensions.iter().cloned().collect(),
            });
        }
        let rate = parse_rate(expr).map_err(|source| RouteError::Rate {
            dimension: dimension.clone(),
            source,
        })?;
        rates.insert(dimension.clone(), rate);
    }

    trace!(
        pattern = %route.pattern,
        methods = ?methods,
        rates = rates.len(),
        "Route validated"
    );

    Ok(CompiledRoute {
        pattern,
        methods,
        rates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RateSyntaxError;
    use crate::policy::rate::TimeUnit;

    fn known() -> BTreeSet<String> {
        ["IP", "JWT", "Frontend"]
            .iter()
            .map(|name| name.to_string())
            .collect()
    }

    fn route(methods: &[&str], pattern: &str, rates: &[(&str, &str)]) -> RouteSpec {
        RouteSpec {
            methods: methods.iter().map(|m| m.to_string()).collect(),
            pattern: pattern.to_string(),
            rates: rates
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_valid_route() {
        let spec = route(&["get", "POST"], "^/api/", &[("IP", "10/minute"), ("Frontend", "5/day")]);
        let compiled = validate_route(&spec, &known()).unwrap();

        assert_eq!(compiled.pattern.as_str(), "^/api/");
        assert!(compiled.methods.contains("GET"));
        assert!(compiled.methods.contains("POST"));
        assert_eq!(compiled.rate_for("IP"), Some(Rate::new(10, TimeUnit::Minute)));
        assert_eq!(compiled.rate_for("Frontend"), Some(Rate::new(5, TimeUnit::Day)));
        assert_eq!(compiled.rate_for("JWT"), None);
    }

    #[test]
    fn test_route_without_rates_is_valid() {
        let spec = route(&["GET"], "^/health$", &[]);
        let compiled = validate_route(&spec, &known()).unwrap();
        assert!(compiled.rates.is_empty());
    }

    #[test]
    fn test_invalid_pattern() {
        let spec = route(&["GET"], "^/api/(", &[]);
        let err = validate_route(&spec, &known()).unwrap_err();
        assert!(matches!(err, RouteError::InvalidPattern { .. }));
    }

    #[test]
    fn test_empty_methods() {
        let spec = route(&[], "^/", &[]);
        let err = validate_route(&spec, &known()).unwrap_err();
        assert!(matches!(err, RouteError::EmptyMethods));
    }

    #[test]
    fn test_invalid_method_names() {
        for method in ["PATCH2", "GET POST", "", "DE-LETE", "*"] {
            let spec = route(&["GET", method], "^/", &[]);
            let err = validate_route(&spec, &known()).unwrap_err();
            assert!(
                matches!(err, RouteError::InvalidMethodName { method: ref m } if m == method),
                "method {:?} should be rejected",
                method
            );
        }
    }

    #[test]
    fn test_unknown_rate_by() {
        let spec = route(&["GET"], "^/", &[("Backend", "10/minute")]);
        let err = validate_route(&spec, &known()).unwrap_err();
        match err {
            RouteError::UnknownRateBy { name, known } => {
                assert_eq!(name, "Backend");
                assert_eq!(known, vec!["Frontend", "IP", "JWT"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bad_rate_expression() {
        let spec = route(&["GET"], "^/", &[("IP", "10/second")]);
        let err = validate_route(&spec, &known()).unwrap_err();
        assert!(matches!(
            err,
            RouteError::Rate {
                source: RateSyntaxError::UnknownUnit { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_route_matching() {
        let spec = route(&["GET", "HEAD"], "^/api/", &[("IP", "10/minute")]);
        let compiled = validate_route(&spec, &known()).unwrap();

        assert!(compiled.matches("GET", "/api/users"));
        assert!(compiled.matches("head", "/api/"));
        assert!(!compiled.matches("POST", "/api/users"));
        assert!(!compiled.matches("GET", "/static/app.js"));
    }

    #[test]
    fn test_duplicate_methods_collapse() {
        let spec = route(&["GET", "get", "Get"], "^/", &[]);
        let compiled = validate_route(&spec, &known()).unwrap();
        assert_eq!(compiled.methods.len(), 1);
    }
}
