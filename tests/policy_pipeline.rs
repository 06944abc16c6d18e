use std::sync::Arc;

use rategate::error::ErrorKind;
use rategate::policy::{
    compile_config, load_policy, validate_config, Configuration, Grouping, PolicyStore, Rate,
    TimeUnit,
};
use tempfile::tempdir;

const FULL_CONFIG: &str = r#"
{
  "Upstream": "http://127.0.0.1:8000",
  "Routes": [
    {
      "Methods": ["GET", "POST"],
      "Pattern": "^/api/",
      "Rates": { "IP": "30 / minute", "Frontend": "1000/hour" }
    },
    {
      "Methods": ["GET"],
      "Pattern": "^/static/",
      "Rates": { "IP": "500/day" }
    }
  ],
  "CustomRates": {
    "Frontend": {
      "Header": "Frontend-Auth",
      "ValidIfIn": ["validkey1", "validkey2"],
      "FailCode": 401,
      "FailMsg": "Unauthenticated"
    }
  }
}
"#;

#[test]
fn test_end_to_end_single_route() {
    let config = Configuration::from_json(
        r#"{ "Upstream": "http://localhost:8000",
             "Routes": [ { "Methods": ["GET"], "Pattern": "^/api/", "Rates": { "IP": "10/minute" } } ] }"#,
    )
    .unwrap();

    let policy = compile_config(&validate_config(&config).unwrap());
    assert_eq!(policy.routes().len(), 1);
    assert_eq!(
        policy.routes()[0].rate_for("IP"),
        Some(Rate::new(10, TimeUnit::Minute))
    );
}

#[test]
fn test_end_to_end_empty_routes() {
    let config =
        Configuration::from_json(r#"{ "Upstream": "http://localhost:8000", "Routes": [] }"#)
            .unwrap();
    let err = validate_config(&config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyRoutes);
}

#[test]
fn test_end_to_end_null_routes() {
    let config =
        Configuration::from_json(r#"{ "Upstream": "http://localhost:8000", "Routes": null }"#)
            .unwrap();
    let err = validate_config(&config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyRoutes);
}

#[test]
fn test_fail_code_passes_through() {
    let config = Configuration::from_json(
        r#"{ "Upstream": "http://localhost:8000",
             "Routes": [ { "Methods": ["GET"], "Pattern": "^/", "Rates": { "Key": "1/minute" } } ],
             "CustomRates": { "Key": { "Header": "X-K", "ValidIfIn": ["a"], "FailCode": 0 } } }"#,
    )
    .unwrap();
    let policy = compile_config(&validate_config(&config).unwrap());
    assert_eq!(policy.dimension("Key").unwrap().failure.code, 0);
}

#[test]
fn test_engine_view_of_policy() {
    let config = Configuration::from_json(FULL_CONFIG).unwrap();
    let policy = compile_config(&validate_config(&config).unwrap());

    let route = policy.route_for("POST", "/api/orders").unwrap();
    for (dimension, rate) in &route.rates {
        assert!(policy.dimension(dimension).is_some(), "{} has no dimension", dimension);
        assert!(rate.capacity > 0);
    }

    let frontend = policy.dimension("Frontend").unwrap();
    assert_eq!(frontend.header(), Some("Frontend-Auth"));
    assert!(frontend.is_valid("validkey1"));
    assert!(!frontend.is_valid("stolen"));
    assert_eq!(frontend.signature("validkey1"), "validkey1");

    let ip = policy.dimension("IP").unwrap();
    assert_eq!(ip.signature("203.0.113.9"), "203.0.113.9");

    assert!(policy.route_for("DELETE", "/api/orders").is_none());
    assert_eq!(policy.upstream().port(), Some(8000));
}

#[test]
fn test_load_policy_from_json_and_yaml_files() {
    let dir = tempdir().unwrap();

    let json_path = dir.path().join("conf.json");
    std::fs::write(&json_path, FULL_CONFIG).unwrap();
    let from_json = load_policy(&json_path).unwrap();

    let yaml_path = dir.path().join("conf.yaml");
    std::fs::write(
        &yaml_path,
        r#"
Upstream: http://127.0.0.1:8000
Routes:
  - Methods: [GET, POST]
    Pattern: "^/api/"
    Rates:
      IP: 30/minute
      Frontend: 1000/hour
  - Methods: [GET]
    Pattern: "^/static/"
    Rates:
      IP: 500/day
CustomRates:
  Frontend:
    Header: Frontend-Auth
    ValidIfIn: [validkey1, validkey2]
    FailCode: 401
    FailMsg: Unauthenticated
"#,
    )
    .unwrap();
    let from_yaml = load_policy(&yaml_path).unwrap();

    assert_eq!(from_json, from_yaml);
}

#[test]
fn test_load_policy_rejects_invalid_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("conf.json");
    std::fs::write(
        &path,
        r#"{ "Upstream": "http://localhost:8000",
             "Routes": [ { "Methods": ["GET"], "Pattern": "^/", "Rates": { "IP": "1.5/minute" } } ] }"#,
    )
    .unwrap();

    let err = load_policy(&path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateSyntax);
}

#[test]
fn test_load_policy_missing_file() {
    let err = load_policy("/nonexistent/conf.json").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn test_ambiguous_custom_rate_in_file() {
    let config = Configuration::from_json(
        r#"{ "Upstream": "http://localhost:8000",
             "Routes": [ { "Methods": ["GET"], "Pattern": "^/" } ],
             "CustomRates": { "Both": { "Header": "X-Key", "ValidIfIn": ["a"], "ValidIfMatchesRegex": ".*" } } }"#,
    )
    .unwrap();
    let err = validate_config(&config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AmbiguousValidityRule);
}

#[test]
fn test_store_shared_across_threads() {
    let config = Configuration::from_json(FULL_CONFIG).unwrap();
    let store = Arc::new(PolicyStore::new(compile_config(
        &validate_config(&config).unwrap(),
    )));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || store.snapshot().routes().len())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 2);
    }
}
