//! Declarative rate limit configuration as written by operators.
//!
//! This module only decodes; semantic checks live in `validate` and the
//! runtime form is produced by `compile`. Field names follow the PascalCase
//! JSON format:
//!
//! ```json
//! {
//!   "Upstream": "http://localhost:8000",
//!   "Routes": [
//!     { "Methods": ["GET"], "Pattern": "^/api/", "Rates": { "IP": "10/minute" } }
//!   ],
//!   "CustomRates": {
//!     "Frontend": { "Header": "Frontend-Auth", "ValidIfIn": ["key1"], "FailCode": 401 }
//!   }
//! }
//! ```

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::info;

use crate::error::Result;

/// Default header carrying the authentication token for the `JWT` dimension.
pub const DEFAULT_JWT_HEADER: &str = "Authorization";

/// Default HTTP status returned when a header fails its validity rule.
pub const DEFAULT_FAIL_CODE: u16 = 400;

/// A complete rate limit configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Configuration {
    /// URL requests are forwarded to
    #[serde(default)]
    pub upstream: String,
    /// Routes in match order
    #[serde(default, deserialize_with = "null_as_default")]
    pub routes: Vec<RouteSpec>,
    /// Custom rate dimensions keyed by name
    #[serde(default, deserialize_with = "unique_custom_rates")]
    pub custom_rates: BTreeMap<String, CustomRateSpec>,
    /// Header holding the token for the `JWT` dimension
    #[serde(default, rename = "JWTAuthHeaderName")]
    pub jwt_auth_header_name: Option<String>,
    /// Token claim identifying the user for the `JWT` dimension
    #[serde(default, rename = "JWTAuthGetUserBy")]
    pub jwt_auth_get_user_by: Option<String>,
}

/// A route: which requests it covers and the rates applied to them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RouteSpec {
    /// HTTP methods covered by this route
    #[serde(default, deserialize_with = "null_as_default")]
    pub methods: Vec<String>,
    /// Regular expression matched against the request path
    #[serde(default)]
    pub pattern: String,
    /// Rate dimension name to rate expression
    #[serde(default, deserialize_with = "null_as_default")]
    pub rates: BTreeMap<String, String>,
}

/// A header-based rate dimension declared by the operator.
///
/// Exactly one of `valid_if_in` and `valid_if_matches_regex` must be
/// populated. Empty values count as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomRateSpec {
    /// Header whose value identifies the group
    #[serde(default)]
    pub header: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_if_matches_regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_if_in: Option<Vec<String>>,
    /// Status returned when the header value is invalid
    #[serde(default = "default_fail_code")]
    pub fail_code: u16,
    /// Body returned when the header value is invalid
    #[serde(default, rename = "FailMsg")]
    pub fail_message: String,
}

fn default_fail_code() -> u16 {
    DEFAULT_FAIL_CODE
}

impl Default for CustomRateSpec {
    fn default() -> Self {
        Self {
            header: String::new(),
            valid_if_matches_regex: None,
            valid_if_in: None,
            fail_code: DEFAULT_FAIL_CODE,
            fail_message: String::new(),
        }
    }
}

impl CustomRateSpec {
    /// The declared regex rule, if non-empty.
    pub fn pattern(&self) -> Option<&str> {
        self.valid_if_matches_regex
            .as_deref()
            .filter(|pattern| !pattern.is_empty())
    }

    /// The declared allow list, if non-empty.
    pub fn allow_list(&self) -> Option<&[String]> {
        self.valid_if_in
            .as_deref()
            .filter(|values| !values.is_empty())
    }
}

impl Configuration {
    /// Load configuration from a file, choosing the decoder by extension.
    ///
    /// `.yaml` and `.yml` files are read as YAML, anything else as JSON.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading rate limit configuration");

        let contents = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&contents),
            _ => Self::from_json(&contents),
        }
    }

    /// Load configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Header name used by the `JWT` dimension.
    pub fn jwt_header(&self) -> &str {
        self.jwt_auth_header_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_JWT_HEADER)
    }
}

/// Custom rates map that refuses to let a later entry overwrite an earlier one.
struct UniqueRates(BTreeMap<String, CustomRateSpec>);

impl<'de> Deserialize<'de> for UniqueRates {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct UniqueRatesVisitor;

        impl<'de> Visitor<'de> for UniqueRatesVisitor {
            type Value = UniqueRates;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of custom rate names to custom rates")
            }

            fn visit_map<A>(self, mut access: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut rates = BTreeMap::new();
                while let Some((name, spec)) = access.next_entry::<String, CustomRateSpec>()? {
                    if rates.contains_key(&name) {
                        return Err(de::Error::custom(format!(
                            "duplicate custom rate {:?}",
                            name
                        )));
                    }
                    rates.insert(name, spec);
                }
                Ok(UniqueRates(rates))
            }
        }

        deserializer.deserialize_map(UniqueRatesVisitor)
    }
}

/// Decode an explicit `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn unique_custom_rates<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, CustomRateSpec>, D::Error>
where
    D: Deserializer<'de>,
{
    let rates = Option::<UniqueRates>::deserialize(deserializer)?;
    Ok(rates.map(|rates| rates.0).unwrap_or_default())
}
