//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services.
//! Nothing in this crate reads process-wide environment variables while handling a request;
//! the binaries read the environment and hand the raw values to the functions below.

use crate::body_part::BodyPart;
use crate::constants::{DEFAULT_DATA_DIR, DEFAULT_GATEWAY_MODEL, DEFAULT_GATEWAY_URL};
use crate::{ConfigError, ConfigResult};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use vdd_types::NonEmptyText;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    oracle: OracleConfig,
    scope: AnalysisScope,
}

impl CoreConfig {
    pub fn new(data_dir: PathBuf, oracle: OracleConfig, scope: AnalysisScope) -> Self {
        Self {
            data_dir,
            oracle,
            scope,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn oracle(&self) -> &OracleConfig {
        &self.oracle
    }

    pub fn scope(&self) -> &AnalysisScope {
        &self.scope
    }
}

/// Connection settings for the AI gateway.
#[derive(Clone)]
pub struct OracleConfig {
    endpoint: reqwest::Url,
    model: NonEmptyText,
    api_key: Option<NonEmptyText>,
}

impl OracleConfig {
    /// Create a new `OracleConfig`.
    ///
    /// A missing `api_key` is accepted here; the client refuses to make calls without it.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] if the endpoint is not an absolute http(s) URL or the
    /// model name is blank.
    pub fn new(endpoint: &str, model: &str, api_key: Option<String>) -> ConfigResult<Self> {
        let endpoint = reqwest::Url::parse(endpoint.trim())
            .map_err(|e| ConfigError::Invalid(format!("gateway URL '{}': {}", endpoint, e)))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "gateway URL must use http or https, got '{}'",
                endpoint.scheme()
            )));
        }
        let model = NonEmptyText::new(model)
            .map_err(|_| ConfigError::Invalid("gateway model cannot be empty".into()))?;

        Ok(Self {
            endpoint,
            model,
            api_key: NonEmptyText::from_optional(api_key),
        })
    }

    pub fn endpoint(&self) -> &reqwest::Url {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        self.model.as_str()
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_ref().map(NonEmptyText::as_str)
    }
}

// Keeps the credential out of logs.
impl std::fmt::Debug for OracleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("model", &self.model.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Which nutrients the analysis may report on, per body part.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisScope {
    vitamins_only: bool,
    nutrients: BTreeMap<BodyPart, Vec<String>>,
}

#[derive(Deserialize)]
struct ScopeFile {
    #[serde(default)]
    vitamins_only: Option<bool>,
    #[serde(default)]
    nutrients: BTreeMap<BodyPart, Vec<String>>,
}

impl Default for AnalysisScope {
    fn default() -> Self {
        let mut nutrients = BTreeMap::new();
        nutrients.insert(
            BodyPart::Skin,
            vec!["Vitamin A".into(), "Vitamin C".into(), "Vitamin E".into()],
        );
        nutrients.insert(BodyPart::Eyes, vec!["Vitamin A".into(), "Vitamin B".into()]);
        nutrients.insert(BodyPart::Tongue, vec!["Vitamin B".into()]);
        nutrients.insert(BodyPart::Nails, vec!["Vitamin C".into()]);
        Self {
            vitamins_only: true,
            nutrients,
        }
    }
}

impl AnalysisScope {
    /// Parse a scope from YAML.
    ///
    /// Body parts absent from the document keep their default nutrients.
    ///
    /// ```yaml
    /// vitamins_only: false
    /// nutrients:
    ///   nails: [Vitamin C, Iron, Zinc]
    /// ```
    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        let file: ScopeFile = serde_yaml::from_str(yaml).map_err(ConfigError::ScopeParse)?;
        let mut scope = Self::default();

        if let Some(vitamins_only) = file.vitamins_only {
            scope.vitamins_only = vitamins_only;
        }

        for (part, list) in file.nutrients {
            let cleaned: Vec<String> = list
                .into_iter()
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect();
            if cleaned.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "analysis scope for '{}' lists no nutrients",
                    part
                )));
            }
            scope.nutrients.insert(part, cleaned);
        }

        Ok(scope)
    }

    pub fn vitamins_only(&self) -> bool {
        self.vitamins_only
    }

    pub fn nutrients_for(&self, part: BodyPart) -> &[String] {
        self.nutrients.get(&part).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Build the oracle configuration from optional environment values, applying defaults.
pub fn oracle_config_from_env_values(
    url: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
) -> ConfigResult<OracleConfig> {
    let url = non_blank(url).unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string());
    let model = non_blank(model).unwrap_or_else(|| DEFAULT_GATEWAY_MODEL.to_string());
    OracleConfig::new(&url, &model, api_key)
}

/// Load the analysis scope from an optional file path.
///
/// If `value` is `None` or blank, returns the default scope.
pub fn scope_from_env_value(value: Option<String>) -> ConfigResult<AnalysisScope> {
    match non_blank(value) {
        None => Ok(AnalysisScope::default()),
        Some(path) => {
            let path = PathBuf::from(path);
            let yaml =
                std::fs::read_to_string(&path).map_err(|source| ConfigError::ScopeFileRead {
                    path: path.clone(),
                    source,
                })?;
            AnalysisScope::from_yaml(&yaml)
        }
    }
}

/// Resolve the data directory, falling back to [`DEFAULT_DATA_DIR`].
pub fn data_dir_from_env_value(value: Option<String>) -> PathBuf {
    PathBuf::from(non_blank(value).unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
