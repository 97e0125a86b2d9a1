use std::env;
use std::time::Duration;

const DEFAULT_DETECTOR_URL: &str = "https://serverless.roboflow.com/acne-detection-g5vvz/1";
const DEFAULT_DIRECT_CLASSIFIER_URL: &str = "https://designarshaq-acne9m.hf.space/predict";
const DEFAULT_SEVERITY_GRADER_URL: &str = "https://designarshaq-asgm-api.hf.space/predict";
const DEFAULT_GENAI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_GENAI_MODEL: &str = "gemini-1.5-flash";

const DEFAULT_ADAPTER_TIMEOUT_SECS: u64 = 40;
const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 20;
const DEFAULT_GENERATE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PLAN_TIMEOUT_SECS: u64 = 20;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
    #[error("Invalid URL for {key}: {source}")]
    InvalidUrl {
        key: String,
        #[source]
        source: url::ParseError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdapterTimeouts {
    pub detector: Duration,
    pub direct_classifier: Duration,
    pub generative: Duration,
    pub severity_grader: Duration,
    pub generative_upload: Duration,
    pub generative_generate: Duration,
    pub plan: Duration,
}

impl Default for AdapterTimeouts {
    fn default() -> Self {
        let adapter = Duration::from_secs(DEFAULT_ADAPTER_TIMEOUT_SECS);
        Self {
            detector: adapter,
            direct_classifier: adapter,
            generative: adapter,
            severity_grader: adapter,
            generative_upload: Duration::from_secs(DEFAULT_UPLOAD_TIMEOUT_SECS),
            generative_generate: Duration::from_secs(DEFAULT_GENERATE_TIMEOUT_SECS),
            plan: Duration::from_secs(DEFAULT_PLAN_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_host: String,
    pub port: u16,
    pub detector_url: String,
    pub detector_api_key: Option<String>,
    pub direct_classifier_url: String,
    pub severity_grader_url: String,
    pub genai_base_url: String,
    pub genai_api_key: Option<String>,
    pub genai_model: String,
    pub treatment_catalog_path: Option<String>,
    pub max_upload_bytes: usize,
    pub timeouts: AdapterTimeouts,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup so tests need not touch
    /// the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match get("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                key: "PORT".into(),
                value: raw,
            })?,
            None => 8081,
        };

        let max_upload_bytes = match get("MAX_UPLOAD_BYTES") {
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "MAX_UPLOAD_BYTES".into(),
                        value: raw,
                    });
                }
            },
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let defaults = AdapterTimeouts::default();
        let timeouts = AdapterTimeouts {
            detector: timeout_secs(&get, "DETECTOR_TIMEOUT_SECS", defaults.detector)?,
            direct_classifier: timeout_secs(
                &get,
                "DIRECT_CLASSIFIER_TIMEOUT_SECS",
                defaults.direct_classifier,
            )?,
            generative: timeout_secs(&get, "GENERATIVE_TIMEOUT_SECS", defaults.generative)?,
            severity_grader: timeout_secs(
                &get,
                "SEVERITY_GRADER_TIMEOUT_SECS",
                defaults.severity_grader,
            )?,
            generative_upload: timeout_secs(
                &get,
                "GENERATIVE_UPLOAD_TIMEOUT_SECS",
                defaults.generative_upload,
            )?,
            generative_generate: timeout_secs(
                &get,
                "GENERATIVE_GENERATE_TIMEOUT_SECS",
                defaults.generative_generate,
            )?,
            plan: timeout_secs(&get, "PLAN_TIMEOUT_SECS", defaults.plan)?,
        };

        Ok(Self {
            bind_host: get("BIND_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            detector_url: url_or_default(&get, "DETECTOR_URL", DEFAULT_DETECTOR_URL)?,
            detector_api_key: get("DETECTOR_API_KEY"),
            direct_classifier_url: url_or_default(
                &get,
                "DIRECT_CLASSIFIER_URL",
                DEFAULT_DIRECT_CLASSIFIER_URL,
            )?,
            severity_grader_url: url_or_default(
                &get,
                "SEVERITY_GRADER_URL",
                DEFAULT_SEVERITY_GRADER_URL,
            )?,
            genai_base_url: url_or_default(&get, "GENAI_BASE_URL", DEFAULT_GENAI_BASE_URL)?,
            genai_api_key: get("GENAI_API_KEY"),
            genai_model: get("GENAI_MODEL").unwrap_or_else(|| DEFAULT_GENAI_MODEL.to_string()),
            treatment_catalog_path: get("TREATMENT_CATALOG_PATH"),
            max_upload_bytes,
            timeouts,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }

    /// Names of credentials that are not set. Requests still run; the affected
    /// adapters will record HTTP failures.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.detector_api_key.is_none() {
            missing.push("DETECTOR_API_KEY");
        }
        if self.genai_api_key.is_none() {
            missing.push("GENAI_API_KEY");
        }
        missing
    }
}

fn timeout_secs<G>(get: &G, key: &str, default: Duration) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => match raw.parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
        },
    }
}

fn url_or_default<G>(get: &G, key: &str, default: &str) -> Result<String, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let value = get(key).unwrap_or_else(|| default.to_string());
    url::Url::parse(&value).map_err(|source| ConfigError::InvalidUrl {
        key: key.to_string(),
        source,
    })?;
    Ok(value.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 8081);
        assert_eq!(config.bind_address(), "0.0.0.0:8081");
        assert_eq!(config.timeouts, AdapterTimeouts::default());
        assert_eq!(config.timeouts.detector, Duration::from_secs(40));
        assert_eq!(config.timeouts.generative_upload, Duration::from_secs(20));
        assert_eq!(config.genai_model, "gemini-1.5-flash");
        assert_eq!(
            config.missing_credentials(),
            vec!["DETECTOR_API_KEY", "GENAI_API_KEY"]
        );
    }

    #[test]
    fn per_adapter_timeout_overrides() {
        let config = config_from(&[
            ("GENERATIVE_TIMEOUT_SECS", "12"),
            ("SEVERITY_GRADER_TIMEOUT_SECS", " 5 "),
        ])
        .unwrap();
        assert_eq!(config.timeouts.generative, Duration::from_secs(12));
        assert_eq!(config.timeouts.severity_grader, Duration::from_secs(5));
        assert_eq!(config.timeouts.detector, Duration::from_secs(40));
    }

    #[test]
    fn zero_or_garbage_timeout_is_rejected() {
        assert!(matches!(
            config_from(&[("DETECTOR_TIMEOUT_SECS", "0")]),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config_from(&[("PLAN_TIMEOUT_SECS", "soon")]),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn invalid_url_is_rejected() {
        assert!(matches!(
            config_from(&[("DETECTOR_URL", "not a url")]),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let config = config_from(&[("GENAI_BASE_URL", "http://localhost:9000/")]).unwrap();
        assert_eq!(config.genai_base_url, "http://localhost:9000");
    }
}
