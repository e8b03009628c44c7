use facematch_core::{default_model_dir, Backend, Metric, PipelineConfig};
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid {key}={value}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Service configuration, loaded once from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address (default: 0.0.0.0).
    pub host: String,
    /// Listen port (default: 8000, from `PORT`).
    pub port: u16,
    /// Largest accepted request body; two base64 images must fit.
    pub max_body_bytes: usize,
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load configuration from `PORT` and `FACEMATCH_*` environment variables with defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let metric: Metric = parse_or(&lookup, "FACEMATCH_METRIC", Metric::default())?;

        let threshold = match lookup("FACEMATCH_THRESHOLD") {
            Some(raw) => {
                let value: f32 = parse_value("FACEMATCH_THRESHOLD", &raw)?;
                if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                    return Err(ConfigError::Invalid {
                        key: "FACEMATCH_THRESHOLD",
                        value: raw,
                        reason: "must be within [0, 1]".into(),
                    });
                }
                Some(value)
            }
            None => None,
        };

        let pipeline = PipelineConfig {
            backend: parse_or(&lookup, "FACEMATCH_BACKEND", Backend::default())?,
            model_dir: lookup("FACEMATCH_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_model_dir),
            metric,
            threshold,
            parallel: lookup("FACEMATCH_PARALLEL")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true),
            intra_threads: parse_or(&lookup, "FACEMATCH_INTRA_THREADS", 2)?,
        };

        Ok(Self {
            host: lookup("FACEMATCH_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            max_body_bytes: parse_or(&lookup, "FACEMATCH_MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES)?,
            pipeline,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}
