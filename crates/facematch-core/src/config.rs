use crate::detector::SCRFD_MODEL_FILE;
use crate::recognizer::ARCFACE_MODEL_FILE;
use crate::scorer::Metric;
use crate::seeta::SEETA_MODEL_FILE;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Which locator/extractor pair a pipeline runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// SeetaFace frontal detector + LBP descriptor. Needs the SeetaFace model.
    #[default]
    Classic,
    /// Skin-region locator + LBP descriptor. No model files; colour images only.
    Skin,
    /// SCRFD locator + ArcFace descriptor via ONNX Runtime.
    Onnx,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Classic => f.write_str("classic"),
            Backend::Skin => f.write_str("skin"),
            Backend::Onnx => f.write_str("onnx"),
        }
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classic" => Ok(Backend::Classic),
            "skin" => Ok(Backend::Skin),
            "onnx" => Ok(Backend::Onnx),
            other => Err(format!("unknown backend '{other}' (expected classic, skin or onnx)")),
        }
    }
}

/// Static pipeline configuration, built once at process start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub backend: Backend,
    /// Directory containing model files (classic and onnx backends).
    pub model_dir: PathBuf,
    pub metric: Metric,
    /// Match threshold; `None` uses the metric's default.
    pub threshold: Option<f32>,
    /// Process the two images of a pair concurrently.
    pub parallel: bool,
    /// ONNX Runtime intra-op threads per session.
    pub intra_threads: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            model_dir: default_model_dir(),
            metric: Metric::default(),
            threshold: None,
            parallel: true,
            intra_threads: 2,
        }
    }
}

impl PipelineConfig {
    pub fn threshold(&self) -> f32 {
        self.threshold.unwrap_or_else(|| self.metric.default_threshold())
    }

    /// Path to the SeetaFace frontal detection model.
    pub fn seeta_model_path(&self) -> PathBuf {
        self.model_dir.join(SEETA_MODEL_FILE)
    }

    /// Path to the SCRFD detection model.
    pub fn scrfd_model_path(&self) -> PathBuf {
        self.model_dir.join(SCRFD_MODEL_FILE)
    }

    /// Path to the ArcFace recognition model.
    pub fn arcface_model_path(&self) -> PathBuf {
        self.model_dir.join(ARCFACE_MODEL_FILE)
    }
}

pub fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}
