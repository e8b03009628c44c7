use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use facematch_core::payload::decode_image_payload;
use facematch_core::{Backend, Metric, Pipeline, PipelineConfig};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "facematch", about = "Face comparison from the command line")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare the faces in two images and print the result as JSON
    Compare {
        /// Submitted image (raw image file, or base64 / data-URL text)
        submitted: PathBuf,
        /// Reference image (raw image file, or base64 / data-URL text)
        reference: PathBuf,
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// List the face regions found in an image
    Detect {
        image: PathBuf,
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
}

#[derive(Args)]
struct PipelineArgs {
    /// Detection/extraction backend: classic, skin or onnx
    #[arg(long, default_value = "classic")]
    backend: Backend,
    /// Similarity metric: cosine or euclidean
    #[arg(long, default_value = "cosine")]
    metric: Metric,
    /// Match threshold in [0, 1] (default depends on the metric)
    #[arg(long)]
    threshold: Option<f32>,
    /// Directory holding seeta_fd_frontal_v1.0.bin, det_10g.onnx and w600k_r50.onnx
    #[arg(long, default_value = "models")]
    model_dir: PathBuf,
    /// Process the two images one after the other
    #[arg(long)]
    sequential: bool,
}

impl PipelineArgs {
    fn build(self) -> Result<Pipeline> {
        let config = PipelineConfig {
            backend: self.backend,
            model_dir: self.model_dir,
            metric: self.metric,
            threshold: self.threshold,
            parallel: !self.sequential,
            ..Default::default()
        };
        Pipeline::from_config(&config).context("failed to initialise pipeline")
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compare { submitted, reference, pipeline } => {
            let pipeline = pipeline.build()?;
            let submitted = load_image(&submitted)?;
            let reference = load_image(&reference)?;
            let result = pipeline.compare(&submitted, &reference);
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Detect { image, pipeline } => {
            let pipeline = pipeline.build()?;
            let bytes = load_image(&image)?;
            let regions = pipeline.locate(&bytes)?;
            tracing::debug!(count = regions.len(), "faces located");
            println!("{}", serde_json::to_string_pretty(&regions)?);
        }
    }

    Ok(())
}

/// Read an image file. Text files holding base64 (optionally as a data URL)
/// are decoded; anything else is passed through as raw image bytes.
fn load_image(path: &Path) -> Result<Vec<u8>> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(decode_text_payload(&bytes).unwrap_or(bytes))
}

fn decode_text_payload(bytes: &[u8]) -> Option<Vec<u8>> {
    let text = std::str::from_utf8(bytes).ok()?.trim();
    if text.is_empty() {
        return None;
    }
    decode_image_payload(text).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_compare_args() {
        let cli = Cli::try_parse_from([
            "facematch",
            "compare",
            "a.png",
            "b.png",
            "--metric",
            "euclidean",
            "--threshold",
            "0.7",
            "--sequential",
        ])
        .unwrap();
        match cli.command {
            Commands::Compare { submitted, pipeline, .. } => {
                assert_eq!(submitted, PathBuf::from("a.png"));
                assert_eq!(pipeline.metric, Metric::Euclidean);
                assert_eq!(pipeline.threshold, Some(0.7));
                assert!(pipeline.sequential);
                assert_eq!(pipeline.backend, Backend::Classic);
            }
            Commands::Detect { .. } => panic!("expected compare"),
        }
    }

    #[test]
    fn test_skin_backend_flag() {
        let cli = Cli::try_parse_from(["facematch", "detect", "a.png", "--backend", "skin"]).unwrap();
        match cli.command {
            Commands::Detect { pipeline, .. } => assert_eq!(pipeline.backend, Backend::Skin),
            Commands::Compare { .. } => panic!("expected detect"),
        }
    }

    #[test]
    fn test_rejects_unknown_metric() {
        assert!(Cli::try_parse_from(["facematch", "compare", "a", "b", "--metric", "manhattan"]).is_err());
    }

    #[test]
    fn test_text_payload_decoded() {
        assert_eq!(decode_text_payload(b"data:image/png;base64,AQID\n"), Some(vec![1, 2, 3]));
        assert_eq!(decode_text_payload(b"AQID"), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_raw_bytes_passed_through() {
        let png_magic = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        assert_eq!(decode_text_payload(&png_magic), None);
        assert_eq!(decode_text_payload(b"   "), None);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_image(Path::new("/nonexistent/face.png")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
