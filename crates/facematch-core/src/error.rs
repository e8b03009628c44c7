use thiserror::Error;

use crate::types::ImageRole;

/// Failure categories reported through the `error` field of a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidRequest,
    DecodeError,
    NoFaceDetected,
    ExtractionError,
    InternalError,
}

/// Terminal failure of one comparison.
///
/// The `Display` text is what callers see in `SimilarityResult::error`.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    #[error("Both submitted_image and reference_image are required")]
    InvalidRequest,
    #[error("Invalid image format: failed to decode base64 for {role} image: {reason}")]
    InvalidPayload { role: ImageRole, reason: String },
    #[error("Invalid image data: failed to decode {role} image: {reason}")]
    Decode { role: ImageRole, reason: String },
    /// Decode failure outside a comparison, where no image role applies.
    #[error("Invalid image data: failed to decode image: {0}")]
    InvalidImage(String),
    #[error("No face detected in {0} image")]
    NoFaceDetected(ImageRole),
    #[error("Failed to extract face features from {role} image: {reason}")]
    Extraction { role: ImageRole, reason: String },
    #[error("{0}")]
    Internal(String),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::InvalidRequest => ErrorKind::InvalidRequest,
            PipelineError::InvalidPayload { .. } | PipelineError::Decode { .. } | PipelineError::InvalidImage(_) => {
                ErrorKind::DecodeError
            }
            PipelineError::NoFaceDetected(_) => ErrorKind::NoFaceDetected,
            PipelineError::Extraction { .. } => ErrorKind::ExtractionError,
            PipelineError::Internal(_) => ErrorKind::InternalError,
        }
    }

    /// The image the failure is attributed to, when there is one.
    pub fn role(&self) -> Option<ImageRole> {
        match self {
            PipelineError::InvalidPayload { role, .. }
            | PipelineError::Decode { role, .. }
            | PipelineError::Extraction { role, .. } => Some(*role),
            PipelineError::NoFaceDetected(role) => Some(*role),
            PipelineError::InvalidRequest | PipelineError::InvalidImage(_) | PipelineError::Internal(_) => None,
        }
    }
}

/// Failure to build a pipeline backend at startup.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("detector: {0}")]
    Detector(#[from] crate::detector::DetectorError),
    #[error("extractor: {0}")]
    Extractor(#[from] crate::extractor::ExtractorError),
    #[error("invalid threshold {0}: must be a finite value in [0, 1]")]
    InvalidThreshold(f32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            PipelineError::NoFaceDetected(ImageRole::Submitted).to_string(),
            "No face detected in submitted image"
        );
        assert_eq!(
            PipelineError::InvalidRequest.to_string(),
            "Both submitted_image and reference_image are required"
        );
        let err = PipelineError::Decode { role: ImageRole::Reference, reason: "truncated".into() };
        assert_eq!(err.to_string(), "Invalid image data: failed to decode reference image: truncated");
        assert_eq!(PipelineError::Internal("boom".into()).to_string(), "boom");
    }

    #[test]
    fn test_kinds() {
        let payload = PipelineError::InvalidPayload { role: ImageRole::Submitted, reason: "x".into() };
        assert_eq!(payload.kind(), ErrorKind::DecodeError);
        assert!(payload.to_string().contains("decode"));
        assert_eq!(payload.role(), Some(ImageRole::Submitted));
        assert_eq!(PipelineError::InvalidRequest.kind(), ErrorKind::InvalidRequest);
        assert_eq!(PipelineError::InvalidRequest.role(), None);
        let image = PipelineError::InvalidImage("truncated".into());
        assert_eq!(image.kind(), ErrorKind::DecodeError);
        assert_eq!(image.role(), None);
        assert_eq!(
            PipelineError::Extraction { role: ImageRole::Reference, reason: "x".into() }.kind(),
            ErrorKind::ExtractionError
        );
    }
}
