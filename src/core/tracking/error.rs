use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 单个检测能力（FaceLocator / LandmarkExtractor）的失败
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CapabilityError {
    /// Model failed to initialize or went away. Fatal to the session.
    #[error("Model unavailable: {0}")]
    Unavailable(String),
    /// A single call failed; the next cycle may succeed.
    #[error("Transient detection failure: {0}")]
    Transient(String),
    #[error("Detection timed out after {0:?}")]
    Timeout(Duration),
}

impl CapabilityError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, CapabilityError::Unavailable(_))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CapabilityError::Unavailable(_) => ErrorKind::ModelUnavailable,
            CapabilityError::Transient(_) => ErrorKind::DetectionTransient,
            CapabilityError::Timeout(_) => ErrorKind::DetectionTimeout,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PoseError {
    #[error("Eye anchors coincide, cannot derive scale or roll")]
    DegenerateEyes,
    #[error("Landmark index {index} out of range (set has {len} points)")]
    LandmarkIndexOutOfRange { index: usize, len: usize },
}

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("Detection failed: {0}")]
    Detection(#[from] CapabilityError),
    #[error("Degenerate pose: {0}")]
    DegeneratePose(#[from] PoseError),
    #[error("Detection failed for {0} consecutive cycles")]
    PersistentFailure(u32),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Tracking session already running")]
    AlreadyRunning,
    #[error("Tracking session is not running")]
    NotRunning,
    #[error("Tracking worker failed: {0}")]
    Worker(String),
}

impl TrackingError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            TrackingError::ModelUnavailable(_) => Some(ErrorKind::ModelUnavailable),
            TrackingError::Detection(e) => Some(e.kind()),
            TrackingError::DegeneratePose(_) => Some(ErrorKind::DegeneratePose),
            TrackingError::PersistentFailure(_) => Some(ErrorKind::PersistentFailure),
            _ => None,
        }
    }
}

/// `onTrackingError` 通道上的错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    ModelUnavailable,
    DetectionTransient,
    DetectionTimeout,
    DegeneratePose,
    PersistentFailure,
}

/// Non-fatal (or final fatal) notification delivered alongside tracking events.
#[derive(Debug, Clone)]
pub struct TrackingErrorEvent {
    pub kind: ErrorKind,
    pub message: String,
    /// Failed cycles in a row when the notification was raised.
    pub consecutive_failures: u32,
    pub fatal: bool,
}
