pub mod capability;
pub mod config;
pub mod error;
pub mod frame;
pub mod pipeline;
pub mod pose;
pub mod scheduler;
pub mod session;
pub mod shape;
pub mod smoother;
pub mod stability;

pub use capability::{FaceLocator, FrameSource, LandmarkExtractor};
pub use config::TrackingConfig;
pub use error::{CapabilityError, ErrorKind, PoseError, TrackingError, TrackingErrorEvent};
pub use frame::{BoundingBox, CameraFrame, Frame, FrameInfo, Keypoint, LandmarkSet};
pub use pipeline::{CycleResult, Detection, TrackingEvent, TrackingPipeline};
pub use pose::{Pose, PoseEstimator};
pub use scheduler::{DetectionScheduler, RetryPolicy, TickDecision};
pub use session::{SessionParts, SessionStats, TrackingChannels, TrackingSession};
pub use shape::{FaceShape, FrameStyle, ShapeClassifier};
pub use smoother::LandmarkSmoother;
pub use stability::{StabilityAction, StabilityState, StabilityTracker};
