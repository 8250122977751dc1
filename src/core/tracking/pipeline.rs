use log::{debug, info, warn};

use crate::core::tracking::config::TrackingConfig;
use crate::core::tracking::error::PoseError;
use crate::core::tracking::frame::{BoundingBox, FrameInfo, LandmarkSet};
use crate::core::tracking::pose::{Pose, PoseEstimator};
use crate::core::tracking::shape::{FaceShape, ShapeClassifier};
use crate::core::tracking::smoother::LandmarkSmoother;
use crate::core::tracking::stability::{
    StabilityAction, StabilityConfig, StabilityState, StabilityTracker,
};

/// 一个检测周期内两个能力的原始结果
#[derive(Debug, Clone, Default)]
pub struct Detection {
    pub face_box: Option<BoundingBox>,
    pub landmarks: Option<LandmarkSet>,
}

/// Per-cycle output for the rendering layer. Each event replaces the previous one.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingEvent {
    pub frame: FrameInfo,
    pub face_detected: bool,
    pub centered: bool,
    pub stability: StabilityState,
    pub shape: Option<FaceShape>,
    pub pose: Option<Pose>,
}

#[derive(Debug, Clone)]
pub struct CycleResult {
    pub event: TrackingEvent,
    /// Set when tracking was stable but no valid pose could be derived; the
    /// event then carries `pose: None` and the overlay should be hidden.
    pub pose_error: Option<PoseError>,
}

pub struct TrackingPipeline {
    stability: StabilityTracker,
    smoother: LandmarkSmoother,
    estimator: PoseEstimator,
    centering_threshold: f64,
    mirror_landmarks: bool,
    left_eye_index: usize,
    right_eye_index: usize,
    shape_requested: bool,
    latest_box: Option<BoundingBox>,
}

impl TrackingPipeline {
    pub fn new() -> Self {
        Self::with_config(&TrackingConfig::default())
    }

    pub fn with_config(config: &TrackingConfig) -> Self {
        // 镜像后解剖学左眼出现在图像右侧，姿态按画面左右取眼
        let (pose_left, pose_right) = if config.mirror_landmarks {
            (config.right_eye_index, config.left_eye_index)
        } else {
            (config.left_eye_index, config.right_eye_index)
        };
        Self {
            stability: StabilityTracker::with_config(StabilityConfig {
                required_frames: config.required_centered_frames,
            }),
            smoother: LandmarkSmoother::new(config.smoothing_alpha),
            estimator: PoseEstimator::new(pose_left, pose_right, config.scale_calibration),
            centering_threshold: config.centering_threshold,
            mirror_landmarks: config.mirror_landmarks,
            left_eye_index: config.left_eye_index,
            right_eye_index: config.right_eye_index,
            shape_requested: false,
            latest_box: None,
        }
    }

    pub fn process_detection(&mut self, info: &FrameInfo, detection: Detection) -> CycleResult {
        let face_box = detection.face_box.filter(|b| {
            let valid = b.is_valid();
            if !valid {
                warn!("frame #{}: discarding invalid face box {:?}", info.frame_number, b);
            }
            valid
        });
        let landmarks = detection
            .landmarks
            .filter(|l| !l.is_empty())
            .map(|l| if self.mirror_landmarks { l.mirrored() } else { l });

        self.latest_box = face_box;

        let face_detected = face_box.is_some() || landmarks.is_some();
        let centered = face_detected
            && self
                .anchor_pixel(info, face_box.as_ref(), landmarks.as_ref())
                .is_some_and(|(x, y)| info.center_offset(x, y) < self.centering_threshold);

        let action = self.stability.process_cycle(face_detected, centered);
        match action {
            StabilityAction::Acquire => {
                info!("🎯 frame #{}: face stable, tracking enabled", info.frame_number);
                self.smoother.reset();
            }
            StabilityAction::Release => {
                info!(
                    "frame #{}: stability lost ({:?}), dropping smoothed landmarks",
                    info.frame_number,
                    self.stability.current_state()
                );
                self.smoother.reset();
            }
            StabilityAction::Hold => self.smoother.reset(),
            StabilityAction::Track => {}
        }

        let mut pose = None;
        let mut pose_error = None;
        if action.tracking_enabled() {
            match landmarks.as_ref() {
                Some(raw) => {
                    let smoothed = self.smoother.update(raw);
                    match self.estimator.estimate(&smoothed) {
                        Ok(p) => pose = Some(p),
                        Err(e) => {
                            warn!("frame #{}: {}", info.frame_number, e);
                            pose_error = Some(e);
                        }
                    }
                }
                // 只有人脸框没有关键点，平滑历史断开
                None => self.smoother.reset(),
            }
        }

        let shape = match (self.shape_requested, face_box.as_ref()) {
            (true, Some(bbox)) => {
                self.shape_requested = false;
                let shape = ShapeClassifier::classify(bbox);
                info!(
                    "📐 frame #{}: face shape {} (ratio {:.3})",
                    info.frame_number,
                    shape,
                    bbox.aspect_ratio()
                );
                Some(shape)
            }
            _ => None,
        };

        debug!(
            "frame #{}: detected={} centered={} state={:?} pose={}",
            info.frame_number,
            face_detected,
            centered,
            self.stability.current_state(),
            pose.is_some()
        );

        CycleResult {
            event: TrackingEvent {
                frame: *info,
                face_detected,
                centered,
                stability: self.stability.current_state(),
                shape,
                pose,
            },
            pose_error,
        }
    }

    /// Eye midpoint when the landmarks carry both eye anchors, else the box center.
    fn anchor_pixel(
        &self,
        info: &FrameInfo,
        face_box: Option<&BoundingBox>,
        landmarks: Option<&LandmarkSet>,
    ) -> Option<(f64, f64)> {
        if info.width == 0 || info.height == 0 {
            return None;
        }
        let eye_anchor = landmarks.and_then(|l| {
            let (lx, ly) = l.to_pixel(self.left_eye_index, info)?;
            let (rx, ry) = l.to_pixel(self.right_eye_index, info)?;
            Some(((lx + rx) / 2.0, (ly + ry) / 2.0))
        });
        eye_anchor.or_else(|| face_box.map(BoundingBox::center))
    }

    /// Classification is emitted on the next cycle that has a face box.
    pub fn request_shape_analysis(&mut self) {
        self.shape_requested = true;
    }

    pub fn shape_pending(&self) -> bool {
        self.shape_requested
    }

    pub fn classify_latest(&self) -> Option<FaceShape> {
        self.latest_box.as_ref().map(ShapeClassifier::classify)
    }

    pub fn latest_face_box(&self) -> Option<BoundingBox> {
        self.latest_box
    }

    pub fn stability_state(&self) -> StabilityState {
        self.stability.current_state()
    }

    pub fn cycle_count(&self) -> u64 {
        self.stability.cycle_count()
    }

    pub fn reset(&mut self) {
        self.stability.reset();
        self.smoother.reset();
        self.shape_requested = false;
        self.latest_box = None;
    }
}

impl Default for TrackingPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tracking::frame::Keypoint;

    const W: u32 = 640;
    const H: u32 = 480;

    fn info(frame_number: u64) -> FrameInfo {
        FrameInfo {
            width: W,
            height: H,
            timestamp_ms: frame_number * 100,
            frame_number,
        }
    }

    fn config(required: u32) -> TrackingConfig {
        TrackingConfig {
            required_centered_frames: required,
            left_eye_index: 0,
            right_eye_index: 1,
            ..Default::default()
        }
    }

    fn centered_eyes() -> LandmarkSet {
        LandmarkSet::new(vec![Keypoint::new(0.45, 0.5, 0.0), Keypoint::new(0.55, 0.5, 0.0)])
    }

    fn face() -> Detection {
        Detection {
            face_box: Some(BoundingBox::new(270.0, 170.0, 100.0, 140.0)),
            landmarks: Some(centered_eyes()),
        }
    }

    #[test]
    fn test_no_face_then_stable_scenario() {
        let required = 15;
        let mut pipeline = TrackingPipeline::with_config(&config(required));
        let mut first_stable = None;

        for n in 1..=40u64 {
            let detection = if n <= 10 { Detection::default() } else { face() };
            let result = pipeline.process_detection(&info(n), detection);

            if n <= 10 {
                assert!(!result.event.face_detected);
                assert_eq!(result.event.stability, StabilityState::NoFace);
            }
            if result.event.stability == StabilityState::Stable && first_stable.is_none() {
                first_stable = Some(n);
            }
            if n < 10 + required as u64 {
                assert!(result.event.pose.is_none(), "frame {} has a pose", n);
            } else {
                assert!(result.event.pose.is_some(), "frame {} has no pose", n);
            }
        }

        assert_eq!(first_stable, Some(10 + required as u64));
    }

    #[test]
    fn test_fixed_eyes_pose() {
        let mut pipeline = TrackingPipeline::with_config(&config(1));
        let result = pipeline.process_detection(&info(1), face());

        let pose = result.event.pose.unwrap();
        assert!((pose.anchor.x - 0.5).abs() < 1e-12);
        assert!((pose.anchor.y - 0.5).abs() < 1e-12);
        assert!((pose.scale - 0.8).abs() < 1e-9);
        assert_eq!(pose.rotation_radians, 0.0);
    }

    #[test]
    fn test_off_center_face_never_stabilizes() {
        let mut pipeline = TrackingPipeline::with_config(&config(2));
        let off = Detection {
            face_box: Some(BoundingBox::new(0.0, 0.0, 100.0, 140.0)),
            landmarks: Some(LandmarkSet::new(vec![
                Keypoint::new(0.05, 0.1, 0.0),
                Keypoint::new(0.15, 0.1, 0.0),
            ])),
        };

        for n in 1..=5 {
            let result = pipeline.process_detection(&info(n), off.clone());
            assert!(result.event.face_detected);
            assert!(!result.event.centered);
            assert_eq!(result.event.stability, StabilityState::OffCenter);
            assert!(result.event.pose.is_none());
        }
    }

    #[test]
    fn test_tracking_gap_reseeds_smoother() {
        let mut pipeline = TrackingPipeline::with_config(&config(1));
        pipeline.process_detection(&info(1), face());

        let shifted = Detection {
            face_box: None,
            landmarks: Some(LandmarkSet::new(vec![
                Keypoint::new(0.47, 0.52, 0.0),
                Keypoint::new(0.57, 0.52, 0.0),
            ])),
        };
        let blended = pipeline.process_detection(&info(2), shifted.clone());
        let blended_x = blended.event.pose.unwrap().anchor.x;
        assert!((blended_x - (0.7 * 0.5 + 0.3 * 0.52)).abs() < 1e-12);

        pipeline.process_detection(&info(3), Detection::default());
        let after_gap = pipeline.process_detection(&info(4), shifted);
        assert!((after_gap.event.pose.unwrap().anchor.x - 0.52).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_pose_hides_overlay() {
        let mut pipeline = TrackingPipeline::with_config(&config(1));
        let p = Keypoint::new(0.5, 0.5, 0.0);
        let detection = Detection {
            face_box: None,
            landmarks: Some(LandmarkSet::new(vec![p, p])),
        };

        let result = pipeline.process_detection(&info(1), detection);
        assert!(result.event.pose.is_none());
        assert_eq!(result.pose_error, Some(PoseError::DegenerateEyes));
        assert_eq!(result.event.stability, StabilityState::Stable);
    }

    #[test]
    fn test_box_only_uses_box_center() {
        let mut pipeline = TrackingPipeline::with_config(&config(3));
        let detection = Detection {
            face_box: Some(BoundingBox::new(270.0, 170.0, 100.0, 140.0)),
            landmarks: None,
        };

        let result = pipeline.process_detection(&info(1), detection);
        assert!(result.event.centered);
        assert_eq!(result.event.stability, StabilityState::Centering { count: 1 });
    }

    #[test]
    fn test_shape_on_request_only() {
        let mut pipeline = TrackingPipeline::with_config(&config(15));

        let result = pipeline.process_detection(&info(1), face());
        assert!(result.event.shape.is_none());
        assert_eq!(pipeline.classify_latest(), Some(FaceShape::Heart));

        pipeline.request_shape_analysis();
        let result = pipeline.process_detection(&info(2), Detection::default());
        assert!(result.event.shape.is_none());
        assert!(pipeline.shape_pending());
        assert!(pipeline.classify_latest().is_none());

        let result = pipeline.process_detection(&info(3), face());
        assert_eq!(result.event.shape, Some(FaceShape::Heart));
        assert!(!pipeline.shape_pending());
    }

    #[test]
    fn test_mirrored_landmarks_keep_overlay_upright() {
        let config = TrackingConfig {
            mirror_landmarks: true,
            ..config(1)
        };
        let mirrored_pose = |left: Keypoint, right: Keypoint| {
            let mut pipeline = TrackingPipeline::with_config(&config);
            let detection = Detection {
                face_box: None,
                landmarks: Some(LandmarkSet::new(vec![left, right])),
            };
            pipeline.process_detection(&info(1), detection).event.pose.unwrap()
        };

        let level = mirrored_pose(Keypoint::new(0.45, 0.5, 0.0), Keypoint::new(0.55, 0.5, 0.0));
        assert!(level.rotation_radians.abs() < 1e-9, "level face rolled by {}", level.rotation_radians);
        assert!((level.anchor.x - 0.5).abs() < 1e-12);

        // the displayed image is flipped, so the roll flips sign
        let tilted = mirrored_pose(Keypoint::new(0.40, 0.48, 0.0), Keypoint::new(0.55, 0.52, 0.0));
        let expected = -(0.04_f64).atan2(0.15);
        assert!((tilted.rotation_radians - expected).abs() < 1e-9);
        assert!((tilted.anchor.x - (1.0 - 0.475)).abs() < 1e-12);
    }

    #[test]
    fn test_reset() {
        let mut pipeline = TrackingPipeline::with_config(&config(1));
        pipeline.process_detection(&info(1), face());
        assert_eq!(pipeline.stability_state(), StabilityState::Stable);

        pipeline.reset();
        assert_eq!(pipeline.stability_state(), StabilityState::NoFace);
        assert_eq!(pipeline.cycle_count(), 0);
        assert!(pipeline.latest_face_box().is_none());
    }
}
