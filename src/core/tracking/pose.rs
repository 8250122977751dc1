use serde::{Deserialize, Serialize};

use super::error::PoseError;
use super::frame::{Keypoint, LandmarkSet};

/// 眼镜模型的叠加变换，每帧重新计算，后一个完全替换前一个
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub anchor: Keypoint,
    pub scale: f64,
    /// In-plane roll only; pitch and yaw are not estimated.
    pub rotation_radians: f64,
}

impl Pose {
    pub fn rotation_degrees(&self) -> f64 {
        self.rotation_radians.to_degrees()
    }
}

pub struct PoseEstimator {
    left_eye_index: usize,
    right_eye_index: usize,
    scale_calibration: f64,
}

impl PoseEstimator {
    pub fn new(left_eye_index: usize, right_eye_index: usize, scale_calibration: f64) -> Self {
        Self {
            left_eye_index,
            right_eye_index,
            scale_calibration,
        }
    }

    pub fn eye_anchors(&self, landmarks: &LandmarkSet) -> Result<(Keypoint, Keypoint), PoseError> {
        let lookup = |index: usize| {
            landmarks
                .get(index)
                .copied()
                .ok_or(PoseError::LandmarkIndexOutOfRange {
                    index,
                    len: landmarks.len(),
                })
        };
        Ok((lookup(self.left_eye_index)?, lookup(self.right_eye_index)?))
    }

    pub fn estimate(&self, landmarks: &LandmarkSet) -> Result<Pose, PoseError> {
        let (left, right) = self.eye_anchors(landmarks)?;

        let eye_distance = left.distance(&right);
        if !eye_distance.is_finite() || eye_distance <= f64::EPSILON {
            return Err(PoseError::DegenerateEyes);
        }

        let scale = eye_distance * self.scale_calibration;
        if !scale.is_finite() {
            return Err(PoseError::DegenerateEyes);
        }

        Ok(Pose {
            anchor: left.midpoint(&right),
            scale,
            rotation_radians: (right.y - left.y).atan2(right.x - left.x),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_4;

    fn eyes(left: Keypoint, right: Keypoint) -> LandmarkSet {
        LandmarkSet::new(vec![left, right])
    }

    #[test]
    fn test_unit_eye_distance() {
        let estimator = PoseEstimator::new(0, 1, 8.0);
        let pose = estimator
            .estimate(&eyes(Keypoint::new(0.0, 0.0, 0.0), Keypoint::new(1.0, 0.0, 0.0)))
            .unwrap();

        assert_eq!(pose.rotation_radians, 0.0);
        assert_eq!(pose.anchor, Keypoint::new(0.5, 0.0, 0.0));
        assert_eq!(pose.scale, 8.0);
    }

    #[test]
    fn test_roll_angle() {
        let estimator = PoseEstimator::new(0, 1, 2.0);
        let pose = estimator
            .estimate(&eyes(Keypoint::new(0.2, 0.2, 0.0), Keypoint::new(0.4, 0.4, 0.0)))
            .unwrap();

        assert!((pose.rotation_radians - FRAC_PI_4).abs() < 1e-12);
        assert!((pose.rotation_degrees() - 45.0).abs() < 1e-9);
        assert!((pose.scale - 2.0 * 0.08_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_identical_eyes_is_degenerate() {
        let estimator = PoseEstimator::new(0, 1, 8.0);
        let p = Keypoint::new(0.5, 0.5, 0.1);

        assert_eq!(estimator.estimate(&eyes(p, p)), Err(PoseError::DegenerateEyes));
    }

    #[test]
    fn test_missing_index() {
        let estimator = PoseEstimator::new(33, 133, 8.0);
        let result = estimator.estimate(&eyes(Keypoint::default(), Keypoint::default()));

        assert_eq!(
            result,
            Err(PoseError::LandmarkIndexOutOfRange { index: 33, len: 2 })
        );
    }
}
