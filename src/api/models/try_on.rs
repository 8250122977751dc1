use serde::{Deserialize, Serialize};

use crate::core::tracking::{
    BoundingBox, CycleResult, FaceShape, FrameInfo, Keypoint, LandmarkSet, Pose, StabilityState,
};

/// 宿主传入的帧信息
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TryOnFrame {
    pub width: u32,
    pub height: u32,
    pub timestamp_ms: u64,
    pub frame_number: u64,
}

impl From<TryOnFrame> for FrameInfo {
    fn from(frame: TryOnFrame) -> Self {
        FrameInfo {
            width: frame.width,
            height: frame.height,
            timestamp_ms: frame.timestamp_ms,
            frame_number: frame.frame_number,
        }
    }
}

/// 人脸框，像素坐标
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TryOnBox {
    pub x_min: f64,
    pub y_min: f64,
    pub width: f64,
    pub height: f64,
}

impl From<TryOnBox> for BoundingBox {
    fn from(b: TryOnBox) -> Self {
        BoundingBox::new(b.x_min, b.y_min, b.width, b.height)
    }
}

/// 关键点，x/y 归一化到 [0, 1]
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TryOnPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<TryOnPoint> for Keypoint {
    fn from(p: TryOnPoint) -> Self {
        Keypoint::new(p.x, p.y, p.z)
    }
}

pub(crate) fn landmark_set(points: Vec<TryOnPoint>) -> LandmarkSet {
    LandmarkSet::new(points.into_iter().map(Keypoint::from).collect())
}

/// 眼镜叠加变换
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TryOnPose {
    pub anchor_x: f64,
    pub anchor_y: f64,
    pub anchor_z: f64,
    pub scale: f64,
    pub rotation_degrees: f64,
}

impl From<Pose> for TryOnPose {
    fn from(pose: Pose) -> Self {
        Self {
            anchor_x: pose.anchor.x,
            anchor_y: pose.anchor.y,
            anchor_z: pose.anchor.z,
            scale: pose.scale,
            rotation_degrees: pose.rotation_degrees(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceShapeInfo {
    /// `round` / `square` / `heart` / `oblong` / `oval`
    pub shape: String,
    pub recommended_styles: Vec<String>,
}

impl From<FaceShape> for FaceShapeInfo {
    fn from(shape: FaceShape) -> Self {
        Self {
            shape: shape.as_str().to_string(),
            recommended_styles: shape
                .recommended_styles()
                .iter()
                .map(|s| s.as_str().to_string())
                .collect(),
        }
    }
}

/// 单个检测周期的结果，宿主用最新一条替换上一条
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TryOnEvent {
    pub frame_number: u64,
    pub timestamp_ms: u64,
    pub face_detected: bool,
    pub centered: bool,
    /// `no_face` / `off_center` / `centering` / `stable`
    pub stability: String,
    /// 当前连续居中帧数，Stable 时为所需帧数
    pub centered_frames: u32,
    pub shape: Option<FaceShapeInfo>,
    /// `None` 时隐藏眼镜模型
    pub pose: Option<TryOnPose>,
    pub pose_error: Option<String>,
}

pub(crate) fn stability_name(state: StabilityState) -> &'static str {
    match state {
        StabilityState::NoFace => "no_face",
        StabilityState::OffCenter => "off_center",
        StabilityState::Centering { .. } => "centering",
        StabilityState::Stable => "stable",
    }
}

impl TryOnEvent {
    pub(crate) fn from_cycle(result: CycleResult, required_frames: u32) -> Self {
        let event = result.event;
        let centered_frames = match event.stability {
            StabilityState::Centering { count } => count,
            StabilityState::Stable => required_frames,
            _ => 0,
        };
        Self {
            frame_number: event.frame.frame_number,
            timestamp_ms: event.frame.timestamp_ms,
            face_detected: event.face_detected,
            centered: event.centered,
            stability: stability_name(event.stability).to_string(),
            centered_frames,
            shape: event.shape.map(FaceShapeInfo::from),
            pose: event.pose.map(TryOnPose::from),
            pose_error: result.pose_error.map(|e| e.to_string()),
        }
    }
}
