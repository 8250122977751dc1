//! 虚拟试戴跟踪器
//!
//! For hosts that run face detection on their own thread and push the results
//! in; the async `TrackingSession` covers hosts that hand over the capabilities.

use std::sync::Mutex;

use flutter_rust_bridge::frb;
use log::info;
use serde::{Deserialize, Serialize};

use crate::api::models::try_on::{
    landmark_set, stability_name, FaceShapeInfo, TryOnBox, TryOnEvent, TryOnFrame, TryOnPoint,
};
use crate::core::tracking::{
    BoundingBox, Detection, FaceShape, ShapeClassifier, TrackingConfig, TrackingError,
    TrackingPipeline,
};

/// 试戴 API 错误类型，FRB 友好的设计
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TryOnApiError {
    pub error_type: String,
    pub message: String,
}

impl TryOnApiError {
    fn invalid_box(width: f64, height: f64) -> Self {
        Self {
            error_type: "InvalidBox".to_string(),
            message: format!("人脸框尺寸无效: {} x {}", width, height),
        }
    }
}

impl From<TrackingError> for TryOnApiError {
    fn from(e: TrackingError) -> Self {
        let error_type = match &e {
            TrackingError::Config(_) => "ConfigError",
            TrackingError::Json(_) => "JsonError",
            _ => "TrackingError",
        };
        Self {
            error_type: error_type.to_string(),
            message: e.to_string(),
        }
    }
}

impl std::fmt::Display for TryOnApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.error_type, self.message)
    }
}

impl std::error::Error for TryOnApiError {}

/// 试戴跟踪器 - 稳定性判定 + 关键点平滑 + 姿态估计
///
/// ```dart
/// final tracker = TryOnTracker.create(configJson: null);
/// final event = tracker.processDetection(frame: frame, faceBox: box, landmarks: points);
/// if (event.pose != null) overlay.update(event.pose!);
/// ```
#[frb(opaque)]
pub struct TryOnTracker {
    pipeline: Mutex<TrackingPipeline>,
    required_frames: u32,
}

impl TryOnTracker {
    /// 创建跟踪器，`config_json` 为空时使用默认配置
    #[frb(sync)]
    pub fn create(config_json: Option<String>) -> Result<Self, TryOnApiError> {
        let config = match config_json {
            Some(json) => TrackingConfig::from_json(&json)?,
            None => TrackingConfig::default(),
        };
        info!(
            "🕶️ TryOnTracker: created ({} centered frames, threshold {})",
            config.required_centered_frames, config.centering_threshold
        );
        Ok(Self {
            pipeline: Mutex::new(TrackingPipeline::with_config(&config)),
            required_frames: config.required_centered_frames,
        })
    }

    /// 处理一次检测结果。宿主负责限频和失败重试，失败的周期不要调用
    #[frb(sync)]
    pub fn process_detection(
        &self,
        frame: TryOnFrame,
        face_box: Option<TryOnBox>,
        landmarks: Option<Vec<TryOnPoint>>,
    ) -> TryOnEvent {
        let detection = Detection {
            face_box: face_box.map(BoundingBox::from),
            landmarks: landmarks.map(landmark_set),
        };
        let result = self.lock().process_detection(&frame.into(), detection);
        TryOnEvent::from_cycle(result, self.required_frames)
    }

    /// 下一次带人脸框的检测结果会附带脸型
    #[frb(sync)]
    pub fn request_shape_analysis(&self) {
        self.lock().request_shape_analysis();
    }

    /// 立即对最近一次人脸框分类
    #[frb(sync)]
    pub fn classify_latest(&self) -> Option<FaceShapeInfo> {
        self.lock().classify_latest().map(FaceShapeInfo::from)
    }

    #[frb(sync, getter)]
    pub fn stability(&self) -> String {
        stability_name(self.lock().stability_state()).to_string()
    }

    /// 重置状态
    #[frb(sync)]
    pub fn reset(&self) {
        self.lock().reset();
        info!("🔄 TryOnTracker: reset");
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TrackingPipeline> {
        // pipeline state stays consistent across a panicked cycle
        self.pipeline.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for TryOnTracker {
    fn drop(&mut self) {
        info!("🗑️ TryOnTracker: released");
    }
}

/// 根据人脸框宽高直接判断脸型
#[frb(sync)]
pub fn classify_face_shape(width: f64, height: f64) -> Result<FaceShapeInfo, TryOnApiError> {
    let bbox = BoundingBox::new(0.0, 0.0, width, height);
    if !bbox.is_valid() {
        return Err(TryOnApiError::invalid_box(width, height));
    }
    let shape: FaceShape = ShapeClassifier::classify(&bbox);
    Ok(shape.into())
}
