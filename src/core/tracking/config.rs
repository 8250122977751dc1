use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::TrackingError;

/// 跟踪配置，所有阈值都显式暴露，不在代码里写死
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// 两次检测之间的最小间隔 (ms)，更快到达的 tick 直接丢弃
    pub detection_interval_ms: u64,
    /// 宿主调度节拍 (ms)，约等于显示帧间隔
    pub tick_interval_ms: u64,
    /// 连续居中多少帧后进入 Stable
    pub required_centered_frames: u32,
    /// 居中阈值，占帧宽的比例
    pub centering_threshold: f64,
    /// 平滑系数，历史值权重
    pub smoothing_alpha: f64,
    /// 眼距到模型缩放的标定系数，与眼镜模型相关
    pub scale_calibration: f64,
    pub left_eye_index: usize,
    pub right_eye_index: usize,
    /// 检测失败后的固定退避 (ms)
    pub retry_backoff_ms: u64,
    /// 单次检测调用超时 (ms)
    pub detection_timeout_ms: u64,
    /// 连续失败多少次后才上报
    pub transient_error_threshold: u32,
    /// 连续失败多少次后终止会话
    pub max_consecutive_failures: u32,
    /// 前置摄像头镜像显示时翻转 x
    pub mirror_landmarks: bool,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            detection_interval_ms: 100,
            tick_interval_ms: 16,
            required_centered_frames: 15,
            centering_threshold: 0.15,
            smoothing_alpha: 0.7,
            scale_calibration: 8.0,
            left_eye_index: 33,
            right_eye_index: 133,
            retry_backoff_ms: 1000,
            detection_timeout_ms: 2000,
            transient_error_threshold: 3,
            max_consecutive_failures: 10,
            mirror_landmarks: false,
        }
    }
}

impl TrackingConfig {
    /// Quick lock-on: 15 centered frames within 15% of the frame width.
    pub fn responsive() -> Self {
        Self {
            required_centered_frames: 15,
            centering_threshold: 0.15,
            ..Default::default()
        }
    }

    /// Slow lock-on: 30 centered frames within 10% of the frame width.
    pub fn strict() -> Self {
        Self {
            required_centered_frames: 30,
            centering_threshold: 0.10,
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, TrackingError> {
        let config: TrackingConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TrackingError> {
        if self.detection_interval_ms == 0 || self.tick_interval_ms == 0 {
            return Err(TrackingError::Config(
                "detection and tick intervals must be positive".to_string(),
            ));
        }
        if self.required_centered_frames == 0 {
            return Err(TrackingError::Config(
                "required_centered_frames must be at least 1".to_string(),
            ));
        }
        if !(self.centering_threshold > 0.0 && self.centering_threshold.is_finite()) {
            return Err(TrackingError::Config(format!(
                "centering_threshold must be positive, got {}",
                self.centering_threshold
            )));
        }
        if !(0.0..1.0).contains(&self.smoothing_alpha) {
            return Err(TrackingError::Config(format!(
                "smoothing_alpha must be in [0, 1), got {}",
                self.smoothing_alpha
            )));
        }
        if !(self.scale_calibration > 0.0 && self.scale_calibration.is_finite()) {
            return Err(TrackingError::Config(format!(
                "scale_calibration must be positive, got {}",
                self.scale_calibration
            )));
        }
        if self.left_eye_index == self.right_eye_index {
            return Err(TrackingError::Config(
                "left and right eye indices must differ".to_string(),
            ));
        }
        if self.detection_timeout_ms == 0 {
            return Err(TrackingError::Config(
                "detection_timeout_ms must be positive".to_string(),
            ));
        }
        if self.max_consecutive_failures == 0
            || self.transient_error_threshold > self.max_consecutive_failures
        {
            return Err(TrackingError::Config(format!(
                "transient_error_threshold ({}) must not exceed max_consecutive_failures ({})",
                self.transient_error_threshold, self.max_consecutive_failures
            )));
        }
        Ok(())
    }

    pub fn detection_interval(&self) -> Duration {
        Duration::from_millis(self.detection_interval_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn detection_timeout(&self) -> Duration {
        Duration::from_millis(self.detection_timeout_ms)
    }
}
