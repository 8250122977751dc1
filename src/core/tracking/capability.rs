//! 外部能力接口：帧来源、人脸定位、关键点提取
//!
//! The models behind `FaceLocator` / `LandmarkExtractor` are opaque. Landmarks
//! must come back normalized to [0, 1]; extractors that work in pixels convert
//! with `LandmarkSet::from_pixels` before returning.

use async_trait::async_trait;

use super::error::CapabilityError;
use super::frame::{BoundingBox, Frame, LandmarkSet};

/// Pull-based frame supply. `None` means no new frame is ready yet.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Option<Frame>;
}

#[async_trait]
pub trait FaceLocator: Send + Sync {
    /// Called once before the tracking loop starts. Failing here is fatal.
    async fn warm_up(&self) -> Result<(), CapabilityError> {
        Ok(())
    }

    /// Single-face mode: zero or one box.
    async fn locate(&self, frame: &Frame) -> Result<Option<BoundingBox>, CapabilityError>;
}

#[async_trait]
pub trait LandmarkExtractor: Send + Sync {
    async fn warm_up(&self) -> Result<(), CapabilityError> {
        Ok(())
    }

    async fn extract_landmarks(&self, frame: &Frame)
        -> Result<Option<LandmarkSet>, CapabilityError>;
}

type FramePattern<T> = Box<dyn Fn(u64) -> T + Send + Sync>;

/// 按帧号生成的固定节奏帧源，用于测试和演示
pub struct SyntheticFrameSource {
    width: u32,
    height: u32,
    frame_interval_ms: u64,
    next_number: u64,
    limit: Option<u64>,
}

impl SyntheticFrameSource {
    pub fn new(width: u32, height: u32, frame_interval_ms: u64) -> Self {
        Self {
            width,
            height,
            frame_interval_ms,
            next_number: 1,
            limit: None,
        }
    }

    /// Stops producing frames after `count` frames.
    pub fn with_limit(mut self, count: u64) -> Self {
        self.limit = Some(count);
        self
    }
}

impl FrameSource for SyntheticFrameSource {
    fn next_frame(&mut self) -> Option<Frame> {
        if self.limit.is_some_and(|limit| self.next_number > limit) {
            return None;
        }
        let number = self.next_number;
        self.next_number += 1;
        Some(Frame::metadata_only(
            self.width,
            self.height,
            number * self.frame_interval_ms,
            number,
        ))
    }
}

pub struct MockFaceLocator {
    // 按帧号决定返回的人脸框
    box_pattern: FramePattern<Option<BoundingBox>>,
    failure_pattern: Option<FramePattern<Option<CapabilityError>>>,
    warm_up_error: Option<CapabilityError>,
}

impl MockFaceLocator {
    pub fn new() -> Self {
        Self::with_pattern(|_| None)
    }

    pub fn with_pattern<F>(pattern: F) -> Self
    where
        F: Fn(u64) -> Option<BoundingBox> + Send + Sync + 'static,
    {
        Self {
            box_pattern: Box::new(pattern),
            failure_pattern: None,
            warm_up_error: None,
        }
    }

    pub fn with_fixed_box(bbox: BoundingBox) -> Self {
        Self::with_pattern(move |_| Some(bbox))
    }

    pub fn failing_on<F>(mut self, failures: F) -> Self
    where
        F: Fn(u64) -> Option<CapabilityError> + Send + Sync + 'static,
    {
        self.failure_pattern = Some(Box::new(failures));
        self
    }

    pub fn unavailable(message: &str) -> Self {
        let mut locator = Self::new();
        locator.warm_up_error = Some(CapabilityError::Unavailable(message.to_string()));
        locator
    }
}

impl Default for MockFaceLocator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FaceLocator for MockFaceLocator {
    async fn warm_up(&self) -> Result<(), CapabilityError> {
        match &self.warm_up_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    async fn locate(&self, frame: &Frame) -> Result<Option<BoundingBox>, CapabilityError> {
        if let Some(error) = self.failure_pattern.as_ref().and_then(|p| p(frame.frame_number)) {
            return Err(error);
        }
        Ok((self.box_pattern)(frame.frame_number))
    }
}

pub struct MockLandmarkExtractor {
    landmark_pattern: FramePattern<Option<LandmarkSet>>,
    failure_pattern: Option<FramePattern<Option<CapabilityError>>>,
    // 模拟永不返回的调用，用于超时测试
    hang_pattern: Option<FramePattern<bool>>,
}

impl MockLandmarkExtractor {
    pub fn new() -> Self {
        Self::with_pattern(|_| None)
    }

    pub fn with_pattern<F>(pattern: F) -> Self
    where
        F: Fn(u64) -> Option<LandmarkSet> + Send + Sync + 'static,
    {
        Self {
            landmark_pattern: Box::new(pattern),
            failure_pattern: None,
            hang_pattern: None,
        }
    }

    pub fn with_fixed_landmarks(landmarks: LandmarkSet) -> Self {
        Self::with_pattern(move |_| Some(landmarks.clone()))
    }

    pub fn failing_on<F>(mut self, failures: F) -> Self
    where
        F: Fn(u64) -> Option<CapabilityError> + Send + Sync + 'static,
    {
        self.failure_pattern = Some(Box::new(failures));
        self
    }

    pub fn hanging_on<F>(mut self, hangs: F) -> Self
    where
        F: Fn(u64) -> bool + Send + Sync + 'static,
    {
        self.hang_pattern = Some(Box::new(hangs));
        self
    }
}

impl Default for MockLandmarkExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LandmarkExtractor for MockLandmarkExtractor {
    async fn extract_landmarks(
        &self,
        frame: &Frame,
    ) -> Result<Option<LandmarkSet>, CapabilityError> {
        if self.hang_pattern.as_ref().is_some_and(|p| p(frame.frame_number)) {
            std::future::pending::<()>().await;
        }
        if let Some(error) = self.failure_pattern.as_ref().and_then(|p| p(frame.frame_number)) {
            return Err(error);
        }
        Ok((self.landmark_pattern)(frame.frame_number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tracking::frame::Keypoint;

    #[test]
    fn test_synthetic_source_limit_and_timestamps() {
        let mut source = SyntheticFrameSource::new(640, 480, 33).with_limit(2);

        let first = source.next_frame().unwrap();
        let second = source.next_frame().unwrap();
        assert_eq!(first.frame_number, 1);
        assert_eq!(second.timestamp.as_millis(), 66);
        assert!(source.next_frame().is_none());
    }

    #[tokio::test]
    async fn test_mock_locator_pattern_and_failures() {
        let bbox = BoundingBox::new(0.0, 0.0, 10.0, 12.0);
        let locator = MockFaceLocator::with_pattern(move |n| (n % 2 == 0).then_some(bbox))
            .failing_on(|n| (n == 3).then(|| CapabilityError::Transient("blip".into())));

        let frame = |n| Frame::metadata_only(100, 100, n * 10, n);
        assert_eq!(locator.locate(&frame(1)).await, Ok(None));
        assert_eq!(locator.locate(&frame(2)).await, Ok(Some(bbox)));
        assert!(locator.locate(&frame(3)).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_extractor_and_warm_up() {
        let set = LandmarkSet::new(vec![Keypoint::new(0.4, 0.5, 0.0)]);
        let extractor = MockLandmarkExtractor::with_fixed_landmarks(set.clone());
        let frame = Frame::metadata_only(100, 100, 0, 1);

        assert_eq!(extractor.extract_landmarks(&frame).await, Ok(Some(set)));
        assert!(extractor.warm_up().await.is_ok());
        assert!(MockFaceLocator::unavailable("no model").warm_up().await.is_err());
    }
}
