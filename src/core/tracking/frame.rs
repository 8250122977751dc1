use std::time::Duration;

use image::RgbImage;
use serde::{Deserialize, Serialize};

/// 视频帧（RGBA），只在当前检测周期内持有
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>, // RGBA 格式
    pub timestamp: Duration,
    pub frame_number: u64,
}

impl Frame {
    pub fn new(
        width: u32,
        height: u32,
        data: Vec<u8>,
        timestamp_ms: u64,
        frame_number: u64,
    ) -> Self {
        Self {
            width,
            height,
            data,
            timestamp: Duration::from_millis(timestamp_ms),
            frame_number,
        }
    }

    /// Frame with dimensions and timing only, for sources that hand pixels to the
    /// capabilities out of band.
    pub fn metadata_only(width: u32, height: u32, timestamp_ms: u64, frame_number: u64) -> Self {
        Self::new(width, height, Vec::new(), timestamp_ms, frame_number)
    }

    pub fn has_valid_size(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn info(&self) -> FrameInfo {
        FrameInfo::from_frame(self)
    }

    /// Drops alpha for detectors that take an RGB buffer. `None` when the pixel
    /// buffer does not match the frame size.
    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        let expected = self.width as usize * self.height as usize * 4;
        if self.data.len() != expected {
            return None;
        }
        let rgb: Vec<u8> = self
            .data
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect();
        RgbImage::from_raw(self.width, self.height, rgb)
    }
}

/// 帧元数据（轻量级，用于传递信息）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameInfo {
    pub width: u32,
    pub height: u32,
    pub timestamp_ms: u64,
    pub frame_number: u64,
}

impl FrameInfo {
    pub fn from_frame(frame: &Frame) -> Self {
        Self {
            width: frame.width,
            height: frame.height,
            timestamp_ms: frame.timestamp.as_millis() as u64,
            frame_number: frame.frame_number,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.width as f64 / 2.0, self.height as f64 / 2.0)
    }

    /// Distance from `(x, y)` (pixels) to the frame center, as a fraction of the
    /// frame width. Resolution independent.
    pub fn center_offset(&self, x: f64, y: f64) -> f64 {
        let (cx, cy) = self.center();
        (x - cx).hypot(y - cy) / self.width as f64
    }
}

/// 相机原生层传来的 YUV420 帧
#[derive(Debug)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    pub y_plane: Vec<u8>,
    pub u_plane: Vec<u8>,
    pub v_plane: Vec<u8>,
    pub timestamp_ms: u64,
    pub frame_number: u64,
}

impl CameraFrame {
    /// BT.601 full-range conversion. Chroma planes are subsampled 2x2 and round
    /// up for odd sizes; missing samples are treated as neutral grey.
    pub fn to_frame(&self) -> Frame {
        let w = self.width as usize;
        let h = self.height as usize;
        let chroma_w = w.div_ceil(2);
        let mut rgba = Vec::with_capacity(w * h * 4);

        for row in 0..h {
            for col in 0..w {
                let luma = self.y_plane.get(row * w + col).copied().unwrap_or(0) as f32;
                let ci = (row / 2) * chroma_w + col / 2;
                let u = self.u_plane.get(ci).copied().unwrap_or(128) as f32 - 128.0;
                let v = self.v_plane.get(ci).copied().unwrap_or(128) as f32 - 128.0;

                rgba.push((luma + 1.402 * v).clamp(0.0, 255.0) as u8);
                rgba.push((luma - 0.344_136 * u - 0.714_136 * v).clamp(0.0, 255.0) as u8);
                rgba.push((luma + 1.772 * u).clamp(0.0, 255.0) as u8);
                rgba.push(255);
            }
        }

        Frame::new(
            self.width,
            self.height,
            rgba,
            self.timestamp_ms,
            self.frame_number,
        )
    }
}

/// 人脸框（像素坐标），每次检测新建
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x_min: f64, y_min: f64, width: f64, height: f64) -> Self {
        Self {
            x_min,
            y_min,
            width,
            height,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x_min + self.width / 2.0, self.y_min + self.height / 2.0)
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.height / self.width
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0.0
            && self.height > 0.0
            && self.x_min.is_finite()
            && self.y_min.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
    }
}

/// x/y normalized to [0, 1] of frame width/height; z is relative depth with no
/// absolute scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Keypoint {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn midpoint(&self, other: &Keypoint) -> Keypoint {
        Keypoint {
            x: (self.x + other.x) / 2.0,
            y: (self.y + other.y) / 2.0,
            z: (self.z + other.z) / 2.0,
        }
    }

    pub fn distance(&self, other: &Keypoint) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z - self.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// `alpha * self + (1 - alpha) * raw`, componentwise.
    pub fn blend(&self, raw: &Keypoint, alpha: f64) -> Keypoint {
        let keep = 1.0 - alpha;
        Keypoint {
            x: alpha * self.x + keep * raw.x,
            y: alpha * self.y + keep * raw.y,
            z: alpha * self.z + keep * raw.z,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// 有序关键点集合，同一提取器下索引稳定（索引 i 始终对应同一解剖点）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkSet {
    pub points: Vec<Keypoint>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Keypoint>) -> Self {
        Self { points }
    }

    /// Converts pixel coordinates from an extractor into the normalized space.
    /// `z` is passed through.
    pub fn from_pixels(points: &[Keypoint], frame_width: u32, frame_height: u32) -> Self {
        let w = frame_width.max(1) as f64;
        let h = frame_height.max(1) as f64;
        Self {
            points: points
                .iter()
                .map(|p| Keypoint::new(p.x / w, p.y / h, p.z))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Keypoint> {
        self.points.get(index)
    }

    /// Front cameras are displayed mirrored; flip x so the overlay follows the
    /// image the user sees.
    pub fn mirrored(&self) -> Self {
        Self {
            points: self
                .points
                .iter()
                .map(|p| Keypoint::new(1.0 - p.x, p.y, p.z))
                .collect(),
        }
    }

    pub fn to_pixel(&self, index: usize, info: &FrameInfo) -> Option<(f64, f64)> {
        self.get(index)
            .map(|p| (p.x * info.width as f64, p.y * info.height as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_creation() {
        let data = vec![255u8; 100 * 100 * 4];
        let frame = Frame::new(100, 100, data, 1000, 30);

        assert!(frame.has_valid_size());
        assert_eq!(frame.timestamp.as_millis(), 1000);
        assert_eq!(frame.info().frame_number, 30);
        assert_eq!(frame.info().timestamp_ms, 1000);
    }

    #[test]
    fn test_to_rgb_image() {
        let frame = Frame::new(4, 2, vec![10u8; 4 * 2 * 4], 0, 0);
        let img = frame.to_rgb_image().unwrap();
        assert_eq!(img.dimensions(), (4, 2));
        assert_eq!(img.get_pixel(3, 1).0, [10, 10, 10]);

        let short = Frame::new(4, 2, vec![0u8; 3], 0, 0);
        assert!(short.to_rgb_image().is_none());
    }

    #[test]
    fn test_camera_frame_grey_conversion() {
        let camera = CameraFrame {
            width: 8,
            height: 4,
            y_plane: vec![128u8; 32],
            u_plane: vec![128u8; 8],
            v_plane: vec![128u8; 8],
            timestamp_ms: 66,
            frame_number: 2,
        };

        let frame = camera.to_frame();
        assert_eq!(frame.data.len(), 8 * 4 * 4);
        assert_eq!(&frame.data[0..4], &[128, 128, 128, 255]);
        assert_eq!(frame.frame_number, 2);
    }

    #[test]
    fn test_camera_frame_odd_width_chroma_rows() {
        // 3x4 luma, 2x2 chroma: the second chroma row starts at index 2
        let camera = CameraFrame {
            width: 3,
            height: 4,
            y_plane: vec![128u8; 12],
            u_plane: vec![128u8; 4],
            v_plane: vec![128, 128, 200, 128],
            timestamp_ms: 0,
            frame_number: 1,
        };

        let frame = camera.to_frame();
        let pixel = |row: usize, col: usize| {
            let i = (row * 3 + col) * 4;
            [frame.data[i], frame.data[i + 1], frame.data[i + 2]]
        };
        assert_eq!(pixel(0, 2), [128, 128, 128]);
        assert_eq!(pixel(2, 0), [228, 76, 128]);
        assert_eq!(pixel(3, 1), [228, 76, 128]);
        assert_eq!(pixel(2, 2), [128, 128, 128]);
    }

    #[test]
    fn test_center_offset_is_resolution_independent() {
        let small = FrameInfo { width: 640, height: 480, timestamp_ms: 0, frame_number: 0 };
        let large = FrameInfo { width: 1280, height: 960, timestamp_ms: 0, frame_number: 0 };

        let a = small.center_offset(320.0 + 64.0, 240.0);
        let b = large.center_offset(640.0 + 128.0, 480.0);
        assert!((a - 0.1).abs() < 1e-12);
        assert!((a - b).abs() < 1e-12);
    }

    #[test]
    fn test_bounding_box_center_and_validity() {
        let bbox = BoundingBox::new(10.0, 20.0, 100.0, 130.0);
        assert_eq!(bbox.center(), (60.0, 85.0));
        assert!((bbox.aspect_ratio() - 1.3).abs() < 1e-12);
        assert!(bbox.is_valid());
        assert!(!BoundingBox::new(0.0, 0.0, 0.0, 10.0).is_valid());
    }

    #[test]
    fn test_landmarks_from_pixels_and_mirror() {
        let set = LandmarkSet::from_pixels(&[Keypoint::new(160.0, 120.0, -3.0)], 640, 480);
        assert_eq!(set.points[0], Keypoint::new(0.25, 0.25, -3.0));

        let flipped = set.mirrored();
        assert_eq!(flipped.points[0], Keypoint::new(0.75, 0.25, -3.0));
    }
}
