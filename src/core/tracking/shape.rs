//! 脸型分类：根据人脸框高宽比划分五类脸型，并给出推荐镜框款式

use serde::{Deserialize, Serialize};

use super::frame::BoundingBox;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaceShape {
    Round,
    Square,
    Heart,
    Oblong,
    Oval,
}

/// 镜框款式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameStyle {
    Rectangular,
    Square,
    Aviator,
    Round,
    Oversize,
    Butterfly,
    Browline,
}

impl FaceShape {
    /// Canonical partition of height / width:
    ///
    /// | ratio              | shape  |
    /// |--------------------|--------|
    /// | `> 1.5`            | Oblong |
    /// | `< 1.2`            | Round  |
    /// | `[1.2, 1.3]`       | Square |
    /// | `(1.3, 1.5]`       | Heart  |
    /// | anything else (NaN)| Oval   |
    pub fn from_aspect_ratio(ratio: f64) -> Self {
        if ratio > 1.5 {
            FaceShape::Oblong
        } else if ratio < 1.2 {
            FaceShape::Round
        } else if (1.2..=1.3).contains(&ratio) {
            FaceShape::Square
        } else if ratio > 1.3 && ratio <= 1.5 {
            FaceShape::Heart
        } else {
            FaceShape::Oval
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FaceShape::Round => "round",
            FaceShape::Square => "square",
            FaceShape::Heart => "heart",
            FaceShape::Oblong => "oblong",
            FaceShape::Oval => "oval",
        }
    }

    pub fn recommended_styles(&self) -> &'static [FrameStyle] {
        match self {
            FaceShape::Round => &[FrameStyle::Rectangular, FrameStyle::Square, FrameStyle::Aviator],
            FaceShape::Square => &[FrameStyle::Round, FrameStyle::Aviator, FrameStyle::Oversize],
            FaceShape::Heart => &[FrameStyle::Aviator, FrameStyle::Butterfly, FrameStyle::Round],
            FaceShape::Oblong => &[FrameStyle::Oversize, FrameStyle::Butterfly, FrameStyle::Browline],
            FaceShape::Oval => &[FrameStyle::Rectangular, FrameStyle::Aviator, FrameStyle::Round],
        }
    }
}

impl std::fmt::Display for FaceShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FrameStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameStyle::Rectangular => "rectangular",
            FrameStyle::Square => "square",
            FrameStyle::Aviator => "aviator",
            FrameStyle::Round => "round",
            FrameStyle::Oversize => "oversize",
            FrameStyle::Butterfly => "butterfly",
            FrameStyle::Browline => "browline",
        }
    }
}

/// Stateless; callable on demand against the latest detection.
pub struct ShapeClassifier;

impl ShapeClassifier {
    pub fn classify(bbox: &BoundingBox) -> FaceShape {
        FaceShape::from_aspect_ratio(bbox.aspect_ratio())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn box_with_ratio(ratio: f64) -> BoundingBox {
        BoundingBox::new(0.0, 0.0, 100.0, 100.0 * ratio)
    }

    #[test]
    fn test_classify_intervals() {
        assert_eq!(ShapeClassifier::classify(&box_with_ratio(0.9)), FaceShape::Round);
        assert_eq!(ShapeClassifier::classify(&box_with_ratio(1.25)), FaceShape::Square);
        assert_eq!(ShapeClassifier::classify(&box_with_ratio(1.4)), FaceShape::Heart);
        assert_eq!(ShapeClassifier::classify(&box_with_ratio(1.8)), FaceShape::Oblong);
    }

    #[test]
    fn test_boundaries() {
        assert_eq!(FaceShape::from_aspect_ratio(1.2), FaceShape::Square);
        assert_eq!(FaceShape::from_aspect_ratio(1.3), FaceShape::Square);
        assert_eq!(FaceShape::from_aspect_ratio(1.5), FaceShape::Heart);
        assert_eq!(FaceShape::from_aspect_ratio(1.500_000_1), FaceShape::Oblong);
        assert_eq!(FaceShape::from_aspect_ratio(1.199_999_9), FaceShape::Round);
        assert_eq!(FaceShape::from_aspect_ratio(1.300_000_1), FaceShape::Heart);
    }

    #[test]
    fn test_partition_has_no_gaps_or_overlaps() {
        let predicates: [fn(f64) -> bool; 4] = [
            |r| r > 1.5,
            |r| r < 1.2,
            |r| (1.2..=1.3).contains(&r),
            |r| r > 1.3 && r <= 1.5,
        ];

        for i in 1..=4000 {
            let ratio = i as f64 * 0.001;
            let hits = predicates.iter().filter(|p| p(ratio)).count();
            assert_eq!(hits, 1, "ratio {} matched {} intervals", ratio, hits);
            assert_ne!(FaceShape::from_aspect_ratio(ratio), FaceShape::Oval);
        }
    }

    #[test]
    fn test_nan_ratio_falls_through_to_oval() {
        assert_eq!(FaceShape::from_aspect_ratio(f64::NAN), FaceShape::Oval);
    }

    #[test]
    fn test_recommendations() {
        assert_eq!(
            FaceShape::Oblong.recommended_styles(),
            &[FrameStyle::Oversize, FrameStyle::Butterfly, FrameStyle::Browline]
        );
        assert_eq!(FaceShape::Heart.to_string(), "heart");
        assert_eq!(serde_json::to_string(&FaceShape::Square).unwrap(), "\"square\"");
    }
}
