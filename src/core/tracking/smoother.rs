use log::debug;

use super::frame::{Keypoint, LandmarkSet};

/// 关键点指数平滑：smoothed = α·prev + (1−α)·raw
///
/// The first update after a reset seeds directly from the raw input, so the
/// filter never blends against history from before a tracking gap.
pub struct LandmarkSmoother {
    alpha: f64,
    state: Option<Vec<Keypoint>>,
}

impl LandmarkSmoother {
    pub fn new(alpha: f64) -> Self {
        Self { alpha, state: None }
    }

    pub fn update(&mut self, raw: &LandmarkSet) -> LandmarkSet {
        let smoothed: Vec<Keypoint> = match self.state.as_ref() {
            Some(prev) if prev.len() == raw.len() => prev
                .iter()
                .zip(raw.points.iter())
                .map(|(p, r)| p.blend(r, self.alpha))
                .collect(),
            Some(prev) => {
                debug!(
                    "landmark count changed {} -> {}, reseeding smoother",
                    prev.len(),
                    raw.len()
                );
                raw.points.clone()
            }
            None => raw.points.clone(),
        };

        self.state = Some(smoothed.clone());
        LandmarkSet::new(smoothed)
    }

    pub fn reset(&mut self) {
        self.state = None;
    }

    pub fn is_seeded(&self) -> bool {
        self.state.is_some()
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}
