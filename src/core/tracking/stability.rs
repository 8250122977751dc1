/// 人脸稳定性状态：把逐帧的"是否检测到 / 是否居中"信号去抖成"稳定居中"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilityState {
    NoFace,
    OffCenter,
    Centering { count: u32 },
    Stable,
}

impl StabilityState {
    pub fn new() -> Self {
        StabilityState::NoFace
    }

    pub fn transition(
        &self,
        detected: bool,
        centered: bool,
        config: &StabilityConfig,
    ) -> (StabilityState, StabilityAction) {
        let next = if !detected {
            StabilityState::NoFace
        } else if !centered {
            StabilityState::OffCenter
        } else {
            match self {
                StabilityState::Stable => StabilityState::Stable,
                StabilityState::Centering { count } => {
                    Self::advance(count.saturating_add(1), config)
                }
                StabilityState::NoFace | StabilityState::OffCenter => Self::advance(1, config),
            }
        };

        let action = match (self.is_stable(), next.is_stable()) {
            (false, true) => StabilityAction::Acquire,
            (true, true) => StabilityAction::Track,
            (true, false) => StabilityAction::Release,
            (false, false) => StabilityAction::Hold,
        };

        (next, action)
    }

    fn advance(count: u32, config: &StabilityConfig) -> StabilityState {
        if count >= config.required_frames {
            StabilityState::Stable
        } else {
            StabilityState::Centering { count }
        }
    }

    pub fn is_stable(&self) -> bool {
        matches!(self, StabilityState::Stable)
    }

    pub fn face_present(&self) -> bool {
        !matches!(self, StabilityState::NoFace)
    }
}

impl Default for StabilityState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilityAction {
    /// Not stable, nothing to track yet.
    Hold,
    /// Just became stable: smoothing starts from a fresh seed.
    Acquire,
    Track,
    /// Left stable: smoothed history must be dropped.
    Release,
}

impl StabilityAction {
    pub fn tracking_enabled(&self) -> bool {
        matches!(self, StabilityAction::Acquire | StabilityAction::Track)
    }
}

#[derive(Debug, Clone)]
pub struct StabilityConfig {
    pub required_frames: u32,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            required_frames: 15,
        }
    }
}

pub struct StabilityTracker {
    state: StabilityState,
    config: StabilityConfig,
    cycle_counter: u64,
}

impl StabilityTracker {
    pub fn new() -> Self {
        Self::with_config(StabilityConfig::default())
    }

    pub fn with_config(config: StabilityConfig) -> Self {
        Self {
            state: StabilityState::new(),
            config,
            cycle_counter: 0,
        }
    }

    pub fn process_cycle(&mut self, detected: bool, centered: bool) -> StabilityAction {
        self.cycle_counter += 1;

        let (new_state, action) = self.state.transition(detected, centered, &self.config);
        self.state = new_state;

        action
    }

    pub fn current_state(&self) -> StabilityState {
        self.state
    }

    pub fn is_stable(&self) -> bool {
        self.state.is_stable()
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_counter
    }

    pub fn reset(&mut self) {
        self.state = StabilityState::new();
        self.cycle_counter = 0;
    }
}

impl Default for StabilityTracker {
    fn default() -> Self {
        Self::new()
    }
}
