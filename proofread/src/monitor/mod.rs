pub mod controller;
pub mod worker;

use std::time::Duration;

use crate::heuristics::HeuristicConfig;
use crate::pipeline::{DEFAULT_DEBOUNCE_MS, LengthBounds};

pub use controller::{MonitorController, MonitorSlot, StartStatus};
pub use worker::PipelineEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    pub bounds: LengthBounds,
    pub debounce: Duration,
    /// Deliver suggestions through the notifier. Events are published either way.
    pub notifications: bool,
    /// Run the heuristic checker on every change.
    pub local_checks: bool,
    pub heuristics: HeuristicConfig,
}

impl MonitorConfig {
    pub fn clipboard() -> Self {
        Self {
            bounds: LengthBounds::CLIPBOARD,
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            notifications: true,
            local_checks: false,
            heuristics: HeuristicConfig::default(),
        }
    }

    pub fn live_input() -> Self {
        Self {
            bounds: LengthBounds::LIVE_INPUT,
            local_checks: true,
            ..Self::clipboard()
        }
    }
}
