//! Poll Queue Implementation

use obd_protocol::Pid;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::trace;

/// Every `SECONDARY_STRIDE`-th tick queries the secondary queue, giving the
/// priority set ~80% of bus bandwidth. Worst-case staleness of a secondary
/// parameter is `secondary_len * SECONDARY_STRIDE * tick_interval`.
pub const SECONDARY_STRIDE: u64 = 5;

/// Configuration for the polling schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Interval between queries in milliseconds
    pub tick_interval_ms: u64,
    /// High-rate PIDs (the primary gauges)
    pub priority: Vec<Pid>,
    /// Low-rate PIDs (everything else on the dashboard)
    pub secondary: Vec<Pid>,
    /// Consecutive write failures tolerated before the session faults
    pub max_write_failures: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            priority: vec![
                Pid::Rpm,
                Pid::Speed,
                Pid::CoolantTemp,
                Pid::EngineLoad,
                Pid::ThrottlePosition,
                Pid::IntakePressure,
            ],
            secondary: vec![
                Pid::OilTemp,
                Pid::IntakeTemp,
                Pid::AmbientTemp,
                Pid::FuelLevel,
                Pid::FuelRate,
                Pid::FuelPressure,
                Pid::Maf,
                Pid::BarometricPressure,
                Pid::ActualTorque,
                Pid::ReferenceTorque,
                Pid::AcceleratorPosition,
                Pid::CommandedEgr,
                Pid::EgrError,
                Pid::ControlModuleVoltage,
                Pid::RunTime,
            ],
            max_write_failures: 5,
        }
    }
}

impl SchedulerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Two cyclic PID sequences with a cursor into each and a tick counter.
///
/// Mutated only by its owner's tick; queue membership is configuration and
/// independent of decode logic.
pub struct PollQueue {
    priority: Vec<Pid>,
    secondary: Vec<Pid>,
    priority_cursor: usize,
    secondary_cursor: usize,
    cycle: u64,
}

impl PollQueue {
    pub fn new(priority: Vec<Pid>, secondary: Vec<Pid>) -> Self {
        Self {
            priority,
            secondary,
            priority_cursor: 0,
            secondary_cursor: 0,
            cycle: 0,
        }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(config.priority.clone(), config.secondary.clone())
    }

    /// Pick the PID for this tick and advance.
    ///
    /// Ticks where `cycle mod SECONDARY_STRIDE == SECONDARY_STRIDE - 1`
    /// draw from the secondary queue; all others draw from the priority
    /// queue. Each queue wraps after its last element. Returns `None` only
    /// when both queues are empty.
    pub fn next(&mut self) -> Option<Pid> {
        let take_secondary = self.cycle % SECONDARY_STRIDE == SECONDARY_STRIDE - 1;
        self.cycle = self.cycle.wrapping_add(1);

        let pid = if take_secondary && !self.secondary.is_empty() {
            let pid = self.secondary[self.secondary_cursor];
            self.secondary_cursor = (self.secondary_cursor + 1) % self.secondary.len();
            pid
        } else if !self.priority.is_empty() {
            let pid = self.priority[self.priority_cursor];
            self.priority_cursor = (self.priority_cursor + 1) % self.priority.len();
            pid
        } else if !self.secondary.is_empty() {
            let pid = self.secondary[self.secondary_cursor];
            self.secondary_cursor = (self.secondary_cursor + 1) % self.secondary.len();
            pid
        } else {
            return None;
        };

        trace!("tick {}: polling {:?}", self.cycle - 1, pid);
        Some(pid)
    }

    /// Ticks issued so far.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }
}
