// Simulated chassis.
//
// Deterministic in-memory stand-in for the hardware driver: relative
// moves advance the modelled wheel positions by a fixed step on every
// position poll. Used by the runtime when hardware is disabled and by
// the test suite.

use super::bus::Result;
use super::ChassisIo;
use crate::drive::WheelCommand;

const FULL_SCALE_MILLIVOLTS: f64 = 12000.0;

pub struct SimChassis {
    throttle: WheelCommand,
    position_deg: [f64; 4],
    target_deg: [f64; 4],
    /// Degrees each wheel advances toward its target per position poll;
    /// zero models a stalled drivetrain
    pub step_deg: f64,
    heading_deg: f64,
    heading_ready: bool,
    trackers: (f64, f64),
}

impl SimChassis {
    pub fn new() -> Self {
        Self {
            throttle: WheelCommand::zero(),
            position_deg: [0.0; 4],
            target_deg: [0.0; 4],
            step_deg: 30.0,
            heading_deg: 0.0,
            heading_ready: false,
            trackers: (0.0, 0.0),
        }
    }

    pub fn throttle(&self) -> WheelCommand {
        self.throttle
    }

    pub fn targets_deg(&self) -> [f64; 4] {
        self.target_deg
    }

    pub fn set_heading(&mut self, degrees: f64, ready: bool) {
        self.heading_deg = degrees.rem_euclid(360.0);
        self.heading_ready = ready;
    }

    pub fn add_tracker_travel(&mut self, par: f64, perp: f64) {
        self.trackers.0 += par;
        self.trackers.1 += perp;
    }

    fn advance(&mut self) {
        for i in 0..4 {
            let remaining = self.target_deg[i] - self.position_deg[i];
            let step = self.step_deg.min(remaining.abs());
            self.position_deg[i] += step.copysign(remaining);
        }
    }
}

impl Default for SimChassis {
    fn default() -> Self {
        Self::new()
    }
}

impl ChassisIo for SimChassis {
    fn set_commands(&mut self, cmd: &WheelCommand) -> Result<()> {
        self.throttle = *cmd;
        Ok(())
    }

    fn move_relative(&mut self, offsets_deg: [f64; 4], _speed_dps: u16) -> Result<()> {
        for i in 0..4 {
            self.target_deg[i] = self.position_deg[i] + offsets_deg[i];
        }
        Ok(())
    }

    fn tare_positions(&mut self) -> Result<()> {
        self.position_deg = [0.0; 4];
        self.target_deg = [0.0; 4];
        Ok(())
    }

    fn positions_degrees(&mut self) -> Result<[f64; 4]> {
        self.advance();
        Ok(self.position_deg)
    }

    fn power_millivolts(&mut self) -> Result<[i16; 4]> {
        let mut out = [0i16; 4];
        for (i, v) in self.throttle.as_array().into_iter().enumerate() {
            out[i] = (v as f64 / 127.0 * FULL_SCALE_MILLIVOLTS) as i16;
        }
        Ok(out)
    }

    fn velocities_rpm(&mut self) -> Result<[f64; 4]> {
        // Free-spinning model: rpm proportional to throttle
        let mut out = [0.0; 4];
        for (i, v) in self.throttle.as_array().into_iter().enumerate() {
            out[i] = v as f64 / 127.0 * 200.0;
        }
        Ok(out)
    }

    fn heading_ready(&mut self) -> Result<bool> {
        Ok(self.heading_ready)
    }

    fn heading_degrees(&mut self) -> Result<f64> {
        Ok(self.heading_deg)
    }

    fn tracker_displacements(&mut self) -> Result<(f64, f64)> {
        Ok(self.trackers)
    }

    fn reset_trackers(&mut self) -> Result<()> {
        self.trackers = (0.0, 0.0);
        Ok(())
    }
}
