// Hardware chassis driver.
//
// Implements the chassis capability interface on top of the device bus
// and owns the bring-up sequence. Per-wheel reversal flags are applied
// here, so everything above the driver works in one sign convention.

use std::f64::consts::PI;
use std::thread::sleep;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::bus::{ControlMode, DeviceBus, Result};
use super::ChassisIo;
use crate::config::{
    HEADING_ID, TRACKER_PAR_ID, TRACKER_PERP_ID, TRACKER_TICKS_PER_REV, TRACKER_WHEEL_DIAMETER,
    WHEEL_IDS, WHEEL_REVERSED,
};
use crate::drive::WheelCommand;

// Heading units calibrate in well under this many 10 ms polls
const CALIBRATION_POLLS: u32 = 250;

/// Hardware chassis: four wheel motors, two tracking encoders, one
/// heading unit, all on the configured serial bus.
pub struct ChassisDriver {
    bus: DeviceBus,
    wheel_ids: [u8; 4],
    reversed: [bool; 4],
    tracker_ids: [u8; 2],
    heading_id: u8,
    heading_present: bool,
}

impl ChassisDriver {
    /// Connect to the bus with the configured device layout
    pub fn new(port: &str) -> Result<Self> {
        info!("Opening chassis bus on {}", port);
        let bus = DeviceBus::open(port)?;
        Ok(Self {
            bus,
            wheel_ids: WHEEL_IDS,
            reversed: WHEEL_REVERSED,
            tracker_ids: [TRACKER_PAR_ID, TRACKER_PERP_ID],
            heading_id: HEADING_ID,
            heading_present: false,
        })
    }

    /// Bring the chassis up for open-loop driving.
    ///
    /// Pings every device, puts the wheels in throttle mode with torque
    /// enabled, zeroes the tracking encoders, and waits for the heading
    /// unit to finish calibrating. A missing or slow heading unit is
    /// not fatal: it just stays not-ready.
    pub fn initialize(&mut self) -> Result<()> {
        info!("Initializing wheels {:?} for throttle control", self.wheel_ids);

        for &id in &self.wheel_ids {
            match self.bus.ping(id) {
                Ok(true) => debug!("Wheel {} responding", id),
                Ok(false) => {
                    warn!("Wheel {} not responding to ping", id);
                    return Err(super::bus::BusError::Timeout { id });
                }
                Err(e) => return Err(e),
            }
        }

        // Mode changes require torque off
        for &id in &self.wheel_ids {
            self.bus.disable_torque(id)?;
        }
        for &id in &self.wheel_ids {
            self.bus.set_control_mode(id, ControlMode::Throttle)?;
        }
        for &id in &self.wheel_ids {
            self.bus.enable_torque(id)?;
        }

        for &id in &self.tracker_ids {
            if !self.bus.ping(id)? {
                warn!("Tracking encoder {} not responding to ping", id);
                return Err(super::bus::BusError::Timeout { id });
            }
            self.bus.reset_encoder(id)?;
        }

        self.heading_present = self.bus.ping(self.heading_id)?;
        if self.heading_present {
            for _ in 0..CALIBRATION_POLLS {
                if self.bus.heading_ready(self.heading_id)? {
                    break;
                }
                sleep(Duration::from_millis(10));
            }
            if !self.bus.heading_ready(self.heading_id)? {
                warn!("Heading unit still calibrating after bring-up window");
            }
        } else {
            warn!("Heading unit absent, field-centric drive and odometry disabled");
        }

        info!("Chassis initialized");
        Ok(())
    }

    /// Stop all wheels immediately
    pub fn stop(&mut self) -> Result<()> {
        info!("Stopping all wheels");
        self.set_commands(&WheelCommand::zero())
    }

    fn sign(&self, i: usize) -> f64 {
        if self.reversed[i] { -1.0 } else { 1.0 }
    }

    fn inches_per_tick() -> f64 {
        PI * TRACKER_WHEEL_DIAMETER / TRACKER_TICKS_PER_REV
    }
}

impl ChassisIo for ChassisDriver {
    fn set_commands(&mut self, cmd: &WheelCommand) -> Result<()> {
        let values = cmd.as_array();
        debug!(
            "Setting wheel commands: fl={}, fr={}, bl={}, br={}",
            values[0], values[1], values[2], values[3]
        );

        let mut data = [(0u8, 0i16); 4];
        for (i, slot) in data.iter_mut().enumerate() {
            *slot = (
                self.wheel_ids[i],
                (values[i] as f64 * self.sign(i)) as i16,
            );
        }
        self.bus
            .sync_write_i16(super::bus::Register::Throttle, &data)
    }

    fn move_relative(&mut self, offsets_deg: [f64; 4], speed_dps: u16) -> Result<()> {
        for i in 0..4 {
            self.bus
                .move_relative(self.wheel_ids[i], offsets_deg[i] * self.sign(i), speed_dps)?;
        }
        Ok(())
    }

    fn tare_positions(&mut self) -> Result<()> {
        for &id in &self.wheel_ids {
            self.bus.tare_position(id)?;
        }
        Ok(())
    }

    fn positions_degrees(&mut self) -> Result<[f64; 4]> {
        let mut out = [0.0; 4];
        for i in 0..4 {
            out[i] = self.bus.position_degrees(self.wheel_ids[i])? * self.sign(i);
        }
        Ok(out)
    }

    fn power_millivolts(&mut self) -> Result<[i16; 4]> {
        let mut out = [0i16; 4];
        for i in 0..4 {
            let mv = self.bus.voltage_millivolts(self.wheel_ids[i])?;
            out[i] = if self.reversed[i] { -mv } else { mv };
        }
        Ok(out)
    }

    fn velocities_rpm(&mut self) -> Result<[f64; 4]> {
        let mut out = [0.0; 4];
        for i in 0..4 {
            out[i] = self.bus.velocity_rpm(self.wheel_ids[i])? as f64 * self.sign(i);
        }
        Ok(out)
    }

    fn heading_ready(&mut self) -> Result<bool> {
        if !self.heading_present {
            return Ok(false);
        }
        self.bus.heading_ready(self.heading_id)
    }

    fn heading_degrees(&mut self) -> Result<f64> {
        self.bus.heading_degrees(self.heading_id)
    }

    fn tracker_displacements(&mut self) -> Result<(f64, f64)> {
        let par = self.bus.encoder_count(self.tracker_ids[0])? as f64 * Self::inches_per_tick();
        let perp = self.bus.encoder_count(self.tracker_ids[1])? as f64 * Self::inches_per_tick();
        Ok((par, perp))
    }

    fn reset_trackers(&mut self) -> Result<()> {
        for &id in &self.tracker_ids {
            self.bus.reset_encoder(id)?;
        }
        Ok(())
    }
}

impl Drop for ChassisDriver {
    fn drop(&mut self) {
        // Best-effort stop so a crashed runtime doesn't leave wheels spinning
        if let Err(e) = self.stop() {
            warn!("Failed to stop wheels on drop: {}", e);
        }
    }
}
