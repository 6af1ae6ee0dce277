// Chassis hardware access for the X-drive base
//
// Provides:
// - Serial device bus protocol (wheel motors, tracking encoders, heading unit)
// - High-level hardware driver implementing the chassis capability interface
// - Simulated chassis for tests and hardware-less runs

mod driver;
mod sim;

pub mod bus;

pub use bus::{BusError, DeviceBus};
pub use driver::ChassisDriver;
pub use sim::SimChassis;

use crate::drive::WheelCommand;

/// Everything the control loop and the motion sequencer need from a
/// chassis, hardware-backed or simulated. Implementations are chosen at
/// construction time; wheel arrays are ordered (FL, FR, BL, BR).
pub trait ChassisIo {
    /// Commit all four wheel throttles as one logical update
    fn set_commands(&mut self, cmd: &WheelCommand) -> bus::Result<()>;

    /// Start a relative move per wheel, in wheel degrees at `speed_dps`
    fn move_relative(&mut self, offsets_deg: [f64; 4], speed_dps: u16) -> bus::Result<()>;

    /// Zero every wheel's position reference
    fn tare_positions(&mut self) -> bus::Result<()>;

    /// Wheel positions in degrees since the last tare
    fn positions_degrees(&mut self) -> bus::Result<[f64; 4]>;

    /// Commanded wheel output in millivolts (sign indicates direction)
    fn power_millivolts(&mut self) -> bus::Result<[i16; 4]>;

    /// Measured wheel velocities in rpm
    fn velocities_rpm(&mut self) -> bus::Result<[f64; 4]>;

    /// False while the heading unit is calibrating or absent
    fn heading_ready(&mut self) -> bus::Result<bool>;

    /// Absolute heading in degrees, [0, 360)
    fn heading_degrees(&mut self) -> bus::Result<f64>;

    /// Cumulative tracking wheel travel since reset, in inches,
    /// (parallel, perpendicular)
    fn tracker_displacements(&mut self) -> bus::Result<(f64, f64)>;

    /// Zero both tracking encoders
    fn reset_trackers(&mut self) -> bus::Result<()>;
}
