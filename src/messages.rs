// Message types exchanged over zenoh

use serde::{Deserialize, Serialize};

use crate::drive::WheelCommand;
use crate::odometry::Pose;

// Command from teleop/scripts -> runtime
//
// Intent components are integers in [-127, 127]: positive forward is
// toward the front of the robot, positive strafe is to its right,
// positive rotate is clockwise viewed from above.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DriveCommand {
    pub forward: i32,
    pub strafe: i32,
    pub rotate: i32,
    #[serde(default)]
    pub field_centric: bool,
}

// Actuation output from runtime -> observers
// Defaults to all zero because a stale watchdog publishes the stop command
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WheelActuation {
    pub front_left: i32,
    pub front_right: i32,
    pub back_left: i32,
    pub back_right: i32,
}

impl From<&WheelCommand> for WheelActuation {
    fn from(cmd: &WheelCommand) -> Self {
        Self {
            front_left: cmd.front_left,
            front_right: cmd.front_right,
            back_left: cmd.back_left,
            back_right: cmd.back_right,
        }
    }
}

/// Field-frame pose published by the runtime. Position in inches,
/// heading in radians within (-pi, pi].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PoseEstimate {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

impl From<Pose> for PoseEstimate {
    fn from(p: Pose) -> Self {
        Self {
            x: p.x,
            y: p.y,
            theta: p.theta,
        }
    }
}

/// Per-wheel telemetry published at reduced rate, ordered (FL, FR, BL, BR).
/// Power is the commanded output as a percentage of full scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WheelTelemetry {
    pub power_pct: [f64; 4],
    pub velocity_rpm: [f64; 4],
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
}
