// Drive control for the X-configuration holonomic base
//
// Provides:
// - Operator input shaping (deadband, squared response)
// - X-drive inverse kinematics with optional field-centric rotation
//   and ratio-preserving command saturation
// - Open-loop motion primitives for autonomous moves

pub mod kinematics;
pub mod motion;
pub mod shaping;

pub use kinematics::{wheel_commands, WheelCommand};
pub use motion::{MotionError, MotionKind, MotionSequencer, MotionTarget};
