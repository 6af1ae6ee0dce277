// Operator input shaping: deadband plus squared response curve.

use crate::config::MAX_COMMAND;

/// Zero out stick values below the noise threshold, pass the rest through.
pub fn deadband(v: i32, threshold: i32) -> i32 {
    if v.abs() < threshold { 0 } else { v }
}

/// Squared response curve: compresses sensitivity at low deflection for
/// finer control while keeping 0 and full scale as fixed points.
pub fn signed_square(v: i32) -> f64 {
    let s = v as f64 / MAX_COMMAND;
    (s * s).copysign(s) * MAX_COMMAND
}

/// Apply the configured response curve to a deadbanded input.
pub fn shape(v: i32, square: bool) -> f64 {
    if square { signed_square(v) } else { v as f64 }
}
