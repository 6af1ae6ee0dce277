// X-drive inverse kinematics.
// Converts a (forward, strafe, rotate) intent into four wheel commands:
// shaping, optional field-frame rotation, the fixed-gain mix, then
// ratio-preserving saturation to the actuator range.

use crate::config::{DEADBAND, MAX_COMMAND, SQUARE_INPUTS};

use super::shaping::{deadband, shape};

/// Final per-wheel commands, each in [-127, 127].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WheelCommand {
    pub front_left: i32,
    pub front_right: i32,
    pub back_left: i32,
    pub back_right: i32,
}

impl WheelCommand {
    pub fn new(front_left: i32, front_right: i32, back_left: i32, back_right: i32) -> Self {
        Self {
            front_left,
            front_right,
            back_left,
            back_right,
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// Commands as an array ordered (FL, FR, BL, BR)
    pub fn as_array(&self) -> [i32; 4] {
        [
            self.front_left,
            self.front_right,
            self.back_left,
            self.back_right,
        ]
    }
}

/// Rotate a field-frame (forward, strafe) intent into the robot frame
/// for the given heading (radians, increasing clockwise from above).
pub fn field_to_robot(df: f64, ds: f64, heading_rad: f64) -> (f64, f64) {
    let (sin, cos) = heading_rad.sin_cos();
    let rf = df * cos - ds * sin;
    let rs = ds * cos + df * sin;
    (rf, rs)
}

/// Fixed-gain mix for an X-configuration chassis.
/// +df is forward, +ds is rightward strafe, +dr is clockwise rotation,
/// all in the robot frame. Returned order is (FL, FR, BL, BR).
pub fn mix(df: f64, ds: f64, dr: f64) -> [f64; 4] {
    [
        df + ds + dr,
        df - ds - dr,
        df - ds + dr,
        df + ds - dr,
    ]
}

/// Saturate four wheel values to [-ceiling, ceiling] by scaling them
/// together, so the commanded direction survives saturation. Values
/// already within the ceiling come back unchanged.
pub fn normalize(mut wheels: [f64; 4], ceiling: f64) -> [f64; 4] {
    let maxmag = wheels.iter().fold(ceiling, |m, w| m.max(w.abs()));
    if maxmag > ceiling {
        let k = ceiling / maxmag;
        for w in &mut wheels {
            *w *= k;
        }
    }
    wheels
}

/// Full drive pipeline with the configured shaping constants.
///
/// `heading_rad` carries the current heading when field-centric control
/// is active; `None` (feature off, or heading unit absent/calibrating)
/// leaves the intent in the robot frame.
pub fn wheel_commands(
    forward: i32,
    strafe: i32,
    rotate: i32,
    heading_rad: Option<f64>,
) -> WheelCommand {
    wheel_commands_with_params(
        forward,
        strafe,
        rotate,
        heading_rad,
        DEADBAND,
        SQUARE_INPUTS,
        MAX_COMMAND,
    )
}

/// Drive pipeline with explicit shaping parameters.
pub fn wheel_commands_with_params(
    forward: i32,
    strafe: i32,
    rotate: i32,
    heading_rad: Option<f64>,
    deadband_threshold: i32,
    square: bool,
    ceiling: f64,
) -> WheelCommand {
    let mut df = shape(deadband(forward, deadband_threshold), square);
    let mut ds = shape(deadband(strafe, deadband_threshold), square);
    let dr = shape(deadband(rotate, deadband_threshold), square);

    if let Some(heading) = heading_rad {
        (df, ds) = field_to_robot(df, ds, heading);
    }

    let wheels = normalize(mix(df, ds, dr), ceiling);

    WheelCommand::new(
        wheels[0].round() as i32,
        wheels[1].round() as i32,
        wheels[2].round() as i32,
        wheels[3].round() as i32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn mix_outputs_within_ceiling_after_normalize() {
        for df in [-127.0, -60.0, 0.0, 60.0, 127.0] {
            for ds in [-127.0, 0.0, 90.0] {
                for dr in [-127.0, -15.0, 0.0, 127.0] {
                    let wheels = normalize(mix(df, ds, dr), 127.0);
                    for w in wheels {
                        assert!(w.abs() <= 127.0 + 1e-9, "|{}| > ceiling", w);
                    }
                }
            }
        }
    }

    #[test]
    fn normalize_is_identity_within_ceiling() {
        let raw = mix(40.0, -30.0, 20.0);
        assert_eq!(normalize(raw, 127.0), raw);
    }

    #[test]
    fn normalize_preserves_ratios_when_scaling() {
        let raw = mix(100.0, 80.0, 50.0);
        let scaled = normalize(raw, 127.0);
        // Cross-multiplied ratios match pairwise
        for i in 0..4 {
            for j in 0..4 {
                let lhs = raw[i] * scaled[j];
                let rhs = raw[j] * scaled[i];
                assert!((lhs - rhs).abs() < 1e-6, "ratio broken at ({}, {})", i, j);
            }
        }
    }

    #[test]
    fn field_rotation_quarter_turn() {
        let (rf, rs) = field_to_robot(100.0, 0.0, FRAC_PI_2);
        assert!(rf.abs() < 1e-9);
        assert!((rs - 100.0).abs() < 1e-9);
    }

    #[test]
    fn field_rotation_half_turn_inverts() {
        let (rf, rs) = field_to_robot(80.0, -30.0, PI);
        assert!((rf + 80.0).abs() < 1e-9);
        assert!((rs - 30.0).abs() < 1e-9);
    }

    #[test]
    fn full_forward_hits_ceiling_on_all_wheels() {
        let cmd = wheel_commands_with_params(127, 0, 0, None, 5, true, 127.0);
        assert_eq!(cmd.as_array(), [127, 127, 127, 127]);
    }

    #[test]
    fn zero_intent_is_zero_output() {
        for heading in [None, Some(0.0), Some(1.2)] {
            let cmd = wheel_commands_with_params(0, 0, 0, heading, 5, true, 127.0);
            assert_eq!(cmd, WheelCommand::zero());
        }
    }

    #[test]
    fn deadband_suppresses_drift() {
        let cmd = wheel_commands_with_params(3, -4, 2, None, 5, true, 127.0);
        assert_eq!(cmd, WheelCommand::zero());
    }

    #[test]
    fn combined_intent_saturates_preserving_signs() {
        // Forward + strafe + rotate overflows the ceiling on FL
        let cmd = wheel_commands_with_params(127, 127, 127, None, 5, false, 127.0);
        let [fl, fr, bl, br] = cmd.as_array();
        assert_eq!(fl, 127);
        assert!(fr >= -127 && fr <= 127);
        assert!(bl >= -127 && bl <= 127);
        assert!(br >= -127 && br <= 127);
        // Raw mix is (381, -127, 127, 127): scaled copies keep sign
        assert!(fr < 0 && bl > 0 && br > 0);
    }

    #[test]
    fn rotate_only_spins_in_place() {
        let cmd = wheel_commands_with_params(0, 0, 100, None, 5, false, 127.0);
        let [fl, fr, bl, br] = cmd.as_array();
        assert_eq!(fl, 100);
        assert_eq!(fr, -100);
        assert_eq!(bl, 100);
        assert_eq!(br, -100);
    }
}
