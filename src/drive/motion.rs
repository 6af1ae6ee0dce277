// Open-loop motion primitives.
//
// Fixed-distance autonomous moves built from the wheel-sign structure of
// the drive mix: tare the position references, issue one relative move
// per wheel, then watch the reported positions until every wheel has
// covered the target less a small tolerance. The sequencer itself is
// non-blocking (`start`/`poll`); `wait` is the polling convenience
// wrapper with an optional deadline.

use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, Instant};

use crate::chassis::{BusError, ChassisIo};
use crate::config::{MOTION_POLL_INTERVAL, MOTION_TOLERANCE_DEG};

/// Primitive kinds and their relative-displacement sign patterns across
/// (FL, FR, BL, BR), matching the drive mix columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionKind {
    /// All four wheels travel the same displacement
    Straight,
    /// Rightward strafe: (+, -, -, +)
    Strafe,
    /// Clockwise rotation in place: (+, -, +, -)
    RotateCw,
}

impl MotionKind {
    pub fn signs(self) -> [f64; 4] {
        match self {
            MotionKind::Straight => [1.0, 1.0, 1.0, 1.0],
            MotionKind::Strafe => [1.0, -1.0, -1.0, 1.0],
            MotionKind::RotateCw => [1.0, -1.0, 1.0, -1.0],
        }
    }
}

/// A relative move: wheel rotation to cover and the speed to run at
#[derive(Debug, Clone, Copy)]
pub struct MotionTarget {
    pub wheel_degrees: f64,
    pub speed_dps: u16,
}

#[derive(Debug, Error)]
pub enum MotionError {
    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("motion still busy after {0:?}")]
    TimedOut(Duration),
}

/// One in-flight motion primitive.
///
/// Owns no state beyond the completion threshold, so dropping it (or
/// the future returned by [`wait`](Self::wait)) abandons the watch
/// without touching the wheels.
pub struct MotionSequencer<'a, C: ChassisIo> {
    chassis: &'a mut C,
    threshold_deg: f64,
}

impl<'a, C: ChassisIo> MotionSequencer<'a, C> {
    /// Tare the wheel references and issue the relative move
    pub fn start(
        chassis: &'a mut C,
        kind: MotionKind,
        target: MotionTarget,
    ) -> Result<Self, MotionError> {
        chassis.tare_positions()?;
        let offsets = kind.signs().map(|s| s * target.wheel_degrees);
        chassis.move_relative(offsets, target.speed_dps)?;

        // Tolerance absorbs encoder noise near the endpoint
        let threshold_deg = (target.wheel_degrees.abs() - MOTION_TOLERANCE_DEG).max(0.0);
        Ok(Self {
            chassis,
            threshold_deg,
        })
    }

    /// One busy check: done once no wheel is short of the threshold
    pub fn poll(&mut self) -> Result<bool, MotionError> {
        let positions = self.chassis.positions_degrees()?;
        Ok(positions.iter().all(|p| p.abs() >= self.threshold_deg))
    }

    /// Poll at a fixed interval until the move completes. With a
    /// deadline, a still-busy move becomes `MotionError::TimedOut`
    /// instead of waiting forever on a stalled wheel.
    pub async fn wait(mut self, deadline: Option<Duration>) -> Result<(), MotionError> {
        let started = Instant::now();
        loop {
            if self.poll()? {
                return Ok(());
            }
            if let Some(limit) = deadline {
                if started.elapsed() >= limit {
                    return Err(MotionError::TimedOut(limit));
                }
            }
            sleep(MOTION_POLL_INTERVAL).await;
        }
    }
}

/// Drive straight for `target.wheel_degrees` of wheel rotation
pub async fn drive_straight<C: ChassisIo>(
    chassis: &mut C,
    target: MotionTarget,
    deadline: Option<Duration>,
) -> Result<(), MotionError> {
    MotionSequencer::start(chassis, MotionKind::Straight, target)?
        .wait(deadline)
        .await
}

/// Strafe right for `target.wheel_degrees` of wheel rotation
pub async fn strafe_right<C: ChassisIo>(
    chassis: &mut C,
    target: MotionTarget,
    deadline: Option<Duration>,
) -> Result<(), MotionError> {
    MotionSequencer::start(chassis, MotionKind::Strafe, target)?
        .wait(deadline)
        .await
}

/// Rotate clockwise in place for `target.wheel_degrees` of wheel rotation
pub async fn turn_cw<C: ChassisIo>(
    chassis: &mut C,
    target: MotionTarget,
    deadline: Option<Duration>,
) -> Result<(), MotionError> {
    MotionSequencer::start(chassis, MotionKind::RotateCw, target)?
        .wait(deadline)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chassis::SimChassis;

    fn target(wheel_degrees: f64) -> MotionTarget {
        MotionTarget {
            wheel_degrees,
            speed_dps: 100,
        }
    }

    #[test]
    fn rotate_issues_alternating_targets() {
        let mut sim = SimChassis::new();
        MotionSequencer::start(&mut sim, MotionKind::RotateCw, target(90.0)).unwrap();
        assert_eq!(sim.targets_deg(), [90.0, -90.0, 90.0, -90.0]);
    }

    #[test]
    fn strafe_issues_mirrored_targets() {
        let mut sim = SimChassis::new();
        MotionSequencer::start(&mut sim, MotionKind::Strafe, target(180.0)).unwrap();
        assert_eq!(sim.targets_deg(), [180.0, -180.0, -180.0, 180.0]);
    }

    #[test]
    fn poll_reports_busy_until_within_tolerance() {
        let mut sim = SimChassis::new();
        sim.step_deg = 40.0;
        let mut seq = MotionSequencer::start(&mut sim, MotionKind::Straight, target(90.0)).unwrap();
        // 40, then 80 degrees: still short of 85
        assert!(!seq.poll().unwrap());
        assert!(!seq.poll().unwrap());
        // 90 degrees: past 85
        assert!(seq.poll().unwrap());
    }

    #[test]
    fn zero_length_move_is_immediately_done() {
        let mut sim = SimChassis::new();
        let mut seq = MotionSequencer::start(&mut sim, MotionKind::Straight, target(0.0)).unwrap();
        assert!(seq.poll().unwrap());
    }

    #[tokio::test]
    async fn wait_returns_once_all_wheels_arrive() {
        let mut sim = SimChassis::new();
        turn_cw(&mut sim, target(90.0), None).await.unwrap();
        let positions = sim.positions_degrees().unwrap();
        for p in positions {
            assert!(p.abs() >= 90.0 - MOTION_TOLERANCE_DEG);
        }
    }

    #[tokio::test]
    async fn stalled_move_times_out() {
        let mut sim = SimChassis::new();
        sim.step_deg = 0.0;
        let err = drive_straight(&mut sim, target(360.0), Some(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert!(matches!(err, MotionError::TimedOut(_)));
    }
}
