// 50 Hz control loop with watchdog.
//
// One task owns the whole tick: drain pending drive commands, apply the
// staleness watchdog, run the drive pipeline, commit the wheel commands
// as a single bus update, step odometry, publish state. Nothing else
// writes wheel commands or touches the estimator.

use std::time::{Duration, Instant};

use tokio::time::interval;
use tracing::{info, warn};

use crate::chassis::{ChassisDriver, ChassisIo, SimChassis};
use crate::config::{
    BUS_PORT, CMD_TIMEOUT, LOOP_HZ, MOTOR_ENABLED, ODOM_L_PAR, ODOM_L_PERP, TELEMETRY_DIVISOR,
    TOPIC_CMD_DRIVE, TOPIC_HEALTH, TOPIC_RT_TELEMETRY, TOPIC_RT_WHEELS, TOPIC_STATE_POSE,
};
use crate::drive::wheel_commands;
use crate::messages::{DriveCommand, PoseEstimate, RuntimeHealth, WheelActuation, WheelTelemetry};
use crate::odometry::{Odometry, OdometryConfig, Pose};

const FULL_SCALE_MILLIVOLTS: f64 = 12000.0;

pub struct Runtime {
    latest_cmd: Option<DriveCommand>,
    cmd_received_at: Instant,
    health: RuntimeHealth,
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            latest_cmd: None,
            cmd_received_at: Instant::now(),
            health: RuntimeHealth::CmdStale, // Start stale until first cmd
        }
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    /// Process incoming command
    pub fn on_command(&mut self, cmd: DriveCommand) {
        self.latest_cmd = Some(cmd);
        self.cmd_received_at = Instant::now();
    }

    /// Command to act on this tick, after the watchdog
    pub fn effective_command(&mut self) -> DriveCommand {
        let cmd_age = self.cmd_received_at.elapsed();

        if cmd_age > CMD_TIMEOUT {
            // Watchdog triggered - stop the robot
            if self.health != RuntimeHealth::CmdStale {
                warn!("Command stale ({:?} old), stopping drive", cmd_age);
            }
            self.health = RuntimeHealth::CmdStale;
            DriveCommand::default() // Zero intent
        } else if let Some(cmd) = self.latest_cmd {
            self.health = RuntimeHealth::Ok;
            cmd
        } else {
            // No command ever received
            self.health = RuntimeHealth::CmdStale;
            DriveCommand::default()
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let subscriber = session.declare_subscriber(TOPIC_CMD_DRIVE).await?;
    let pub_wheels = session.declare_publisher(TOPIC_RT_WHEELS).await?;
    let pub_pose = session.declare_publisher(TOPIC_STATE_POSE).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;
    let pub_telemetry = session.declare_publisher(TOPIC_RT_TELEMETRY).await?;

    let publishers = Publishers {
        wheels: pub_wheels,
        pose: pub_pose,
        health: pub_health,
        telemetry: pub_telemetry,
    };

    if MOTOR_ENABLED {
        let mut chassis = ChassisDriver::new(BUS_PORT)?;
        chassis.initialize()?;
        control_loop(chassis, subscriber, publishers).await
    } else {
        info!("Hardware disabled, running simulated chassis");
        control_loop(SimChassis::new(), subscriber, publishers).await
    }
}

struct Publishers<'a> {
    wheels: zenoh::pubsub::Publisher<'a>,
    pose: zenoh::pubsub::Publisher<'a>,
    health: zenoh::pubsub::Publisher<'a>,
    telemetry: zenoh::pubsub::Publisher<'a>,
}

async fn control_loop<C: ChassisIo>(
    mut chassis: C,
    subscriber: zenoh::pubsub::Subscriber<zenoh::handlers::FifoChannelHandler<zenoh::sample::Sample>>,
    publishers: Publishers<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut runtime = Runtime::new();
    let mut odometry = Odometry::new(OdometryConfig {
        l_par: ODOM_L_PAR,
        l_perp: ODOM_L_PERP,
        start: Pose::default(),
    });
    let mut last_trackers = (0.0, 0.0);
    let mut odometry_paused_logged = false;
    let mut tick_count: u64 = 0;

    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));

    info!(
        "Runtime started: {}Hz loop, {}ms watchdog timeout",
        LOOP_HZ,
        CMD_TIMEOUT.as_millis()
    );
    info!("Subscribed to: {}", TOPIC_CMD_DRIVE);
    info!(
        "Publishing to: {}, {}, {}, {}",
        TOPIC_RT_WHEELS, TOPIC_STATE_POSE, TOPIC_HEALTH, TOPIC_RT_TELEMETRY
    );

    loop {
        tick.tick().await;

        // 1. Drain all pending commands (non-blocking), keep latest
        while let Ok(Some(sample)) = subscriber.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<DriveCommand>(&payload) {
                Ok(cmd) => runtime.on_command(cmd),
                Err(e) => warn!("Failed to parse command: {}", e),
            }
        }

        // 2. Watchdog, then the drive pipeline
        let cmd = runtime.effective_command();

        // A heading that is absent or still calibrating only disables
        // heading-dependent behavior; the drive pipeline runs regardless.
        let heading_rad = match chassis.heading_ready() {
            Ok(true) => match chassis.heading_degrees() {
                Ok(deg) => Some(deg.to_radians()),
                Err(e) => {
                    warn!("Heading read failed: {}", e);
                    None
                }
            },
            Ok(false) => None,
            Err(e) => {
                warn!("Heading readiness check failed: {}", e);
                None
            }
        };

        let field_heading = if cmd.field_centric { heading_rad } else { None };
        let wheels = wheel_commands(cmd.forward, cmd.strafe, cmd.rotate, field_heading);

        // 3. Commit all four wheel commands as one logical update
        if let Err(e) = chassis.set_commands(&wheels) {
            warn!("Wheel command write failed: {}", e);
        }

        // 4. Odometry: deltas of the cumulative tracker readings, fused
        // with the absolute heading. Paused while the heading is not
        // ready; the trackers keep accumulating so nothing is lost once
        // it comes back.
        match chassis.tracker_displacements() {
            Ok((par, perp)) => {
                if let Some(heading) = heading_rad {
                    odometry.update(par - last_trackers.0, perp - last_trackers.1, heading);
                    odometry_paused_logged = false;
                } else if !odometry_paused_logged {
                    warn!("Heading not ready, odometry paused");
                    odometry_paused_logged = true;
                }
                last_trackers = (par, perp);
            }
            Err(e) => warn!("Tracker read failed: {}", e),
        }

        // 5. Publish actuation, pose, health
        let actuation_json = serde_json::to_string(&WheelActuation::from(&wheels))?;
        publishers.wheels.put(actuation_json).await?;

        let pose_json = serde_json::to_string(&PoseEstimate::from(odometry.pose()))?;
        publishers.pose.put(pose_json).await?;

        let health_json = serde_json::to_string(&runtime.health())?;
        publishers.health.put(health_json).await?;

        // 6. Wheel telemetry at reduced rate
        if tick_count % TELEMETRY_DIVISOR == 0 {
            match (chassis.power_millivolts(), chassis.velocities_rpm()) {
                (Ok(mv), Ok(rpm)) => {
                    let telemetry = WheelTelemetry {
                        power_pct: mv.map(power_percent),
                        velocity_rpm: rpm,
                    };
                    publishers
                        .telemetry
                        .put(serde_json::to_string(&telemetry)?)
                        .await?;
                }
                (Err(e), _) | (_, Err(e)) => warn!("Telemetry read failed: {}", e),
            }
        }
        tick_count += 1;
    }
}

/// Commanded output as a percentage of full scale, clamped to +/-100
fn power_percent(millivolts: i16) -> f64 {
    (millivolts as f64 / FULL_SCALE_MILLIVOLTS * 100.0).clamp(-100.0, 100.0)
}
