// Loop rate, topics, bus addressing, drive tuning, chassis geometry
use std::time::Duration;

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Command timeout for watchdog
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Zenoh topics
pub const TOPIC_CMD_DRIVE: &str = "xdrive/cmd/drive"; // commands
pub const TOPIC_RT_WHEELS: &str = "xdrive/rt/wheels"; // actuation
pub const TOPIC_RT_TELEMETRY: &str = "xdrive/rt/telemetry"; // wheel power/velocity
pub const TOPIC_STATE_POSE: &str = "xdrive/state/pose"; // odometry estimate
pub const TOPIC_HEALTH: &str = "xdrive/state/health"; // health status

// Telemetry publishes every Nth control tick (10 Hz at LOOP_HZ = 50)
pub const TELEMETRY_DIVISOR: u64 = 5;

// Serial port for the chassis device bus
pub const BUS_PORT: &str = "/dev/ttyACM0";

// Enable hardware actuation (set to false to run the simulated chassis)
pub const MOTOR_ENABLED: bool = true;

// Input shaping
pub const DEADBAND: i32 = 5;
pub const SQUARE_INPUTS: bool = true;
pub const MAX_COMMAND: f64 = 127.0;

// Wheel device ids on the bus, ordered (FL, FR, BL, BR)
pub const WHEEL_IDS: [u8; 4] = [1, 2, 3, 4];

// Right-side wheels are mirrored on the chassis
pub const WHEEL_REVERSED: [bool; 4] = [false, true, false, true];

// Tracking encoder and heading unit ids
pub const TRACKER_PAR_ID: u8 = 11;
pub const TRACKER_PERP_ID: u8 = 12;
pub const HEADING_ID: u8 = 15;

// Tracking wheel geometry
pub const TRACKER_WHEEL_DIAMETER: f64 = 2.75; // inches
pub const TRACKER_TICKS_PER_REV: f64 = 4096.0;

// Tracking wheel offsets from the rotation center (inches):
// parallel wheel sits forward of center, perpendicular wheel to its right
pub const ODOM_L_PAR: f64 = 3.25;
pub const ODOM_L_PERP: f64 = 4.5;

// Motion primitive completion
pub const MOTION_TOLERANCE_DEG: f64 = 5.0;
pub const MOTION_POLL_INTERVAL: Duration = Duration::from_millis(10);
