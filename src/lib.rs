// Control runtime for a four-wheel X-configuration holonomic base:
// drive kinematics, open-loop motion primitives, dead-reckoning
// odometry, and the zenoh-facing control loop that ties them to the
// chassis hardware.

pub mod chassis;
pub mod config;
pub mod drive;
pub mod messages;
pub mod odometry;
pub mod runtime;
