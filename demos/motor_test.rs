// Wheel test: careful, step-by-step bring-up for the chassis hardware
//
// Drives the wheels directly over the serial bus, then runs the motion
// primitives. Elevate the robot so the wheels spin freely.
//
// Usage: cargo run --example motor_test -- --port /dev/ttyACM0

use std::io::{self, Write};
use std::time::Duration;

use clap::Parser;

use xdrive_runtime::chassis::{ChassisDriver, ChassisIo};
use xdrive_runtime::drive::motion::{drive_straight, strafe_right, turn_cw};
use xdrive_runtime::drive::{wheel_commands, MotionTarget, WheelCommand};

#[derive(Parser)]
#[command(about = "Staged wheel and motion-primitive test for the X-drive chassis")]
struct Args {
    /// Serial port of the chassis device bus
    #[arg(long, default_value = "/dev/ttyACM0")]
    port: String,

    /// Wheel speed for the motion primitives, deg/s
    #[arg(long, default_value_t = 90)]
    speed: u16,
}

fn confirm(prompt: &str) -> bool {
    print!("{} [y/N]: ", prompt);
    io::stdout().flush().unwrap();
    let mut input = String::new();
    io::stdin().read_line(&mut input).unwrap();
    input.trim().eq_ignore_ascii_case("y")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    println!("X-drive wheel test (WILL cause movement)");
    println!("Serial port: {}", args.port);
    println!();

    if !confirm("Are the robot's wheels OFF THE GROUND (robot elevated/on blocks)?") {
        println!("Please elevate the robot so wheels can spin freely.");
        return Ok(());
    }

    println!("Opening chassis bus...");
    let mut chassis = ChassisDriver::new(&args.port)?;
    println!("Connected");
    println!();

    // ========== STEP 1: Bring-up ==========
    println!("Step 1: Initializing chassis (ping, throttle mode, torque on)...");
    chassis.initialize()?;
    println!("  Chassis initialized");
    println!();

    // ========== STEP 2: Zero command ==========
    println!("Step 2: Sending ZERO command to all wheels...");
    chassis.set_commands(&WheelCommand::zero())?;
    println!("  Zero command sent, wheels should be still");
    tokio::time::sleep(Duration::from_millis(500)).await;

    println!("  Reading back velocities...");
    let rpm = chassis.velocities_rpm()?;
    println!("    (FL, FR, BL, BR) rpm: {:?} (should be ~0)", rpm);
    println!();

    // ========== STEP 3: Slow per-axis drive ==========
    println!("Step 3: Slow per-axis drive test");
    println!("  Each intent runs for 0.3 seconds at low power.");
    println!();

    if !confirm("Proceed with drive test?") {
        chassis.stop()?;
        return Ok(());
    }

    let tests = [
        ("Forward", (40, 0, 0)),
        ("Backward", (-40, 0, 0)),
        ("Strafe right", (0, 40, 0)),
        ("Strafe left", (0, -40, 0)),
        ("Rotate CW", (0, 0, 40)),
        ("Rotate CCW", (0, 0, -40)),
    ];

    for (name, (forward, strafe, rotate)) in tests {
        println!("  Testing: {}...", name);

        let cmd = wheel_commands(forward, strafe, rotate, None);
        println!("    Wheel commands (FL, FR, BL, BR): {:?}", cmd.as_array());

        chassis.set_commands(&cmd)?;
        tokio::time::sleep(Duration::from_millis(300)).await;

        chassis.set_commands(&WheelCommand::zero())?;
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    println!();

    // ========== STEP 4: Motion primitives ==========
    println!("Step 4: Motion primitives (one wheel turn each)");
    println!();

    if !confirm("Run straight, strafe, and rotate primitives?") {
        chassis.stop()?;
        return Ok(());
    }

    let target = MotionTarget {
        wheel_degrees: 360.0,
        speed_dps: args.speed,
    };
    let deadline = Some(Duration::from_secs(10));

    println!("  Straight...");
    drive_straight(&mut chassis, target, deadline).await?;
    println!("  Strafe right...");
    strafe_right(&mut chassis, target, deadline).await?;
    println!("  Rotate CW...");
    turn_cw(&mut chassis, target, deadline).await?;
    println!();

    // ========== FINAL: Stop ==========
    println!("Step 5: Stopping wheels...");
    chassis.stop()?;
    println!("  Wheels stopped");
    println!();
    println!("If the wheels moved as expected, the chassis is ready.");
    println!("You can now run the full runtime with: cargo run");

    Ok(())
}
