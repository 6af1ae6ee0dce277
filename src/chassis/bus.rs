// Chassis device bus: serial protocol for the drivetrain controller.
//
// Wheel motors, tracking encoders, and the heading unit all sit on one
// half-duplex serial bus and share a register-oriented protocol:
// Packet format: [0xFF, 0xFF, ID, Length, Instruction, Params..., Checksum]

use serialport::{self, SerialPort};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::debug;

/// Default serial configuration for the chassis controller
pub const DEFAULT_BAUDRATE: u32 = 1_000_000;
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

/// Broadcast id addressed by sync writes
const BROADCAST_ID: u8 = 0xFE;

/// Packet header bytes
const HEADER: [u8; 2] = [0xFF, 0xFF];

/// Instruction set
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Instruction {
    Ping = 0x01,
    ReadReg = 0x02,
    WriteReg = 0x03,
    SyncWrite = 0x83,
}

/// Register map of the chassis firmware
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Register {
    // Identity
    ModelNumber = 3, // 2 bytes, read-only

    // Wheel motors
    ControlMode = 20,     // 1 byte: 0=throttle, 1=position
    TorqueEnable = 24,    // 1 byte: 0=off, 1=on
    Throttle = 26,        // 2 bytes (sign-magnitude), open-loop command
    MoveSpeed = 28,       // 2 bytes, deg/s used by relative moves
    GoalOffset = 30,      // 4 bytes (two's complement centidegrees); writing starts a relative move
    TarePosition = 34,    // 1 byte: write 1 to zero the position reference
    PresentPosition = 36, // 4 bytes (two's complement centidegrees), read-only
    PresentVelocity = 40, // 2 bytes (sign-magnitude rpm), read-only
    PresentVoltage = 42,  // 2 bytes (sign-magnitude millivolts), read-only

    // Tracking encoders
    EncoderCount = 48, // 4 bytes (two's complement ticks), cumulative, read-only
    EncoderReset = 52, // 1 byte: write 1 to zero the count

    // Heading unit
    CalibStatus = 56, // 1 byte: 0=ready, nonzero=calibrating, read-only
    Heading = 58,     // 2 bytes, centidegrees in [0, 36000), read-only
}

/// Wheel motor control modes
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlMode {
    Throttle = 0,
    Position = 1,
}

/// Error types for bus communication
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid response from device {id}: {reason}")]
    InvalidResponse { id: u8, reason: String },

    #[error("Checksum mismatch for device {id}")]
    ChecksumMismatch { id: u8 },

    #[error("Device {id} returned error status: 0x{status:02X}")]
    DeviceError { id: u8, status: u8 },

    #[error("Timeout waiting for response from device {id}")]
    Timeout { id: u8 },
}

pub type Result<T> = std::result::Result<T, BusError>;

/// Register-level access to the chassis devices over one serial port
pub struct DeviceBus {
    port: Box<dyn SerialPort>,
}

impl DeviceBus {
    /// Open a new connection to the bus
    pub fn open(port_name: &str) -> Result<Self> {
        Self::open_with_baudrate(port_name, DEFAULT_BAUDRATE)
    }

    /// Open with custom baudrate
    pub fn open_with_baudrate(port_name: &str, baudrate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;

        Ok(Self { port })
    }

    /// Calculate checksum for a packet (excluding header)
    fn checksum(data: &[u8]) -> u8 {
        let sum: u16 = data.iter().map(|&b| b as u16).sum();
        (!sum & 0xFF) as u8
    }

    /// Build a packet with header and checksum
    fn build_packet(id: u8, instruction: Instruction, params: &[u8]) -> Vec<u8> {
        let length = (params.len() + 2) as u8; // instruction + params + checksum
        let mut packet = Vec::with_capacity(6 + params.len());

        packet.extend_from_slice(&HEADER);
        packet.push(id);
        packet.push(length);
        packet.push(instruction as u8);
        packet.extend_from_slice(params);

        // Checksum over id, length, instruction, params
        let body = &packet[2..];
        packet.push(Self::checksum(body));

        packet
    }

    fn send_packet(&mut self, packet: &[u8]) -> Result<()> {
        self.port.write_all(packet)?;
        self.port.flush()?;
        Ok(())
    }

    /// Read a status packet, returning its parameter bytes
    fn read_response(&mut self, expected_id: u8) -> Result<Vec<u8>> {
        // Header, id, length in one read
        let mut prefix = [0u8; 4];
        self.port.read_exact(&mut prefix).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                BusError::Timeout { id: expected_id }
            } else {
                BusError::Io(e)
            }
        })?;

        if prefix[..2] != HEADER {
            return Err(BusError::InvalidResponse {
                id: expected_id,
                reason: format!("Invalid header: {:02X?}", &prefix[..2]),
            });
        }

        let id = prefix[2];
        let length = prefix[3] as usize;
        if id != expected_id {
            return Err(BusError::InvalidResponse {
                id: expected_id,
                reason: format!("ID mismatch: expected {}, got {}", expected_id, id),
            });
        }

        // status + params + checksum = length bytes
        let mut rest = vec![0u8; length];
        self.port.read_exact(&mut rest)?;

        let mut body = vec![id, length as u8];
        body.extend_from_slice(&rest[..rest.len() - 1]);
        let expected_checksum = Self::checksum(&body);
        let received_checksum = rest[rest.len() - 1];
        if expected_checksum != received_checksum {
            return Err(BusError::ChecksumMismatch { id });
        }

        let status = rest[0];
        if status != 0 {
            return Err(BusError::DeviceError { id, status });
        }

        Ok(rest[1..rest.len() - 1].to_vec())
    }

    /// Ping a device to check if it's connected
    pub fn ping(&mut self, id: u8) -> Result<bool> {
        let packet = Self::build_packet(id, Instruction::Ping, &[]);
        self.send_packet(&packet)?;

        match self.read_response(id) {
            Ok(_) => Ok(true),
            Err(BusError::Timeout { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Write a single byte to a register
    pub fn write_u8(&mut self, id: u8, register: Register, value: u8) -> Result<()> {
        debug!("Write u8 to device {}: reg={:?}, value={}", id, register, value);
        self.write_registers(id, register, &[value])
    }

    /// Write two bytes (little-endian) to a register
    pub fn write_u16(&mut self, id: u8, register: Register, value: u16) -> Result<()> {
        debug!("Write u16 to device {}: reg={:?}, value={}", id, register, value);
        self.write_registers(id, register, &value.to_le_bytes())
    }

    /// Write a signed 16-bit value (throttle convention)
    ///
    /// The firmware uses sign-magnitude encoding for 2-byte signed
    /// registers: bit 15 is direction, bits 0-14 the magnitude.
    pub fn write_i16(&mut self, id: u8, register: Register, value: i16) -> Result<()> {
        self.write_u16(id, register, encode_sign_magnitude(value))
    }

    /// Write four bytes (little-endian two's complement) to a register
    pub fn write_i32(&mut self, id: u8, register: Register, value: i32) -> Result<()> {
        debug!("Write i32 to device {}: reg={:?}, value={}", id, register, value);
        self.write_registers(id, register, &value.to_le_bytes())
    }

    fn write_registers(&mut self, id: u8, register: Register, data: &[u8]) -> Result<()> {
        let mut params = vec![register as u8];
        params.extend_from_slice(data);
        let packet = Self::build_packet(id, Instruction::WriteReg, &params);
        self.send_packet(&packet)?;

        // Consume the status response
        let _ = self.read_response(id)?;
        Ok(())
    }

    fn read_registers(&mut self, id: u8, register: Register, count: u8) -> Result<Vec<u8>> {
        let params = [register as u8, count];
        let packet = Self::build_packet(id, Instruction::ReadReg, &params);
        self.send_packet(&packet)?;

        let response = self.read_response(id)?;
        if response.len() < count as usize {
            return Err(BusError::InvalidResponse {
                id,
                reason: format!("Expected {} bytes, got {}", count, response.len()),
            });
        }
        Ok(response)
    }

    /// Read a single byte from a register
    pub fn read_u8(&mut self, id: u8, register: Register) -> Result<u8> {
        Ok(self.read_registers(id, register, 1)?[0])
    }

    /// Read two bytes (little-endian) from a register
    pub fn read_u16(&mut self, id: u8, register: Register) -> Result<u16> {
        let r = self.read_registers(id, register, 2)?;
        Ok(u16::from_le_bytes([r[0], r[1]]))
    }

    /// Read a sign-magnitude 16-bit register
    pub fn read_i16(&mut self, id: u8, register: Register) -> Result<i16> {
        Ok(decode_sign_magnitude(self.read_u16(id, register)?))
    }

    /// Read four bytes (little-endian two's complement) from a register
    pub fn read_i32(&mut self, id: u8, register: Register) -> Result<i32> {
        let r = self.read_registers(id, register, 4)?;
        Ok(i32::from_le_bytes([r[0], r[1], r[2], r[3]]))
    }

    /// Sync write: write the same register on multiple devices in one
    /// broadcast frame, making the update atomic at the protocol level.
    /// data: [(id, value), ...]
    pub fn sync_write_u16(&mut self, register: Register, data: &[(u8, u16)]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        // [start_addr, data_length, id1, lo1, hi1, id2, lo2, hi2, ...]
        let data_length: u8 = 2;
        let mut params = vec![register as u8, data_length];
        for &(id, value) in data {
            params.push(id);
            params.extend_from_slice(&value.to_le_bytes());
        }

        let packet = Self::build_packet(BROADCAST_ID, Instruction::SyncWrite, &params);
        debug!("Sync write to {} devices: reg={:?}", data.len(), register);
        self.send_packet(&packet)?;

        // Sync write has no response
        Ok(())
    }

    /// Sync write signed 16-bit values (throttles)
    pub fn sync_write_i16(&mut self, register: Register, data: &[(u8, i16)]) -> Result<()> {
        let encoded: Vec<(u8, u16)> = data
            .iter()
            .map(|&(id, val)| (id, encode_sign_magnitude(val)))
            .collect();
        self.sync_write_u16(register, &encoded)
    }

    // === High-level device operations ===

    /// Enable torque on a wheel motor
    pub fn enable_torque(&mut self, id: u8) -> Result<()> {
        self.write_u8(id, Register::TorqueEnable, 1)
    }

    /// Disable torque on a wheel motor (allows free movement)
    pub fn disable_torque(&mut self, id: u8) -> Result<()> {
        self.write_u8(id, Register::TorqueEnable, 0)
    }

    /// Set wheel control mode (must disable torque first)
    pub fn set_control_mode(&mut self, id: u8, mode: ControlMode) -> Result<()> {
        self.write_u8(id, Register::ControlMode, mode as u8)
    }

    /// Open-loop throttle command in [-127, 127]
    pub fn set_throttle(&mut self, id: u8, value: i16) -> Result<()> {
        self.write_i16(id, Register::Throttle, value)
    }

    /// Start a relative move of `offset_deg` wheel degrees at `speed_dps`
    pub fn move_relative(&mut self, id: u8, offset_deg: f64, speed_dps: u16) -> Result<()> {
        self.write_u16(id, Register::MoveSpeed, speed_dps)?;
        self.write_i32(id, Register::GoalOffset, (offset_deg * 100.0).round() as i32)
    }

    /// Zero a wheel's position reference
    pub fn tare_position(&mut self, id: u8) -> Result<()> {
        self.write_u8(id, Register::TarePosition, 1)
    }

    /// Wheel position in degrees since the last tare
    pub fn position_degrees(&mut self, id: u8) -> Result<f64> {
        Ok(self.read_i32(id, Register::PresentPosition)? as f64 / 100.0)
    }

    /// Measured wheel velocity in rpm
    pub fn velocity_rpm(&mut self, id: u8) -> Result<i16> {
        self.read_i16(id, Register::PresentVelocity)
    }

    /// Commanded output voltage in millivolts (sign indicates direction)
    pub fn voltage_millivolts(&mut self, id: u8) -> Result<i16> {
        self.read_i16(id, Register::PresentVoltage)
    }

    /// Cumulative tracking encoder count in ticks
    pub fn encoder_count(&mut self, id: u8) -> Result<i32> {
        self.read_i32(id, Register::EncoderCount)
    }

    /// Zero a tracking encoder
    pub fn reset_encoder(&mut self, id: u8) -> Result<()> {
        self.write_u8(id, Register::EncoderReset, 1)
    }

    /// Whether the heading unit has finished calibrating
    pub fn heading_ready(&mut self, id: u8) -> Result<bool> {
        Ok(self.read_u8(id, Register::CalibStatus)? == 0)
    }

    /// Absolute heading in degrees, [0, 360)
    pub fn heading_degrees(&mut self, id: u8) -> Result<f64> {
        Ok(self.read_u16(id, Register::Heading)? as f64 / 100.0)
    }
}

/// Encode a signed value to sign-magnitude format
/// Bit 15 = sign (1 = negative), Bits 0-14 = magnitude
fn encode_sign_magnitude(value: i16) -> u16 {
    if value >= 0 {
        value as u16
    } else {
        0x8000 | (-(value as i32) as u16)
    }
}

/// Decode sign-magnitude format to signed value
fn decode_sign_magnitude(raw: u16) -> i16 {
    let magnitude = (raw & 0x7FFF) as i16;
    if raw & 0x8000 != 0 { -magnitude } else { magnitude }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum() {
        // ID=1, Length=4, Instruction=WRITE, Addr=26, Data=0, 2
        let data = [1u8, 4, 0x03, 26, 0, 2];
        let checksum = DeviceBus::checksum(&data);
        // ~(1+4+3+26+0+2) = ~36 = 219
        assert_eq!(checksum, 219);
    }

    #[test]
    fn test_sign_magnitude_encoding() {
        assert_eq!(encode_sign_magnitude(0), 0);
        assert_eq!(encode_sign_magnitude(127), 127);
        assert_eq!(encode_sign_magnitude(-127), 0x807F);
        assert_eq!(encode_sign_magnitude(-1), 0x8001);

        assert_eq!(decode_sign_magnitude(0), 0);
        assert_eq!(decode_sign_magnitude(127), 127);
        assert_eq!(decode_sign_magnitude(0x807F), -127);
        assert_eq!(decode_sign_magnitude(0x8001), -1);
    }

    #[test]
    fn test_build_ping_packet() {
        let packet = DeviceBus::build_packet(1, Instruction::Ping, &[]);
        // Header (2) + ID (1) + Length (1) + Instruction (1) + Checksum (1)
        assert_eq!(packet.len(), 6);
        assert_eq!(packet[0], 0xFF);
        assert_eq!(packet[1], 0xFF);
        assert_eq!(packet[2], 1); // ID
        assert_eq!(packet[3], 2); // instruction + checksum
        assert_eq!(packet[4], 0x01); // PING
    }

    #[test]
    fn test_build_write_packet_layout() {
        let packet =
            DeviceBus::build_packet(3, Instruction::WriteReg, &[Register::Throttle as u8, 100, 0]);
        assert_eq!(packet[2], 3); // ID
        assert_eq!(packet[3], 5); // instruction + 3 params + checksum
        assert_eq!(packet[4], 0x03); // WRITE
        assert_eq!(packet[5], 26); // register address
        // checksum covers everything after the header
        let body = &packet[2..packet.len() - 1];
        assert_eq!(*packet.last().unwrap(), DeviceBus::checksum(body));
    }

    #[test]
    fn test_sync_write_frame_is_broadcast() {
        // Layout check via build_packet, mirroring sync_write_u16
        let params = [Register::Throttle as u8, 2, 1, 10, 0, 2, 20, 0];
        let packet = DeviceBus::build_packet(0xFE, Instruction::SyncWrite, &params);
        assert_eq!(packet[2], 0xFE);
        assert_eq!(packet[4], 0x83);
        assert_eq!(packet[5], 26);
    }
}
