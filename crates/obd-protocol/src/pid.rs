//! Mode 01 PID Table and Response Decoding
//!
//! Defines the queryable Parameter IDs, their payload sizes, and the
//! per-PID numeric conversion formulas.

use crate::{MODE_CURRENT_DATA, RESPONSE_PREFIX};
use serde::{Deserialize, Serialize};

/// Parameter IDs polled for the gauge set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Pid {
    /// Calculated engine load (0x04)
    EngineLoad = 0x04,
    /// Engine coolant temperature (0x05)
    CoolantTemp = 0x05,
    /// Fuel pressure (0x0A)
    FuelPressure = 0x0A,
    /// Intake manifold absolute pressure, the boost gauge source (0x0B)
    IntakePressure = 0x0B,
    /// Engine RPM (0x0C)
    Rpm = 0x0C,
    /// Vehicle speed (0x0D)
    Speed = 0x0D,
    /// Intake air temperature (0x0F)
    IntakeTemp = 0x0F,
    /// Mass air flow rate (0x10)
    Maf = 0x10,
    /// Throttle position (0x11)
    ThrottlePosition = 0x11,
    /// Run time since engine start (0x1F)
    RunTime = 0x1F,
    /// Commanded EGR (0x2C)
    CommandedEgr = 0x2C,
    /// EGR error (0x2D)
    EgrError = 0x2D,
    /// Fuel tank level (0x2F)
    FuelLevel = 0x2F,
    /// Barometric pressure (0x33)
    BarometricPressure = 0x33,
    /// Control module voltage, shown as battery voltage (0x42)
    ControlModuleVoltage = 0x42,
    /// Ambient air temperature (0x46)
    AmbientTemp = 0x46,
    /// Accelerator pedal position D (0x49)
    AcceleratorPosition = 0x49,
    /// Engine oil temperature (0x5C)
    OilTemp = 0x5C,
    /// Engine fuel rate (0x5E)
    FuelRate = 0x5E,
    /// Actual engine torque (0x62)
    ActualTorque = 0x62,
    /// Engine reference torque (0x63)
    ReferenceTorque = 0x63,
}

impl Pid {
    /// Look up a PID by its wire code; unknown codes are not an error, they
    /// are simply not decoded.
    pub fn from_code(code: u8) -> Option<Pid> {
        match code {
            0x04 => Some(Pid::EngineLoad),
            0x05 => Some(Pid::CoolantTemp),
            0x0A => Some(Pid::FuelPressure),
            0x0B => Some(Pid::IntakePressure),
            0x0C => Some(Pid::Rpm),
            0x0D => Some(Pid::Speed),
            0x0F => Some(Pid::IntakeTemp),
            0x10 => Some(Pid::Maf),
            0x11 => Some(Pid::ThrottlePosition),
            0x1F => Some(Pid::RunTime),
            0x2C => Some(Pid::CommandedEgr),
            0x2D => Some(Pid::EgrError),
            0x2F => Some(Pid::FuelLevel),
            0x33 => Some(Pid::BarometricPressure),
            0x42 => Some(Pid::ControlModuleVoltage),
            0x46 => Some(Pid::AmbientTemp),
            0x49 => Some(Pid::AcceleratorPosition),
            0x5C => Some(Pid::OilTemp),
            0x5E => Some(Pid::FuelRate),
            0x62 => Some(Pid::ActualTorque),
            0x63 => Some(Pid::ReferenceTorque),
            _ => None,
        }
    }

    /// The PID wire code.
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// The 4-hex-character query string: 2-char mode + 2-char PID.
    pub fn request(&self) -> String {
        format!("{}{:02X}", MODE_CURRENT_DATA, self.code())
    }

    /// Expected payload size; shorter responses are discarded as truncated.
    pub fn payload_bytes(&self) -> usize {
        match self {
            Pid::Rpm
            | Pid::Maf
            | Pid::RunTime
            | Pid::ControlModuleVoltage
            | Pid::FuelRate
            | Pid::ReferenceTorque => 2,
            _ => 1,
        }
    }

    /// Apply this PID's conversion formula.
    ///
    /// Returns `None` when the payload is shorter than
    /// [`payload_bytes`](Pid::payload_bytes).
    pub fn decode(&self, payload: &[u8]) -> Option<f64> {
        if payload.len() < self.payload_bytes() {
            return None;
        }
        let a = payload[0];
        let value = match self {
            // A * 100 / 255, rounded (%)
            Pid::EngineLoad
            | Pid::ThrottlePosition
            | Pid::CommandedEgr
            | Pid::FuelLevel
            | Pid::AcceleratorPosition => percent(a),
            // A - 40 (°C)
            Pid::CoolantTemp | Pid::IntakeTemp | Pid::AmbientTemp | Pid::OilTemp => {
                f64::from(a) - 40.0
            }
            // (A - 128) * 100 / 128 (%)
            Pid::EgrError => (f64::from(a) - 128.0) * 100.0 / 128.0,
            // A * 3 (kPa)
            Pid::FuelPressure => f64::from(a) * 3.0,
            // A as-is
            Pid::IntakePressure | Pid::Speed | Pid::BarometricPressure => f64::from(a),
            // A - 125 (%)
            Pid::ActualTorque => f64::from(a) - 125.0,
            // ((A*256)+B) / 4 (rpm)
            Pid::Rpm => f64::from(word(payload)) / 4.0,
            // ((A*256)+B) / 100 (g/s)
            Pid::Maf => f64::from(word(payload)) / 100.0,
            // (A*256)+B (s)
            Pid::RunTime => f64::from(word(payload)),
            // ((A*256)+B) / 20 (L/h)
            Pid::FuelRate => f64::from(word(payload)) / 20.0,
            // ((A*256)+B) / 100, rounded, then / 10 (V)
            Pid::ControlModuleVoltage => (f64::from(word(payload)) / 100.0).round() / 10.0,
            // (A*256)+B (Nm)
            Pid::ReferenceTorque => f64::from(word(payload)),
        };
        Some(value)
    }
}

/// One successfully decoded response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Decoded {
    pub pid: Pid,
    pub value: f64,
}

/// Decode one complete trimmed response frame.
///
/// Anything that is not a well-formed Mode 01 reply — command echoes,
/// `NO DATA`, protocol-negotiation chatter, truncated payloads, unknown
/// PIDs — yields `None` and is never an error: such frames are expected
/// noise on the wire.
pub fn decode_response(frame: &str) -> Option<Decoded> {
    let cleaned: String = frame
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();
    if !cleaned.is_ascii() {
        return None;
    }

    let rest = cleaned.strip_prefix(RESPONSE_PREFIX)?;
    if rest.len() < 2 {
        return None;
    }
    let code = u8::from_str_radix(&rest[..2], 16).ok()?;
    let pid = Pid::from_code(code)?;

    let payload = parse_hex_bytes(&rest[2..]);
    let value = pid.decode(&payload)?;
    Some(Decoded { pid, value })
}

/// `round(A * 100 / 255)`
fn percent(byte: u8) -> f64 {
    (f64::from(byte) * 100.0 / 255.0).round()
}

/// Big-endian 16-bit payload word. Callers have checked the length.
fn word(payload: &[u8]) -> u16 {
    u16::from(payload[0]) << 8 | u16::from(payload[1])
}

/// Parse leading hex pairs; stops at the first non-hex pair or odd tail.
fn parse_hex_bytes(hex: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(hex.len() / 2);
    let mut i = 0;
    while i + 1 < hex.len() {
        match u8::from_str_radix(&hex[i..i + 2], 16) {
            Ok(b) => bytes.push(b),
            Err(_) => break,
        }
        i += 2;
    }
    bytes
}
