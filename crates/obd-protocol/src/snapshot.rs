//! Vehicle State Snapshot

use crate::pid::{Decoded, Pid};
use serde::{Deserialize, Serialize};

/// The latest decoded value of every polled parameter.
///
/// Fields start at zero and keep their last decoded value; a failed or
/// missing poll never resets a field. Consumers always receive clones —
/// the one live instance belongs to the telemetry hub.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    /// Engine RPM
    pub rpm: f64,
    /// Vehicle speed (km/h)
    pub speed_kmh: f64,
    /// Coolant temperature (°C)
    pub coolant_temp_c: f64,
    /// Oil temperature (°C)
    pub oil_temp_c: f64,
    /// Intake air temperature (°C)
    pub intake_temp_c: f64,
    /// Ambient air temperature (°C)
    pub ambient_temp_c: f64,
    /// Calculated engine load (%)
    pub engine_load_pct: f64,
    /// Throttle position (%)
    pub throttle_pct: f64,
    /// Fuel tank level (%)
    pub fuel_level_pct: f64,
    /// Fuel consumption rate (L/h)
    pub fuel_rate_lph: f64,
    /// Fuel pressure (kPa)
    pub fuel_pressure_kpa: f64,
    /// Intake manifold absolute pressure (kPa), the boost gauge source
    pub boost_kpa: f64,
    /// Mass air flow (g/s)
    pub maf_gps: f64,
    /// Barometric pressure (kPa)
    pub barometric_kpa: f64,
    /// Actual engine torque (% of reference)
    pub torque_pct: f64,
    /// Engine reference torque (Nm)
    pub reference_torque_nm: f64,
    /// Accelerator pedal position (%)
    pub accelerator_pct: f64,
    /// Commanded EGR (%)
    pub commanded_egr_pct: f64,
    /// EGR error (%)
    pub egr_error_pct: f64,
    /// Control module voltage (V)
    pub battery_voltage: f64,
    /// Run time since engine start (s)
    pub run_time_s: f64,
    /// True while a session is polling
    pub connected: bool,
    /// Display name of the connected adapter
    pub device_name: String,
}

impl VehicleSnapshot {
    /// Write one decoded value into its field.
    pub fn apply(&mut self, decoded: &Decoded) {
        let value = decoded.value;
        match decoded.pid {
            Pid::EngineLoad => self.engine_load_pct = value,
            Pid::CoolantTemp => self.coolant_temp_c = value,
            Pid::FuelPressure => self.fuel_pressure_kpa = value,
            Pid::IntakePressure => self.boost_kpa = value,
            Pid::Rpm => self.rpm = value,
            Pid::Speed => self.speed_kmh = value,
            Pid::IntakeTemp => self.intake_temp_c = value,
            Pid::Maf => self.maf_gps = value,
            Pid::ThrottlePosition => self.throttle_pct = value,
            Pid::RunTime => self.run_time_s = value,
            Pid::CommandedEgr => self.commanded_egr_pct = value,
            Pid::EgrError => self.egr_error_pct = value,
            Pid::FuelLevel => self.fuel_level_pct = value,
            Pid::BarometricPressure => self.barometric_kpa = value,
            Pid::ControlModuleVoltage => self.battery_voltage = value,
            Pid::AmbientTemp => self.ambient_temp_c = value,
            Pid::AcceleratorPosition => self.accelerator_pct = value,
            Pid::OilTemp => self.oil_temp_c = value,
            Pid::FuelRate => self.fuel_rate_lph = value,
            Pid::ActualTorque => self.torque_pct = value,
            Pid::ReferenceTorque => self.reference_torque_nm = value,
        }
    }
}
