//! In-memory model of the charger.

use crate::config::Config;

/// Consecutive bad health readings required before a fault is reported.
pub const HEALTH_DEBOUNCE_COUNT: u8 = 3;
/// Top-off threshold programmed at attach and on re-initialization, in milliamps.
pub const DEFAULT_TOPOFF_MA: u32 = 100;

/// Silicon revision, read from the low nibble of the revision register at attach.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct DeviceVariant(pub u8);

impl DeviceVariant {
    /// Early revisions drop VSYS when the charger switch turns on unless QBAT carries full current
    /// first, and need the async recovery time stretched around the mode change.
    pub const fn has_vsys_drop_erratum(self) -> bool {
        self.0 <= 2
    }

    /// The buck can run with the charger off.
    pub const fn supports_buck_only(self) -> bool {
        self.0 >= 4
    }

    /// Revision 3 needs the SMPL workaround bit.
    pub const fn needs_smpl_workaround(self) -> bool {
        self.0 == 3
    }

    /// The fuel-gauge clock must be raised across suspend.
    pub const fn has_fg_clock_quirk(self) -> bool {
        self.0 < 2
    }
}

/// Charger operating mode.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum ChargerMode {
    /// Buck and charger off.
    #[default]
    Off,
    /// Buck on, charger switch on.
    Charging,
    /// Buck on, charger switch off.
    BuckOnly,
    /// Boost sourcing VBUS.
    OtgBoost,
}

/// Attached power source.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum CableType {
    /// Nothing attached.
    #[default]
    None,
    /// Something is attached but it could not be identified.
    Unknown,
    /// USB host port.
    Usb,
    /// USB charging downstream port.
    UsbCdp,
    /// Travel adapter.
    Ta,
    /// Fast-charging adapter.
    FastCharge,
    /// Wireless pad.
    Wireless,
    /// We are the source.
    Otg,
}

impl CableType {
    /// A cable that can feed the charger.
    pub const fn is_source(self) -> bool {
        !matches!(self, CableType::None | CableType::Unknown | CableType::Otg)
    }
}

/// Charger health.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Health {
    /// Input inside its window.
    #[default]
    Good,
    /// Input above its window.
    OverVoltage,
    /// Input below its window.
    UnderVoltage,
}

/// Charging status.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum ChargingStatus {
    /// Charger off.
    Discharging,
    /// Charging.
    Charging,
    /// Charge complete.
    Full,
    /// Input present but not usable.
    NotCharging,
    /// Status code not recognised.
    Unknown,
}

/// Charge phase.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum ChargeType {
    /// Fast charge.
    Fast,
    /// Pre-charge or trickle.
    Trickle,
}

/// Requested charging mode.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum ChargeMode {
    /// Charger switch on.
    Charging,
    /// Charger switch off, buck stays on.
    ChargingOff,
    /// Charger switch and buck off.
    BuckOff,
}

/// Everything the driver remembers about one charger.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct ChargerState {
    /// Silicon revision.
    pub device_variant: DeviceVariant,
    /// Last mode the driver put the charger in.
    pub mode: ChargerMode,
    /// Charging intent. The watchdog recovery re-applies it.
    pub is_charging: bool,
    /// Last reported source.
    pub cable_type: CableType,
    pub input_current_limit_ma: u32,
    /// Last requested fast-charge current. Zero until one is set.
    pub fast_charge_current_ma: u32,
    pub topoff_current_ma: u32,
    pub float_voltage_mv: u32,
    /// Debounced input health.
    pub health: Health,
    /// Consecutive bad VBUS readings, saturating at [`HEALTH_DEBOUNCE_COUNT`].
    pub unhealth_debounce_count: u8,
    /// An over-voltage edge was seen and has not cleared.
    pub ovp_latched: bool,
    pub suspended: bool,
    /// An over-voltage check arrived while suspended and runs on resume.
    pub pending_ovp_check: bool,
    /// Fuel-gauge clock trim read at attach.
    pub fuel_gauge_clock_snapshot: u8,
    /// Fuel gauge runs in its special mode; suspends the fuel-gauge clock quirk.
    pub fuel_gauge_mode: bool,
    /// External factory-mode signal. Turns charge-switch, current and voltage writes into no-ops.
    pub factory_mode: bool,
    /// Mode-select bits saved when OTG boost is entered.
    pub pre_otg_mode_bits: u8,
}

impl ChargerState {
    /// State right after attach.
    pub fn new(device_variant: DeviceVariant, config: &Config) -> Self {
        ChargerState {
            device_variant,
            mode: ChargerMode::Off,
            is_charging: false,
            cable_type: CableType::None,
            input_current_limit_ma: 0,
            fast_charge_current_ma: 0,
            topoff_current_ma: DEFAULT_TOPOFF_MA,
            float_voltage_mv: config.float_voltage_mv,
            health: Health::Good,
            unhealth_debounce_count: 0,
            ovp_latched: false,
            suspended: false,
            pending_ovp_check: false,
            fuel_gauge_clock_snapshot: 0,
            fuel_gauge_mode: false,
            factory_mode: false,
            pre_otg_mode_bits: 0,
        }
    }

    /// Mode the charger rests in when the charger switch is off.
    pub fn idle_mode(&self) -> ChargerMode {
        if self.device_variant.supports_buck_only() {
            ChargerMode::BuckOnly
        } else {
            ChargerMode::Off
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_quirks() {
        assert!(DeviceVariant(0).has_fg_clock_quirk());
        assert!(DeviceVariant(2).has_vsys_drop_erratum());
        assert!(!DeviceVariant(2).has_fg_clock_quirk());
        assert!(DeviceVariant(3).needs_smpl_workaround());
        assert!(!DeviceVariant(3).has_vsys_drop_erratum());
        assert!(!DeviceVariant(3).supports_buck_only());
        assert!(DeviceVariant(4).supports_buck_only());
    }

    #[test]
    fn source_cables() {
        assert!(CableType::Ta.is_source());
        assert!(CableType::Usb.is_source());
        assert!(!CableType::None.is_source());
        assert!(!CableType::Unknown.is_source());
        assert!(!CableType::Otg.is_source());
    }

    #[test]
    fn new_state_starts_healthy_and_idle() {
        let state = ChargerState::new(DeviceVariant(4), &Config::new(4350));
        assert_eq!(state.mode, ChargerMode::Off);
        assert_eq!(state.health, Health::Good);
        assert_eq!(state.float_voltage_mv, 4350);
        assert_eq!(state.topoff_current_ma, 100);
        assert_eq!(state.idle_mode(), ChargerMode::BuckOnly);
    }
}
