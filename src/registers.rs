//! Register map, field descriptors and decoded status registers.

use modular_bitfield::specifiers::{B1, B3, B4};
use modular_bitfield::{bitfield, BitfieldSpecifier};

/// Register address.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Reg(pub u8);

#[allow(dead_code)]
impl Reg {
    pub const SC_INT_MASK: Reg = Reg(0x08);
    pub const CHG_STATUS0: Reg = Reg(0x0a);
    pub const CHG_STATUS1: Reg = Reg(0x0b);
    pub const CHG_STATUS3: Reg = Reg(0x0d);

    pub const MODE_CONTROL: Reg = Reg(0x10);
    pub const INPUT_REGULATION: Reg = Reg(0x11);
    pub const INPUT_CURRENT: Reg = Reg(0x12);
    pub const OTG_CONTROL: Reg = Reg(0x14);
    pub const BOOST_VOLTAGE: Reg = Reg(0x15);
    pub const COOL_CURRENT: Reg = Reg(0x16);
    pub const FAST_CURRENT: Reg = Reg(0x17);
    pub const FLOAT_VOLTAGE: Reg = Reg(0x18);
    pub const TOPOFF_CURRENT: Reg = Reg(0x19);
    pub const WATCHDOG_CONTROL: Reg = Reg(0x1a);
    pub const BOOST_FREQUENCY: Reg = Reg(0x1b);
    pub const WATCHDOG_CLEAR: Reg = Reg(0x1d);
    pub const OTG_ENABLE: Reg = Reg(0x1f);
    pub const SAFETY_TIMERS: Reg = Reg(0x20);
    pub const BYPASS_0: Reg = Reg(0x23);
    pub const BYPASS_1: Reg = Reg(0x24);
    pub const VBUS_TO_BATTERY: Reg = Reg(0x26);
    pub const QBAT_CONTROL: Reg = Reg(0x27);
    pub const CHARGE_TIMERS: Reg = Reg(0x29);
    pub const ASYNC_TIME: Reg = Reg(0x2a);

    pub const FG_RESET: Reg = Reg(0x57);
    pub const MANUAL_RESET: Reg = Reg(0x59);
    pub const TEST_ACCESS: Reg = Reg(0x5a);
    pub const SELF_DISCHARGE_CFG2: Reg = Reg(0x5e);
    pub const SELF_DISCHARGE_CFG3: Reg = Reg(0x5f);
    pub const FG_CLOCK_CONTROL: Reg = Reg(0x72);
    pub const REVISION: Reg = Reg(0x73);
    pub const FG_CLOCK: Reg = Reg(0x7b);
    pub const PORT_RESET: Reg = Reg(0x7c);
    pub const QBAT_SPEED: Reg = Reg(0x87);
    pub const SMPL_CONTROL: Reg = Reg(0xaf);

    pub const fn new(val: u8) -> Self {
        Reg(val)
    }

    pub const fn to_u8(self) -> u8 {
        self.0
    }
}

/// A bit field inside a single 8-bit register.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Field {
    pub reg: Reg,
    pub shift: u8,
    pub width: u8,
}

impl Field {
    pub const fn new(reg: Reg, shift: u8, width: u8) -> Self {
        Field { reg, shift, width }
    }

    /// Largest value the field can hold.
    pub const fn max(self) -> u8 {
        ((1u16 << self.width) - 1) as u8
    }

    /// The field's bits in register position.
    pub const fn mask(self) -> u8 {
        self.max() << self.shift
    }

    /// Move `value` into register position, dropping bits that do not fit.
    pub const fn encode(self, value: u8) -> u8 {
        (((value as u16) << self.shift) as u8) & self.mask()
    }

    /// Extract the field from a raw register value.
    pub const fn decode(self, raw: u8) -> u8 {
        (raw & self.mask()) >> self.shift
    }
}

/// Register fields the driver touches.
pub mod field {
    use super::{Field, Reg};

    pub const VMID_INT_MASK: Field = Field::new(Reg::SC_INT_MASK, 1, 1);

    pub const MODE_SELECT: Field = Field::new(Reg::MODE_CONTROL, 0, 3);
    pub const CHARGE_ENABLE: Field = Field::new(Reg::MODE_CONTROL, 4, 1);

    pub const VIN_DROP: Field = Field::new(Reg::INPUT_REGULATION, 4, 3);
    pub const INPUT_CURRENT_LIMIT: Field = Field::new(Reg::INPUT_CURRENT, 0, 6);

    pub const OTG_OCP_LIMIT: Field = Field::new(Reg::OTG_CONTROL, 2, 2);
    pub const OTG_OCP_SWITCH_OFF: Field = Field::new(Reg::OTG_CONTROL, 4, 1);
    pub const OTG_OCP_SWITCH_ON: Field = Field::new(Reg::OTG_CONTROL, 5, 1);
    pub const BOOST_VOLTAGE: Field = Field::new(Reg::BOOST_VOLTAGE, 0, 5);
    pub const BOOST_FREQUENCY: Field = Field::new(Reg::BOOST_FREQUENCY, 6, 2);
    pub const OTG_ENABLE: Field = Field::new(Reg::OTG_ENABLE, 1, 1);

    pub const COOL_CHARGING_CURRENT: Field = Field::new(Reg::COOL_CURRENT, 0, 6);
    pub const FAST_CHARGING_CURRENT: Field = Field::new(Reg::FAST_CURRENT, 0, 6);
    pub const FLOAT_VOLTAGE: Field = Field::new(Reg::FLOAT_VOLTAGE, 1, 6);
    pub const FIRST_TOPOFF_CURRENT: Field = Field::new(Reg::TOPOFF_CURRENT, 0, 4);
    pub const SECOND_TOPOFF_CURRENT: Field = Field::new(Reg::TOPOFF_CURRENT, 4, 4);

    pub const WATCHDOG_MODE: Field = Field::new(Reg::WATCHDOG_CONTROL, 0, 2);
    pub const MIVR_ENABLE: Field = Field::new(Reg::WATCHDOG_CONTROL, 7, 1);
    pub const WATCHDOG_CLEAR: Field = Field::new(Reg::WATCHDOG_CLEAR, 0, 1);
    /// Topoff timer (90 min) and watchdog period (80 s) share this field.
    pub const TIMER_PERIODS: Field = Field::new(Reg::SAFETY_TIMERS, 0, 6);
    pub const TOPOFF_TIMER: Field = Field::new(Reg::SAFETY_TIMERS, 3, 3);
    pub const CHARGE_TIMER_ENABLE: Field = Field::new(Reg::CHARGE_TIMERS, 7, 1);
    pub const ASYNC_RECOVERY: Field = Field::new(Reg::ASYNC_TIME, 3, 1);

    pub const MANUAL_RESET_ENABLE: Field = Field::new(Reg::MANUAL_RESET, 3, 1);
    pub const PORT_RESET_ENABLE: Field = Field::new(Reg::PORT_RESET, 0, 1);
    pub const TEST_ACCESS_ENABLE: Field = Field::new(Reg::TEST_ACCESS, 7, 1);
    pub const FC_SELF_DISCHARGE: Field = Field::new(Reg::SELF_DISCHARGE_CFG2, 6, 1);
    pub const SELF_DISCHARGE_MODE: Field = Field::new(Reg::SELF_DISCHARGE_CFG3, 7, 1);
    pub const FG_CLOCK_OVERRIDE: Field = Field::new(Reg::FG_CLOCK_CONTROL, 7, 1);
    pub const REVISION_ID: Field = Field::new(Reg::REVISION, 0, 4);
    pub const QBAT_SWITCH_SPEED: Field = Field::new(Reg::QBAT_SPEED, 4, 4);
    pub const SMPL_WORKAROUND: Field = Field::new(Reg::SMPL_CONTROL, 7, 1);
}

/// Contents of the mode-select field.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[repr(u8)]
pub enum ModeSelect {
    /// Buck and charger off, battery supplies the system.
    Off = 0,
    /// Buck on, charger off.
    Buck = 1,
    /// Buck on, charger on.
    Charge = 2,
    /// Buck off, boost sourcing VBUS.
    Otg = 4,
    /// Factory test transmit mode.
    Tx = 5,
}

impl ModeSelect {
    pub const fn bits(self) -> u8 {
        self as u8
    }
}

/// Charger state machine status, as reported in `CHG_STATUS0`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, BitfieldSpecifier)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[bits = 4]
pub enum ChargeState {
    /// Charger is off.
    Off,
    #[doc(hidden)]
    Reserved01,
    /// Pre-charge.
    PreCharge,
    /// Cool-temperature charge.
    CoolCharge,
    /// Constant current.
    ConstantCurrent,
    /// Constant voltage.
    ConstantVoltage,
    /// Done flag raised.
    DoneFlag,
    /// Top-off.
    TopOff,
    /// Done.
    Done,
    #[doc(hidden)]
    Reserved09,
    #[doc(hidden)]
    Reserved0A,
    #[doc(hidden)]
    Reserved0B,
    #[doc(hidden)]
    Reserved0C,
    #[doc(hidden)]
    Reserved0D,
    #[doc(hidden)]
    Reserved0E,
    /// Input is invalid.
    InputInvalid = 0x0f,
}

#[bitfield(bits = 8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
/// `CHG_STATUS0`
pub struct ChargeStatus0 {
    #[bits = 4]
    pub state: ChargeState,
    #[skip]
    __: B3,
    /// Fast charge is allowed.
    pub chg_ok: bool,
}

/// VBUS status code reported while the input is over-voltage.
pub const VBUS_OVERVOLTAGE: u8 = 0x02;
/// VBUS status codes reported while the input is inside its window.
pub const VBUS_GOOD: [u8; 2] = [0x03, 0x05];

#[bitfield(bits = 8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
/// `CHG_STATUS1`
pub struct ChargeStatus1 {
    #[skip]
    __: B3,
    /// Battery is attached.
    pub battery_detected: bool,
    /// VBUS status code.
    pub vbus: B3,
    #[skip]
    __: B1,
}

/// Watchdog fault code reported in `CHG_STATUS3`.
pub const WATCHDOG_FAULT: u8 = 0x05;

#[bitfield(bits = 8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
/// `CHG_STATUS3`
pub struct ChargeStatus3 {
    /// Fault code.
    pub fault: B4,
    #[skip]
    __: B4,
}
