//! The lock-protected half of the driver: register port, state and regulation writes.
//!
//! Mode sequencing lives in [`crate::mode`] and status derivation in [`crate::health`]; both add
//! methods to [`Device`].

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

use crate::config::Config;
use crate::error::Result;
use crate::peers::PowerSupplyPeers;
use crate::registers::{field, Reg};
use crate::regulation::{self, TopoffPath};
use crate::state::{ChargerState, DeviceVariant, DEFAULT_TOPOFF_MA};

/// Topoff timer 90 min, watchdog 80 s.
const TIMER_PERIODS_DEFAULT: u8 = 0x35;
/// Topoff timer 90 min.
const TOPOFF_TIMER_90_MIN: u8 = 0x06;
/// 4.5 V input regulation level.
const MIVR_4500_MV: u8 = 0x03;
const QBAT_CONTROL_DEFAULT: u8 = 0x51;
const WATCHDOG_CONTROL_DEFAULT: u8 = 0x91;

/// Analog trim for revision 0 silicon.
const REV0_TRIM: [(u8, u8); 9] = [
    (0x87, 0x00),
    (0x92, 0xe5),
    (0x97, 0x85),
    (0x9a, 0x67),
    (0x9c, 0xea),
    (0x9e, 0x6e),
    (0xa1, 0x20),
    (0xa4, 0x0a),
    (0xa5, 0x45),
];
const REV0_OTP_STATUS: Reg = Reg::new(0x51);
const REV0_OTP_VERSION: Reg = Reg::new(0x49);
const REV0_OTP_VERSIONS_TRIMMED: [u8; 4] = [0x18, 0x19, 0x1c, 0x1d];
const REV0_LOOP_CONTROL: Reg = Reg::new(0x89);

/// Read-modify-write steps of the re-initialization: (register, bits to clear, bits to set).
const ANALOG_DEFAULTS: [(u8, u8, u8); 4] = [
    (0x13, 0x60, 0x00),
    (0xa8, 0x80, 0x80),
    (0x89, 0x80, 0x00),
    (0xa5, 0x04, 0x00),
];
const BUCK_CONTROL: Reg = Reg::new(0x0f);
const BUCK_CONTROL_DEFAULT: u8 = 0x50;

pub(crate) struct Device<D, Dl, P> {
    pub port: crate::port::RegisterPort<D>,
    pub delay: Dl,
    pub peers: P,
    pub state: ChargerState,
    pub config: Config,
}

impl<D, Dl, P> Device<D, Dl, P>
where
    D: I2c,
    Dl: DelayNs,
    P: PowerSupplyPeers,
{
    /// Identify the silicon and program the attach-time defaults.
    pub async fn attach(
        mut port: crate::port::RegisterPort<D>,
        delay: Dl,
        peers: P,
        config: Config,
    ) -> Result<Self, D::Error> {
        let variant = DeviceVariant(port.read_field(field::REVISION_ID).await?);
        info!("{}: device variant {}", config.charger_name, variant.0);

        let state = ChargerState::new(variant, &config);
        let mut device = Device {
            port,
            delay,
            peers,
            state,
            config,
        };
        device.init().await?;
        Ok(device)
    }

    async fn init(&mut self) -> Result<(), D::Error> {
        let variant = self.state.device_variant;

        if variant.needs_smpl_workaround() {
            self.port.set_flag(field::SMPL_WORKAROUND, true).await?;
        }
        self.port.set_flag(field::SELF_DISCHARGE_MODE, true).await?;

        self.state.fuel_gauge_clock_snapshot = self.port.read(Reg::FG_CLOCK).await?;
        if variant.has_vsys_drop_erratum() {
            self.port.set_flag(field::ASYNC_RECOVERY, true).await?;
        }

        self.port
            .write_field(field::TIMER_PERIODS, TIMER_PERIODS_DEFAULT)
            .await?;

        let mode_control = self.port.read(Reg::MODE_CONTROL).await?;
        if field::CHARGE_ENABLE.decode(mode_control) == 0 {
            let mode_control = mode_control | field::CHARGE_ENABLE.mask();
            self.port.write(Reg::MODE_CONTROL, mode_control).await?;
            info!("charge enable forced on: {}", mode_control);
        }

        let float_voltage_mv = self.state.float_voltage_mv;
        self.set_float_voltage(float_voltage_mv).await?;

        self.port.set_flag(field::CHARGE_TIMER_ENABLE, false).await?;

        self.state.fuel_gauge_mode = self.peers.fuel_gauge_mode();
        Ok(())
    }

    /// Reprogram every tunable register, as after a charger reset.
    pub async fn reinitialize(&mut self) -> Result<(), D::Error> {
        self.port.set_flag(field::TEST_ACCESS_ENABLE, true).await?;

        if self.state.device_variant == DeviceVariant(0) {
            for (reg, val) in REV0_TRIM {
                self.port.write(Reg::new(reg), val).await?;
            }
            let otp_status = self.port.read(REV0_OTP_STATUS).await?;
            if otp_status & 0x02 != 0 {
                let version = self.port.read(REV0_OTP_VERSION).await? & 0x1f;
                if !REV0_OTP_VERSIONS_TRIMMED.contains(&version) {
                    self.port.update(REV0_LOOP_CONTROL, 0x01, 0x03).await?;
                }
            }
        }

        self.port.write_field(field::QBAT_SWITCH_SPEED, 0).await?;
        self.port
            .write(Reg::QBAT_CONTROL, QBAT_CONTROL_DEFAULT)
            .await?;
        self.port
            .write_field(field::TIMER_PERIODS, TIMER_PERIODS_DEFAULT)
            .await?;
        self.port
            .write(Reg::WATCHDOG_CONTROL, WATCHDOG_CONTROL_DEFAULT)
            .await?;

        for (index, (reg, clear, set)) in ANALOG_DEFAULTS.into_iter().enumerate() {
            self.port
                .modify(Reg::new(reg), |val| (val & !clear) | set)
                .await?;
            if index == 1 {
                self.port.write(BUCK_CONTROL, BUCK_CONTROL_DEFAULT).await?;
            }
        }

        self.port
            .write_field(field::TOPOFF_TIMER, TOPOFF_TIMER_90_MIN)
            .await?;

        self.set_mivr().await?;
        let float_voltage_mv = self.state.float_voltage_mv;
        self.set_float_voltage(float_voltage_mv).await?;

        if self
            .set_topoff_current(TopoffPath::First, DEFAULT_TOPOFF_MA)
            .await?
        {
            self.state.topoff_current_ma = DEFAULT_TOPOFF_MA;
        }
        if self.config.eoc_dual_path {
            self.set_topoff_current(TopoffPath::Second, DEFAULT_TOPOFF_MA)
                .await?;
        }

        info!("{}: re-initialized", self.config.charger_name);
        Ok(())
    }

    /// Enable input voltage regulation at 4.5 V.
    pub async fn set_mivr(&mut self) -> Result<(), D::Error> {
        self.port.set_flag(field::MIVR_ENABLE, true).await?;
        self.port.write_field(field::VIN_DROP, MIVR_4500_MV).await
    }

    /// Regulation setters return `false` when factory mode kept them from writing.
    pub async fn set_input_current_limit(&mut self, ma: u32) -> Result<bool, D::Error> {
        if self.state.factory_mode {
            debug!("factory mode, input current limit not changed");
            return Ok(false);
        }
        let code = regulation::input_current_code(ma);
        info!("input current limit {} mA, code {}", ma, code);
        self.port
            .write_field(field::INPUT_CURRENT_LIMIT, code)
            .await?;
        Ok(true)
    }

    pub async fn input_current_limit(&mut self) -> Result<u32, D::Error> {
        let code = self.port.read_field(field::INPUT_CURRENT_LIMIT).await?;
        Ok(regulation::input_current_ma(code))
    }

    /// Program the fast-charge current, and the cool-charge current capped at 1 A.
    pub async fn set_fast_charging_current(&mut self, ma: u32) -> Result<bool, D::Error> {
        if self.state.factory_mode {
            debug!("factory mode, fast charge current not changed");
            return Ok(false);
        }
        let code = regulation::fast_charge_code(ma);
        info!("fast charge current {} mA, code {}", ma, code);
        self.port
            .write_field(field::FAST_CHARGING_CURRENT, code)
            .await?;
        self.port
            .write_field(
                field::COOL_CHARGING_CURRENT,
                regulation::cool_charge_code(code),
            )
            .await?;
        Ok(true)
    }

    pub async fn fast_charging_current(&mut self) -> Result<u32, D::Error> {
        let code = self.port.read_field(field::FAST_CHARGING_CURRENT).await?;
        Ok(regulation::fast_charge_ma(code))
    }

    pub async fn set_topoff_current(
        &mut self,
        path: TopoffPath,
        ma: u32,
    ) -> Result<bool, D::Error> {
        if self.state.factory_mode {
            debug!("factory mode, topoff current not changed");
            return Ok(false);
        }
        let code = regulation::topoff_code(ma);
        info!("topoff current {:?} {} mA, code {}", path, ma, code);
        let field = match path {
            TopoffPath::First => field::FIRST_TOPOFF_CURRENT,
            TopoffPath::Second => field::SECOND_TOPOFF_CURRENT,
        };
        self.port.write_field(field, code).await?;
        Ok(true)
    }

    /// First-path top-off threshold.
    pub async fn topoff_current(&mut self) -> Result<u32, D::Error> {
        let code = self.port.read_field(field::FIRST_TOPOFF_CURRENT).await?;
        Ok(regulation::topoff_ma(code))
    }

    pub async fn set_float_voltage(&mut self, mv: u32) -> Result<bool, D::Error> {
        if self.state.factory_mode {
            debug!("factory mode, float voltage not changed");
            return Ok(false);
        }
        let code = regulation::float_voltage_code(mv);
        info!("float voltage {} mV, code {}", mv, code);
        self.port.write_field(field::FLOAT_VOLTAGE, code).await?;
        Ok(true)
    }

    pub async fn float_voltage(&mut self) -> Result<u32, D::Error> {
        let code = self.port.read_field(field::FLOAT_VOLTAGE).await?;
        Ok(regulation::float_voltage_mv(code))
    }
}
