//! Charge, buck and OTG boost mode transitions.
//!
//! Each transition is a fixed sequence of register writes and settle delays. A bus error stops
//! the sequence where it is, with no rollback, and surfaces as [`Error::SequenceAborted`]. The
//! recorded mode only changes once the write that defines the new mode has landed.

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

use crate::device::Device;
use crate::error::{Error, Result};
use crate::peers::PowerSupplyPeers;
use crate::registers::{field, ModeSelect};
use crate::state::ChargerMode;

/// QBAT current forced before switching on revisions with the VSYS drop erratum.
const VSYS_GUARD_CURRENT_MA: u32 = 1700;
const VSYS_GUARD_SETTLE_MS: u32 = 20;
const ASYNC_SHORTEN_SETTLE_MS: u32 = 50;
const ASYNC_RESTORE_SETTLE_MS: u32 = 150;
const OTG_ENABLE_SETTLE_MS: u32 = 5;
const FACTORY_TX_SETTLE_MS: u32 = 150;

const WATCHDOG_ENABLED: u8 = 0x02;
const WATCHDOG_DISABLED: u8 = 0x01;

/// 1 MHz boost switching frequency.
const BOOST_FREQUENCY_1_MHZ: u8 = 0x02;
/// 1.5 A OTG current limit.
const OTG_OCP_1500_MA: u8 = 0x03;
/// 5.1 V boost output.
const BOOST_VOLTAGE_5100_MV: u8 = 0x16;

impl<D, Dl, P> Device<D, Dl, P>
where
    D: I2c,
    Dl: DelayNs,
    P: PowerSupplyPeers,
{
    /// Turn the charger switch on or off, leaving the buck in its idle state when off.
    pub async fn enable_charger_switch(&mut self, on: bool) -> Result<(), D::Error> {
        if self.state.factory_mode {
            info!("factory mode, charger switch not changed");
            return Ok(());
        }
        if self.state.mode == ChargerMode::OtgBoost {
            warn!("charger switch not changed while OTG boost is active");
            return Ok(());
        }
        self.switch_sequence(on).await.map_err(Error::aborted)
    }

    async fn switch_sequence(&mut self, on: bool) -> Result<(), D::Error> {
        let variant = self.state.device_variant;
        let erratum = variant.has_vsys_drop_erratum();
        let idle = if variant.supports_buck_only() {
            ModeSelect::Buck
        } else {
            ModeSelect::Off
        };

        if erratum {
            self.set_fast_charging_current(VSYS_GUARD_CURRENT_MA).await?;
            self.delay.delay_ms(VSYS_GUARD_SETTLE_MS).await;
        }

        if on {
            info!("turn on charger");
            self.write_mode(idle).await?;
            if erratum {
                self.delay.delay_ms(ASYNC_SHORTEN_SETTLE_MS).await;
                self.port.set_flag(field::ASYNC_RECOVERY, false).await?;
            }
            self.write_mode(ModeSelect::Charge).await?;
            self.state.mode = ChargerMode::Charging;
            if erratum {
                self.delay.delay_ms(ASYNC_RESTORE_SETTLE_MS).await;
                self.port.set_flag(field::ASYNC_RECOVERY, true).await?;
            }
            self.watchdog_control(true).await
        } else {
            info!("turn off charger");
            self.write_mode(idle).await?;
            self.state.mode = self.state.idle_mode();
            self.watchdog_control(false).await
        }
    }

    /// Turn the buck off along with the charger switch.
    pub async fn buck_off(&mut self) -> Result<(), D::Error> {
        debug!("set buck off");
        self.write_mode(ModeSelect::Off).await?;
        self.state.mode = ChargerMode::Off;
        Ok(())
    }

    pub async fn watchdog_control(&mut self, on: bool) -> Result<(), D::Error> {
        let mode = if on {
            WATCHDOG_ENABLED
        } else {
            WATCHDOG_DISABLED
        };
        self.port.write_field(field::WATCHDOG_MODE, mode).await?;
        debug!("watchdog timer enabled: {}", on);
        Ok(())
    }

    pub async fn otg_control(&mut self, enable: bool) -> Result<(), D::Error> {
        let res = if enable {
            self.enter_otg().await
        } else {
            self.exit_otg().await
        };
        res.map_err(Error::aborted)
    }

    /// OTG boost is selected in hardware.
    pub async fn otg_active(&mut self) -> Result<bool, D::Error> {
        let bits = self.port.read_field(field::MODE_SELECT).await?;
        Ok(bits == ModeSelect::Otg.bits())
    }

    async fn enter_otg(&mut self) -> Result<(), D::Error> {
        if self.state.mode == ChargerMode::OtgBoost {
            debug!("OTG boost already on");
            return Ok(());
        }
        self.state.pre_otg_mode_bits = self.port.read_field(field::MODE_SELECT).await?;

        // Keep the over-current switch and the boost rail quiet while the mode changes.
        self.port.set_flag(field::OTG_OCP_SWITCH_ON, true).await?;
        self.port.set_flag(field::OTG_ENABLE, false).await?;
        self.write_mode(ModeSelect::Otg).await?;
        self.state.mode = ChargerMode::OtgBoost;

        self.delay.delay_ms(OTG_ENABLE_SETTLE_MS).await;
        self.port.set_flag(field::OTG_ENABLE, true).await?;
        self.port.set_flag(field::OTG_OCP_SWITCH_ON, false).await?;

        self.port
            .write_field(field::BOOST_FREQUENCY, BOOST_FREQUENCY_1_MHZ)
            .await?;
        self.port
            .write_field(field::OTG_OCP_LIMIT, OTG_OCP_1500_MA)
            .await?;
        self.port.set_flag(field::OTG_OCP_SWITCH_OFF, true).await?;
        self.port
            .write_field(field::BOOST_VOLTAGE, BOOST_VOLTAGE_5100_MV)
            .await?;

        self.port.set_flag(field::VMID_INT_MASK, false).await?;
        info!("OTG boost on");
        Ok(())
    }

    async fn exit_otg(&mut self) -> Result<(), D::Error> {
        self.port.set_flag(field::VMID_INT_MASK, true).await?;
        if self.state.mode != ChargerMode::OtgBoost {
            debug!("OTG boost already off");
            return Ok(());
        }

        let restore = self.state.pre_otg_mode_bits;
        self.port.write_field(field::MODE_SELECT, restore).await?;
        if self.state.factory_mode && self.state.device_variant.supports_buck_only() {
            self.write_mode(ModeSelect::Tx).await?;
            self.delay.delay_ms(FACTORY_TX_SETTLE_MS).await;
            self.port.write_field(field::MODE_SELECT, restore).await?;
        }

        self.state.mode = if restore == ModeSelect::Charge.bits() {
            ChargerMode::Charging
        } else if restore == ModeSelect::Buck.bits() {
            ChargerMode::BuckOnly
        } else {
            ChargerMode::Off
        };
        info!("OTG boost off, mode {:?}", self.state.mode);
        Ok(())
    }

    async fn write_mode(&mut self, mode: ModeSelect) -> Result<(), D::Error> {
        self.port.write_field(field::MODE_SELECT, mode.bits()).await
    }
}
