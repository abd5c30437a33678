//! Charging status, health debounce, watchdog supervision and over-voltage edges.

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

use crate::device::Device;
use crate::error::Result;
use crate::peers::PowerSupplyPeers;
use crate::registers::{
    field, ChargeState, ChargeStatus0, ChargeStatus1, ChargeStatus3, Reg, VBUS_GOOD,
    VBUS_OVERVOLTAGE, WATCHDOG_FAULT,
};
use crate::state::{ChargeType, ChargerState, ChargingStatus, Health, HEALTH_DEBOUNCE_COUNT};

/// Map a charger state code to a charging status.
///
/// Top-off and done only count as full once the battery current has dropped below the top-off
/// threshold.
pub fn classify_status(
    state: ChargeState,
    average_current_ma: i32,
    topoff_ma: u32,
) -> ChargingStatus {
    match state {
        ChargeState::Off => ChargingStatus::Discharging,
        ChargeState::PreCharge
        | ChargeState::CoolCharge
        | ChargeState::ConstantCurrent
        | ChargeState::ConstantVoltage => ChargingStatus::Charging,
        ChargeState::DoneFlag | ChargeState::TopOff | ChargeState::Done => {
            if i64::from(average_current_ma) < i64::from(topoff_ma) {
                ChargingStatus::Full
            } else {
                ChargingStatus::Charging
            }
        }
        ChargeState::InputInvalid => ChargingStatus::NotCharging,
        _ => ChargingStatus::Unknown,
    }
}

impl ChargerState {
    /// Feed one polled VBUS status code through the health debounce.
    pub fn observe_vbus(&mut self, code: u8) -> Health {
        if VBUS_GOOD.contains(&code) {
            self.ovp_latched = false;
            self.unhealth_debounce_count = 0;
            return Health::Good;
        }

        self.unhealth_debounce_count = self
            .unhealth_debounce_count
            .saturating_add(1)
            .min(HEALTH_DEBOUNCE_COUNT);
        if self.unhealth_debounce_count < HEALTH_DEBOUNCE_COUNT {
            return Health::Good;
        }

        if self.ovp_latched {
            Health::OverVoltage
        } else {
            Health::UnderVoltage
        }
    }

    /// Apply an over-voltage edge. Returns the new health when it changed.
    pub fn observe_ovp_edge(&mut self, code: u8) -> Option<Health> {
        self.pending_ovp_check = false;
        if code == VBUS_OVERVOLTAGE {
            self.ovp_latched = true;
            self.unhealth_debounce_count = HEALTH_DEBOUNCE_COUNT;
            self.health = Health::OverVoltage;
            Some(Health::OverVoltage)
        } else if VBUS_GOOD.contains(&code) && self.ovp_latched {
            self.ovp_latched = false;
            self.unhealth_debounce_count = 0;
            self.health = Health::Good;
            Some(Health::Good)
        } else {
            None
        }
    }
}

impl<D, Dl, P> Device<D, Dl, P>
where
    D: I2c,
    Dl: DelayNs,
    P: PowerSupplyPeers,
{
    pub async fn charging_status(&mut self) -> Result<ChargingStatus, D::Error> {
        let status = ChargeStatus0::from_bytes([self.port.read(Reg::CHG_STATUS0).await?]);
        let average_current_ma = self.peers.average_current_ma();
        let topoff_ma = self.state.topoff_current_ma;
        let charging = classify_status(status.state(), average_current_ma, topoff_ma);
        if charging == ChargingStatus::Full {
            debug!("full: {} mA below {} mA", average_current_ma, topoff_ma);
        }
        Ok(charging)
    }

    pub async fn charge_type(&mut self) -> Result<ChargeType, D::Error> {
        let status = ChargeStatus0::from_bytes([self.port.read(Reg::CHG_STATUS0).await?]);
        Ok(if status.chg_ok() {
            ChargeType::Fast
        } else {
            ChargeType::Trickle
        })
    }

    pub async fn battery_present(&mut self) -> Result<bool, D::Error> {
        let status = ChargeStatus1::from_bytes([self.port.read(Reg::CHG_STATUS1).await?]);
        Ok(status.battery_detected())
    }

    /// Kick the watchdog. If it already expired, put the charger switch back the way it was.
    pub async fn clear_watchdog(&mut self) -> Result<(), D::Error> {
        let status = ChargeStatus3::from_bytes([self.port.read(Reg::CHG_STATUS3).await?]);
        self.port.set_flag(field::WATCHDOG_CLEAR, true).await?;

        if status.fault() == WATCHDOG_FAULT {
            warn!("watchdog expired, restoring charger switch");
            let on = self.state.is_charging;
            self.enable_charger_switch(on).await?;
        }
        Ok(())
    }

    /// Debounced charger health. Also services the watchdog.
    pub async fn charging_health(&mut self) -> Result<Health, D::Error> {
        let status = ChargeStatus1::from_bytes([self.port.read(Reg::CHG_STATUS1).await?]);
        self.clear_watchdog().await?;

        let health = self.state.observe_vbus(status.vbus());
        if health != Health::Good {
            warn!(
                "unhealthy input: vbus {}, count {}, {:?}",
                status.vbus(),
                self.state.unhealth_debounce_count,
                health
            );
        }
        self.state.health = health;
        Ok(health)
    }

    /// Read the VBUS status and apply it as an over-voltage edge.
    pub async fn check_ovp(&mut self) -> Result<(), D::Error> {
        let status = ChargeStatus1::from_bytes([self.port.read(Reg::CHG_STATUS1).await?]);
        if let Some(health) = self.state.observe_ovp_edge(status.vbus()) {
            info!("over-voltage edge: vbus {}, {:?}", status.vbus(), health);
            self.peers.health_changed(health);
        }
        Ok(())
    }

    /// Run the over-voltage check now, or record it for resume when suspended.
    pub async fn ovp_work(&mut self) -> Result<(), D::Error> {
        if self.state.suspended {
            debug!("suspended, over-voltage check deferred");
            self.state.pending_ovp_check = true;
            return Ok(());
        }
        self.check_ovp().await
    }

    /// Stop charging if the battery went away.
    pub async fn battery_detect_work(&mut self) -> Result<(), D::Error> {
        if self.battery_present().await? {
            return Ok(());
        }
        info!("battery removed, charger off");
        self.peers.battery_removed();
        self.enable_charger_switch(false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::state::DeviceVariant;
    use crate::testing::{attach_device, Access, Notification};

    fn state() -> ChargerState {
        ChargerState::new(DeviceVariant(4), &Config::new(4350))
    }

    #[test]
    fn status_table() {
        let cases = [
            (ChargeState::Off, ChargingStatus::Discharging),
            (ChargeState::ConstantCurrent, ChargingStatus::Charging),
            (ChargeState::InputInvalid, ChargingStatus::NotCharging),
            (ChargeState::Reserved0A, ChargingStatus::Unknown),
        ];
        for (state, status) in cases {
            assert_eq!(classify_status(state, 0, 100), status);
        }
    }

    #[test]
    fn topoff_is_full_only_below_threshold() {
        let cases = [
            (ChargeState::TopOff, 80, ChargingStatus::Full),
            (ChargeState::TopOff, 120, ChargingStatus::Charging),
            (ChargeState::Done, 100, ChargingStatus::Charging),
            (ChargeState::DoneFlag, -20, ChargingStatus::Full),
        ];
        for (state, average_ma, status) in cases {
            assert_eq!(classify_status(state, average_ma, 100), status);
        }
    }

    #[test]
    fn three_bad_readings_flip_health() {
        let mut state = state();
        assert_eq!(state.observe_vbus(0x00), Health::Good);
        assert_eq!(state.observe_vbus(0x00), Health::Good);
        assert_eq!(state.observe_vbus(0x00), Health::UnderVoltage);
        assert_eq!(state.unhealth_debounce_count, HEALTH_DEBOUNCE_COUNT);
        assert_eq!(state.observe_vbus(0x00), Health::UnderVoltage);
        assert_eq!(state.unhealth_debounce_count, HEALTH_DEBOUNCE_COUNT);
    }

    #[test]
    fn good_reading_resets_debounce() {
        let mut state = state();
        state.observe_vbus(0x01);
        state.observe_vbus(0x01);
        assert_eq!(state.observe_vbus(0x03), Health::Good);
        assert_eq!(state.unhealth_debounce_count, 0);
        assert_eq!(state.observe_vbus(0x01), Health::Good);
    }

    #[test]
    fn latched_ovp_reports_over_voltage_after_debounce() {
        let mut state = state();
        assert_eq!(
            state.observe_ovp_edge(VBUS_OVERVOLTAGE),
            Some(Health::OverVoltage)
        );
        assert_eq!(state.health, Health::OverVoltage);
        assert_eq!(state.observe_vbus(VBUS_OVERVOLTAGE), Health::OverVoltage);

        assert_eq!(state.observe_ovp_edge(0x05), Some(Health::Good));
        assert!(!state.ovp_latched);
        assert_eq!(state.unhealth_debounce_count, 0);
        // recovery without a latch is not an edge
        assert_eq!(state.observe_ovp_edge(0x05), None);
    }

    #[tokio::test]
    async fn health_query_clears_watchdog() {
        let (mut device, bus) = attach_device(0x04).await;
        bus.set(Reg::CHG_STATUS1, 0x30);

        assert_eq!(device.charging_health().await.unwrap(), Health::Good);
        assert_eq!(bus.get(Reg::WATCHDOG_CLEAR) & 0x01, 0x01);
        assert!(!bus.wrote_to(0x10));
    }

    #[tokio::test]
    async fn watchdog_fault_reasserts_charger_switch() {
        let (mut device, bus) = attach_device(0x04).await;
        device.state.is_charging = true;
        bus.set(Reg::CHG_STATUS1, 0x30);
        bus.set(Reg::CHG_STATUS3, WATCHDOG_FAULT);

        device.charging_health().await.unwrap();

        assert_eq!(bus.get(Reg::MODE_CONTROL) & 0x07, 0x02);
        assert_eq!(bus.get(Reg::WATCHDOG_CONTROL) & 0x03, 0x02);
    }

    #[tokio::test]
    async fn ovp_edge_notifies_peers() {
        let (mut device, bus) = attach_device(0x04).await;
        bus.set(Reg::CHG_STATUS1, 0x20);

        device.check_ovp().await.unwrap();

        assert_eq!(device.state.health, Health::OverVoltage);
        assert_eq!(
            device.peers.notifications(),
            [Notification::Health(Health::OverVoltage)]
        );
    }

    #[tokio::test]
    async fn battery_removal_turns_charger_off() {
        let (mut device, bus) = attach_device(0x04).await;
        device.enable_charger_switch(true).await.unwrap();
        bus.set(Reg::CHG_STATUS1, 0x30);

        device.battery_detect_work().await.unwrap();

        assert_eq!(bus.get(Reg::MODE_CONTROL) & 0x07, 0x01);
        assert_eq!(device.peers.notifications(), [Notification::BatteryRemoved]);
    }

    #[tokio::test]
    async fn battery_present_leaves_charger_alone() {
        let (mut device, bus) = attach_device(0x04).await;
        device.enable_charger_switch(true).await.unwrap();
        bus.set(Reg::CHG_STATUS1, 0x38);
        bus.clear_log();

        device.battery_detect_work().await.unwrap();

        assert_eq!(bus.accesses(), [Access::Read(0x0b)]);
        assert!(device.peers.notifications().is_empty());
    }
}
