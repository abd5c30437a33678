use core::cell::RefCell;

use embassy_sync::blocking_mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

use crate::config::Config;
use crate::device::Device;
use crate::error::{Error, Result};
use crate::events::{AcOkSubscriber, Event, EventKind, WorkQueue, ACOK_DEBOUNCE_MS};
use crate::peers::PowerSupplyPeers;
use crate::port::{RegisterPort, DEFAULT_ADDRESS};
use crate::registers::{field, Reg};
use crate::regulation::TopoffPath;
use crate::state::{
    CableType, ChargeMode, ChargeType, ChargerMode, ChargerState, ChargingStatus, DeviceVariant,
    Health, DEFAULT_TOPOFF_MA,
};

const FG_CLOCK_SUSPEND_BOOST: u8 = 64;
const FG_RESET_ASSERT: u8 = 0xc4;
const FG_RESET_RELEASE: u8 = 0x04;
const FG_RESET_SETTLE_MS: u32 = 500;
const RELIEVE_VBUS_TO_BATTERY: u8 = 0x5d;
const BYPASS_SEQUENCE: [(Reg, u8); 3] = [
    (Reg::ASYNC_TIME, 0x10),
    (Reg::BYPASS_0, 0x15),
    (Reg::BYPASS_1, 0x44),
];

/// Power-supply properties.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Property {
    /// Charging status. Read-only.
    Status,
    /// Fast or trickle. Read-only.
    ChargeType,
    /// Debounced input health. Read-only.
    Health,
    /// Read: a charge current is set. Write: the attached [`CableType`].
    Online,
    /// Input current limit, mA.
    CurrentMax,
    /// Read: effective charge current, mA. Write: fast-charge current, mA.
    CurrentAvg,
    /// Same as [`Property::CurrentAvg`].
    CurrentNow,
    /// Programmed fast-charge current, mA. Read-only.
    ConstantChargeCurrent,
    /// Top-off current, mA.
    CurrentFull,
    /// Read: charging intent. Write: a [`ChargeMode`].
    ChargingEnabled,
    /// OTG boost selected in hardware.
    ChargeOtgControl,
    /// Float voltage, mV.
    VoltageMax,
    /// Battery attached. Read-only.
    Present,
    /// Write `true` to program bypass mode. Write-only.
    Authentic,
    /// Fast-charge self-discharge enable. Write-only.
    Resistance,
    /// Write `true` to relieve the VBUS-to-battery path. Write-only.
    InputVoltageRegulation,
    /// Write to re-initialize every charger register. Write-only.
    ChargeEnabled,
    /// Write `true` when a JIG is connected. Write-only.
    EnergyNow,
    /// Fuel-gauge measurement mode flag. Write-only.
    Scope,
    /// Write `true` to pulse the fuel-gauge reset. Write-only.
    FuelGaugeReset,
    /// OTG supply online, as last commanded.
    OtgOnline,
}

/// A property value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum PropertyValue {
    /// Charging status.
    Status(ChargingStatus),
    /// Charge phase.
    ChargeType(ChargeType),
    /// Health.
    Health(Health),
    /// Flag.
    Bool(bool),
    /// Current in milliamps.
    MilliAmps(u32),
    /// Voltage in millivolts.
    MilliVolts(u32),
    /// Attached source.
    Cable(CableType),
    /// Requested charge mode.
    ChargeMode(ChargeMode),
}

/// An S2MU005 charger.
///
/// All register sequences run under one lock, whether they come from property calls or from the
/// event worker. Interrupt-side code only raises work, through [`Charger::notify_ac_ok`],
/// [`Charger::notify_ovp`] and [`Charger::notify_battery_detect`]. Each kind of work is pending at
/// most once. A task must drive [`Charger::run`] for it to be handled.
pub struct Charger<M: RawMutex, D, Dl, P> {
    device: Mutex<M, Device<D, Dl, P>>,
    work: blocking_mutex::Mutex<M, RefCell<WorkQueue>>,
    wake: Signal<M, ()>,
}

impl<M, D, Dl, P> Charger<M, D, Dl, P>
where
    M: RawMutex,
    D: I2c,
    Dl: DelayNs,
    P: PowerSupplyPeers,
{
    /// Identify the charger at [`DEFAULT_ADDRESS`] and program its defaults.
    pub async fn probe(i2c_dev: D, delay: Dl, peers: P, config: Config) -> Result<Self, D::Error> {
        Self::probe_at(i2c_dev, DEFAULT_ADDRESS, delay, peers, config).await
    }

    /// Identify the charger at `addr` and program its defaults.
    pub async fn probe_at(
        i2c_dev: D,
        addr: u8,
        delay: Dl,
        peers: P,
        config: Config,
    ) -> Result<Self, D::Error> {
        let port = RegisterPort::new(i2c_dev, addr);
        let device = Device::attach(port, delay, peers, config).await?;
        info!("{}: charger attached", config.charger_name);
        Ok(Charger {
            device: Mutex::new(device),
            work: blocking_mutex::Mutex::new(RefCell::new(WorkQueue::new())),
            wake: Signal::new(),
        })
    }

    /// Detach and hand back the bus.
    pub fn release(self) -> D {
        self.device.into_inner().port.release()
    }

    /// Silicon revision read at attach.
    pub async fn device_variant(&self) -> DeviceVariant {
        self.device.lock().await.state.device_variant
    }

    /// Snapshot of the driver's state.
    pub async fn state(&self) -> ChargerState {
        self.device.lock().await.state.clone()
    }

    /// Drive the external factory-mode signal.
    pub async fn set_factory_mode(&self, on: bool) {
        let mut device = self.device.lock().await;
        info!("{}: factory mode {}", device.config.charger_name, on);
        device.state.factory_mode = on;
    }

    /// Read a property. Write-only properties return [`Error::Unsupported`].
    pub async fn get_property(&self, property: Property) -> Result<PropertyValue, D::Error> {
        let mut device = self.device.lock().await;
        let value = match property {
            Property::Status => PropertyValue::Status(device.charging_status().await?),
            Property::ChargeType => PropertyValue::ChargeType(device.charge_type().await?),
            Property::Health => PropertyValue::Health(device.charging_health().await?),
            Property::Online => PropertyValue::Bool(device.state.fast_charge_current_ma > 0),
            Property::CurrentMax => PropertyValue::MilliAmps(device.input_current_limit().await?),
            Property::CurrentAvg | Property::CurrentNow => {
                if device.state.fast_charge_current_ma > 0 {
                    let input = device.input_current_limit().await?;
                    let charge = device.fast_charging_current().await?;
                    PropertyValue::MilliAmps(input.min(charge))
                } else {
                    PropertyValue::MilliAmps(0)
                }
            }
            Property::ConstantChargeCurrent => {
                PropertyValue::MilliAmps(device.fast_charging_current().await?)
            }
            Property::CurrentFull => PropertyValue::MilliAmps(device.topoff_current().await?),
            Property::ChargingEnabled => PropertyValue::Bool(device.state.is_charging),
            Property::ChargeOtgControl => PropertyValue::Bool(device.otg_active().await?),
            Property::OtgOnline => PropertyValue::Bool(device.state.mode == ChargerMode::OtgBoost),
            Property::VoltageMax => PropertyValue::MilliVolts(device.float_voltage().await?),
            Property::Present => PropertyValue::Bool(device.battery_present().await?),
            _ => return Err(Error::Unsupported),
        };
        trace!("get {:?} = {:?}", property, value);
        Ok(value)
    }

    /// Write a property. Read-only properties and mismatched value types return
    /// [`Error::Unsupported`].
    pub async fn set_property(
        &self,
        property: Property,
        value: PropertyValue,
    ) -> Result<(), D::Error> {
        let mut device = self.device.lock().await;
        debug!("set {:?} = {:?}", property, value);
        match (property, value) {
            (Property::Online, PropertyValue::Cable(cable)) => {
                device.state.cable_type = cable;
                device.state.input_current_limit_ma = device.input_current_limit().await?;
                info!(
                    "cable {:?}, input current {} mA",
                    cable, device.state.input_current_limit_ma
                );
                if cable != CableType::Otg {
                    let attached = cable.is_source();
                    if attached {
                        device.set_mivr().await?;
                    }
                    device.peers.cable_changed(attached);
                }
            }
            (Property::CurrentMax, PropertyValue::MilliAmps(ma)) => {
                if device.set_input_current_limit(ma).await? {
                    device.state.input_current_limit_ma = ma;
                }
            }
            (Property::CurrentAvg | Property::CurrentNow, PropertyValue::MilliAmps(ma)) => {
                if device.set_fast_charging_current(ma).await? {
                    device.state.fast_charge_current_ma = ma;
                }
            }
            (Property::CurrentFull, PropertyValue::MilliAmps(ma)) => {
                if device.set_topoff_current(TopoffPath::First, ma).await? {
                    device.state.topoff_current_ma = ma;
                }
                if device.config.eoc_dual_path {
                    device
                        .set_topoff_current(TopoffPath::Second, DEFAULT_TOPOFF_MA)
                        .await?;
                }
            }
            (Property::VoltageMax, PropertyValue::MilliVolts(mv)) => {
                if device.set_float_voltage(mv).await? {
                    device.state.float_voltage_mv = mv;
                }
            }
            (Property::ChargingEnabled, PropertyValue::ChargeMode(mode)) => {
                Self::set_charging_enabled(&mut device, mode).await?;
            }
            (Property::ChargeOtgControl | Property::OtgOnline, PropertyValue::Bool(on)) => {
                device.otg_control(on).await?;
            }
            (Property::Authentic, PropertyValue::Bool(on)) => {
                if on {
                    info!("bypass set");
                    for (reg, val) in BYPASS_SEQUENCE {
                        device.port.write(reg, val).await?;
                    }
                }
            }
            (Property::Resistance, PropertyValue::Bool(on)) => {
                device.port.set_flag(field::FC_SELF_DISCHARGE, on).await?;
            }
            (Property::InputVoltageRegulation, PropertyValue::Bool(on)) => {
                if on {
                    info!("relieve VBUS to battery");
                    device
                        .port
                        .write(Reg::VBUS_TO_BATTERY, RELIEVE_VBUS_TO_BATTERY)
                        .await?;
                }
            }
            (Property::ChargeEnabled, PropertyValue::Bool(_)) => {
                device.reinitialize().await?;
            }
            (Property::EnergyNow, PropertyValue::Bool(jig)) => {
                if jig && device.state.device_variant.needs_smpl_workaround() {
                    device.port.set_flag(field::SMPL_WORKAROUND, false).await?;
                }
            }
            (Property::Scope, PropertyValue::Bool(on)) => {
                device.state.fuel_gauge_mode = on;
            }
            (Property::FuelGaugeReset, PropertyValue::Bool(reset)) => {
                if reset {
                    device.port.write(Reg::FG_RESET, FG_RESET_ASSERT).await?;
                    device.delay.delay_ms(FG_RESET_SETTLE_MS).await;
                    device.port.write(Reg::FG_RESET, FG_RESET_RELEASE).await?;
                    device.delay.delay_ms(FG_RESET_SETTLE_MS).await;
                    info!("fuel gauge reset");
                }
            }
            _ => return Err(Error::Unsupported),
        }
        Ok(())
    }

    async fn set_charging_enabled(
        device: &mut Device<D, Dl, P>,
        mode: ChargeMode,
    ) -> Result<(), D::Error> {
        if device.state.cable_type == CableType::Otg {
            info!("charging control skipped while OTG cable attached");
            return Ok(());
        }
        info!("charging enable {:?}", mode);
        device.state.is_charging = mode == ChargeMode::Charging;
        device.peers.charging_changed(device.state.is_charging);

        if device.state.device_variant.supports_buck_only() && mode == ChargeMode::BuckOff {
            device.buck_off().await
        } else {
            let on = device.state.is_charging;
            device.enable_charger_switch(on).await
        }
    }

    fn generation(&self) -> u32 {
        self.work.lock(|work| work.borrow().generation())
    }

    fn raise(&self, kind: EventKind) {
        if self.work.lock(|work| work.borrow_mut().raise(kind)) {
            self.wake.signal(());
        } else {
            trace!("{:?} already pending", kind);
        }
    }

    fn next_event(&self) -> Option<Event> {
        self.work.lock(|work| work.borrow_mut().take())
    }

    /// AC-OK changed. Schedules a debounced over-voltage check.
    pub fn notify_ac_ok(&self) {
        self.raise(EventKind::AcOk);
    }

    /// Over-voltage interrupt. Schedules an immediate over-voltage check.
    pub fn notify_ovp(&self) {
        self.raise(EventKind::Ovp);
    }

    /// Battery detect interrupt. Schedules a battery presence check.
    pub fn notify_battery_detect(&self) {
        self.raise(EventKind::BatteryDetect);
    }

    /// Handle events forever, one at a time, oldest first.
    ///
    /// `delay` is used for debouncing outside the lock and must not be the device's own delay.
    pub async fn run<W: DelayNs>(&self, mut delay: W) -> ! {
        loop {
            if self.process_next(&mut delay).await.is_err() {
                error!("charger event handling failed");
            }
        }
    }

    /// Wait for the next event and handle it.
    pub async fn process_next<W: DelayNs>(&self, delay: &mut W) -> Result<(), D::Error> {
        let event = loop {
            if let Some(event) = self.next_event() {
                break event;
            }
            self.wake.wait().await;
        };
        trace!("event {:?}", event);
        match event {
            Event::AcOk { generation } => {
                delay.delay_ms(ACOK_DEBOUNCE_MS).await;
                self.ovp_work(generation).await
            }
            Event::Ovp { generation } => self.ovp_work(generation).await,
            Event::BatteryDetect => self.device.lock().await.battery_detect_work().await,
        }
    }

    async fn ovp_work(&self, generation: u32) -> Result<(), D::Error> {
        let mut device = self.device.lock().await;
        if generation != self.generation() {
            debug!("over-voltage check cancelled by suspend");
            return Ok(());
        }
        device.ovp_work().await
    }

    /// Enter suspend. Waits for in-flight work and cancels pending over-voltage checks.
    ///
    /// Work is only cancelled once the suspend register writes have gone through.
    pub async fn suspend(&self) -> Result<(), D::Error> {
        let mut device = self.device.lock().await;

        if device.state.device_variant.has_fg_clock_quirk() {
            if !device.state.is_charging && !device.state.fuel_gauge_mode {
                device.port.set_flag(field::FG_CLOCK_OVERRIDE, true).await?;
                let clock = device
                    .state
                    .fuel_gauge_clock_snapshot
                    .saturating_add(FG_CLOCK_SUSPEND_BOOST);
                device.port.write(Reg::FG_CLOCK, clock).await?;
            }
            let clock = device.port.read(Reg::FG_CLOCK).await?;
            debug!("suspend, fuel gauge clock {}", clock);
        }

        self.work.lock(|work| work.borrow_mut().cancel_ovp_work());
        device.state.suspended = true;
        Ok(())
    }

    /// Leave suspend, running any over-voltage check deferred while suspended.
    pub async fn resume(&self) -> Result<(), D::Error> {
        let mut device = self.device.lock().await;

        if device.state.device_variant.has_fg_clock_quirk() {
            if !device.state.is_charging && !device.state.fuel_gauge_mode {
                device.port.set_flag(field::FG_CLOCK_OVERRIDE, false).await?;
                let clock = device.state.fuel_gauge_clock_snapshot;
                device.port.write(Reg::FG_CLOCK, clock).await?;
            }
            let clock = device.port.read(Reg::FG_CLOCK).await?;
            debug!("resume, fuel gauge clock {}", clock);
        }

        if device.state.pending_ovp_check {
            device.check_ovp().await?;
        }
        device.state.suspended = false;
        Ok(())
    }

    /// Prepare for power-off.
    ///
    /// Disables the manual and bus-port resets so the fuel gauge survives a charger-only boot.
    /// Unless the platform keeps the charger always enabled, the charger is left switched on.
    pub async fn shutdown(&self) -> Result<(), D::Error> {
        let mut device = self.device.lock().await;
        let port = &mut device.port;
        port.set_flag(field::MANUAL_RESET_ENABLE, false).await?;
        port.set_flag(field::PORT_RESET_ENABLE, false).await?;
        info!("{}: shutdown", device.config.charger_name);

        if !device.config.always_enable {
            device.enable_charger_switch(true).await?;
        }
        Ok(())
    }
}

impl<M, D, Dl, P> AcOkSubscriber for Charger<M, D, Dl, P>
where
    M: RawMutex,
    D: I2c,
    Dl: DelayNs,
    P: PowerSupplyPeers,
{
    fn on_ac_ok(&self) {
        self.notify_ac_ok();
    }
}
