//! In-memory register file and board peers for unit tests.

use std::cell::RefCell;
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{ErrorKind, ErrorType, I2c, Operation};

use crate::config::Config;
use crate::device::Device;
use crate::peers::PowerSupplyPeers;
use crate::port::{RegisterPort, DEFAULT_ADDRESS};
use crate::registers::Reg;
use crate::state::Health;

/// One bus access or delay, in the order it happened.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Access {
    Read(u8),
    Write(u8, u8),
    Delay(u32),
}

struct BusState {
    regs: [u8; 256],
    log: Vec<Access>,
    fail_writes: Option<u8>,
    fail_reads: Option<u8>,
}

/// A charger that remembers what was written. Clones share the same registers and log.
#[derive(Clone)]
pub struct FakeBus(Rc<RefCell<BusState>>);

impl FakeBus {
    pub fn new() -> Self {
        FakeBus(Rc::new(RefCell::new(BusState {
            regs: [0; 256],
            log: Vec::new(),
            fail_writes: None,
            fail_reads: None,
        })))
    }

    /// Set a register without logging an access.
    pub fn set(&self, reg: Reg, val: u8) {
        self.0.borrow_mut().regs[reg.to_u8() as usize] = val;
    }

    pub fn get(&self, reg: Reg) -> u8 {
        self.0.borrow().regs[reg.to_u8() as usize]
    }

    pub fn accesses(&self) -> Vec<Access> {
        self.0.borrow().log.clone()
    }

    pub fn count(&self, access: Access) -> usize {
        self.0.borrow().log.iter().filter(|a| **a == access).count()
    }

    /// Whether any write reached `reg`.
    pub fn wrote_to(&self, reg: u8) -> bool {
        let bus = self.0.borrow();
        bus.log
            .iter()
            .any(|a| matches!(*a, Access::Write(r, _) if r == reg))
    }

    pub fn wrote_anything(&self) -> bool {
        let bus = self.0.borrow();
        bus.log.iter().any(|a| matches!(a, Access::Write(..)))
    }

    pub fn clear_log(&self) {
        self.0.borrow_mut().log.clear();
    }

    pub fn fail_writes_to(&self, reg: Reg) {
        self.0.borrow_mut().fail_writes = Some(reg.to_u8());
    }

    pub fn fail_reads_from(&self, reg: Reg) {
        self.0.borrow_mut().fail_reads = Some(reg.to_u8());
    }

    /// A delay that records into this bus's access log.
    pub fn delay(&self) -> FakeDelay {
        FakeDelay(self.0.clone())
    }
}

impl ErrorType for FakeBus {
    type Error = ErrorKind;
}

impl I2c for FakeBus {
    async fn transaction(
        &mut self,
        _address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut bus = self.0.borrow_mut();
        let mut pointer = 0u8;
        for op in operations {
            match op {
                Operation::Write(buf) => {
                    let Some((&reg, data)) = buf.split_first() else {
                        continue;
                    };
                    pointer = reg;
                    for &val in data {
                        if bus.fail_writes == Some(pointer) {
                            return Err(ErrorKind::Other);
                        }
                        bus.regs[pointer as usize] = val;
                        bus.log.push(Access::Write(pointer, val));
                        pointer = pointer.wrapping_add(1);
                    }
                }
                Operation::Read(buf) => {
                    for byte in buf.iter_mut() {
                        if bus.fail_reads == Some(pointer) {
                            return Err(ErrorKind::Other);
                        }
                        *byte = bus.regs[pointer as usize];
                        bus.log.push(Access::Read(pointer));
                        pointer = pointer.wrapping_add(1);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Logs each delay and yields to the runtime instead of sleeping.
pub struct FakeDelay(Rc<RefCell<BusState>>);

impl FakeDelay {
    async fn record(&mut self, ms: u32) {
        self.0.borrow_mut().log.push(Access::Delay(ms));
        tokio::task::yield_now().await;
    }
}

impl DelayNs for FakeDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.record(ns / 1_000_000).await;
    }

    async fn delay_us(&mut self, us: u32) {
        self.record(us / 1_000).await;
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.record(ms).await;
    }
}

/// A call made into [`FakePeers`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Notification {
    Cable(bool),
    Charging(bool),
    BatteryRemoved,
    Health(Health),
}

#[derive(Default)]
struct PeersState {
    average_current_ma: i32,
    notifications: Vec<Notification>,
}

/// Fuel gauge and battery supplies. Clones share state.
#[derive(Clone, Default)]
pub struct FakePeers(Rc<RefCell<PeersState>>);

impl FakePeers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_average_current_ma(&self, ma: i32) {
        self.0.borrow_mut().average_current_ma = ma;
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.0.borrow().notifications.clone()
    }

    fn push(&self, notification: Notification) {
        self.0.borrow_mut().notifications.push(notification);
    }
}

impl PowerSupplyPeers for FakePeers {
    fn average_current_ma(&mut self) -> i32 {
        self.0.borrow().average_current_ma
    }

    fn cable_changed(&mut self, attached: bool) {
        self.push(Notification::Cable(attached));
    }

    fn charging_changed(&mut self, enabled: bool) {
        self.push(Notification::Charging(enabled));
    }

    fn battery_removed(&mut self) {
        self.push(Notification::BatteryRemoved);
    }

    fn health_changed(&mut self, health: Health) {
        self.push(Notification::Health(health));
    }
}

/// Attach to a fresh register file reporting `revision`, then clear the access log.
pub async fn attach_device(revision: u8) -> (Device<FakeBus, FakeDelay, FakePeers>, FakeBus) {
    let bus = FakeBus::new();
    bus.set(Reg::REVISION, revision);
    let port = RegisterPort::new(bus.clone(), DEFAULT_ADDRESS);
    let device = Device::attach(port, bus.delay(), FakePeers::new(), Config::new(4350))
        .await
        .unwrap();
    bus.clear_log();
    (device, bus)
}
