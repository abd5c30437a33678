#![no_std]
#![warn(missing_docs)]

//! An embedded async driver for the charger block of the Samsung S2MU005 PMIC: 1-cell Li+ switching
//! charger with OTG boost, input current limiting and end-of-charge detection.
//!
//! [`Charger`] serializes every register sequence behind one lock. Interrupt handlers only enqueue
//! events; a task runs [`Charger::run`] to service them.
//!
//! ```ignore
//! static CHARGER: StaticCell<Charger<CriticalSectionRawMutex, I2cDev, Delay, Board>> = StaticCell::new();
//!
//! let charger = CHARGER.init(Charger::probe(i2c, Delay, Board, Config::new(4350)).await?);
//! spawner.must_spawn(charger_worker(charger));
//!
//! charger.set_property(Property::CurrentMax, PropertyValue::MilliAmps(1500)).await?;
//! ```

#[cfg(test)]
extern crate std;

mod fmt;

mod charger;
mod config;
mod device;
mod error;
mod events;
mod health;
mod mode;
mod peers;
mod port;
mod registers;
pub mod regulation;
mod state;

#[cfg(test)]
mod testing;

pub use charger::{Charger, Property, PropertyValue};
pub use config::{Config, DEFAULT_CHARGER_NAME};
pub use error::{Error, Result};
pub use events::{AcOkSubscriber, EventKind, NotifierChain, SubscriptionId, ACOK_DEBOUNCE_MS};
pub use health::classify_status;
pub use peers::PowerSupplyPeers;
pub use port::DEFAULT_ADDRESS;
pub use registers::ChargeState;
pub use regulation::TopoffPath;
pub use state::{
    CableType, ChargeMode, ChargeType, ChargerMode, ChargerState, ChargingStatus, DeviceVariant,
    Health, DEFAULT_TOPOFF_MA, HEALTH_DEBOUNCE_COUNT,
};
