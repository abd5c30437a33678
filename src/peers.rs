use crate::state::Health;

/// The battery and fuel-gauge supplies the charger cooperates with.
///
/// Every method has a do-nothing default, so boards only implement what they wire up. Methods are
/// called with the charger lock held and must not call back into the charger.
pub trait PowerSupplyPeers {
    /// Average battery current from the fuel gauge, in milliamps.
    fn average_current_ma(&mut self) -> i32 {
        0
    }

    /// The fuel gauge is in its special measurement mode.
    fn fuel_gauge_mode(&mut self) -> bool {
        false
    }

    /// A charging source was attached (`true`) or removed (`false`).
    fn cable_changed(&mut self, _attached: bool) {}

    /// Charging was enabled or disabled.
    fn charging_changed(&mut self, _enabled: bool) {}

    /// The battery was pulled while the charger was running.
    fn battery_removed(&mut self) {}

    /// Input health changed outside a health query, on an over-voltage edge.
    fn health_changed(&mut self, _health: Health) {}
}

impl PowerSupplyPeers for () {}
