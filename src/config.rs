/// Name reported when the board does not give the charger one.
pub const DEFAULT_CHARGER_NAME: &str = "default-charger";

/// Board configuration for a charger instance.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Config {
    /// Battery regulation voltage programmed at attach, in millivolts.
    pub float_voltage_mv: u32,
    /// Name of this power supply.
    pub charger_name: &'static str,
    /// Program both end-of-charge comparators instead of only the first.
    pub eoc_dual_path: bool,
    /// The charger is always enabled by the platform. When false, shutdown forces it on.
    pub always_enable: bool,
}

impl Config {
    /// Create a configuration with the required float voltage and defaults for the rest.
    pub const fn new(float_voltage_mv: u32) -> Self {
        Config {
            float_voltage_mv,
            charger_name: DEFAULT_CHARGER_NAME,
            eoc_dual_path: false,
            always_enable: false,
        }
    }

    /// Set the power supply name.
    pub const fn with_charger_name(mut self, name: &'static str) -> Self {
        self.charger_name = name;
        self
    }

    /// Program both end-of-charge comparators.
    pub const fn with_eoc_dual_path(mut self, enabled: bool) -> Self {
        self.eoc_dual_path = enabled;
        self
    }

    /// Mark the charger as always enabled by the platform.
    pub const fn with_always_enable(mut self, enabled: bool) -> Self {
        self.always_enable = enabled;
        self
    }
}
