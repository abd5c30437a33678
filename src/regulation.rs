//! Conversions between engineering units and register codes.
//!
//! Requests outside a parameter's range are clamped, never rejected. All divisions round to the
//! nearest step, halves rounding up.

/// Largest input current limit code (3250 mA).
pub const INPUT_CURRENT_MAX_CODE: u8 = 0x3f;
/// Largest fast-charge current code (2600 mA).
pub const FAST_CHARGE_MAX_CODE: u8 = 0x33;
/// Ceiling for the cool-charging current code (1000 mA).
pub const COOL_CHARGE_MAX_CODE: u8 = 0x13;
/// Largest top-off current code (475 mA).
pub const TOPOFF_MAX_CODE: u8 = 0x0f;
/// Largest float voltage code (4400 mV).
pub const FLOAT_VOLTAGE_MAX_CODE: u8 = 0x32;

/// Which end-of-charge comparator a top-off threshold is written to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum TopoffPath {
    /// First end-of-charge threshold.
    First,
    /// Second end-of-charge threshold, used on dual-path boards.
    Second,
}

fn steps(value: u32, base: u32, step: u32) -> u32 {
    (value - base + step / 2) / step
}

fn clamp_code(steps: u32, max: u8) -> u8 {
    steps.min(max as u32) as u8
}

/// Input current limit code for `ma`. 50 mA steps from 100 mA.
pub fn input_current_code(ma: u32) -> u8 {
    if ma < 100 {
        return 0;
    }
    clamp_code(steps(ma, 100, 50), INPUT_CURRENT_MAX_CODE)
}

/// Input current limit for `code`, in milliamps.
pub fn input_current_ma(code: u8) -> u32 {
    code.min(INPUT_CURRENT_MAX_CODE) as u32 * 50 + 100
}

/// Fast-charge current code for `ma`. Code 1 is 100 mA, 50 mA per step.
pub fn fast_charge_code(ma: u32) -> u8 {
    if ma < 100 {
        return 0;
    }
    clamp_code(steps(ma, 100, 50) + 1, FAST_CHARGE_MAX_CODE)
}

/// Fast-charge current for `code`. Code 0 reads back as 50 mA.
pub fn fast_charge_ma(code: u8) -> u32 {
    (code.min(FAST_CHARGE_MAX_CODE) as u32 * 50 + 100).saturating_sub(50)
}

/// Cool-charging current code that goes with a fast-charge code.
pub fn cool_charge_code(fast_charge_code: u8) -> u8 {
    fast_charge_code.min(COOL_CHARGE_MAX_CODE)
}

/// Top-off current code for `ma`. 25 mA steps from 100 mA.
pub fn topoff_code(ma: u32) -> u8 {
    match ma {
        0..=100 => 0,
        101..=475 => clamp_code(steps(ma, 100, 25), TOPOFF_MAX_CODE),
        _ => TOPOFF_MAX_CODE,
    }
}

/// Top-off current for `code`, in milliamps.
pub fn topoff_ma(code: u8) -> u32 {
    code.min(TOPOFF_MAX_CODE) as u32 * 25 + 100
}

/// Float voltage code for `mv`. 10 mV steps from 3900 mV.
pub fn float_voltage_code(mv: u32) -> u8 {
    match mv {
        0..=3900 => 0,
        3901..=4400 => clamp_code(steps(mv, 3900, 10), FLOAT_VOLTAGE_MAX_CODE),
        _ => FLOAT_VOLTAGE_MAX_CODE,
    }
}

/// Float voltage for `code`, in millivolts.
pub fn float_voltage_mv(code: u8) -> u32 {
    code.min(FLOAT_VOLTAGE_MAX_CODE) as u32 * 10 + 3900
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_current_limit() {
        assert_eq!(input_current_code(0), 0);
        assert_eq!(input_current_code(99), 0);
        assert_eq!(input_current_code(100), 0);
        assert_eq!(input_current_code(150), 1);
        assert_eq!(input_current_code(2000), 38);
        assert_eq!(input_current_code(2600), 0x32);
        assert_eq!(input_current_code(10_000), 0x3f);
        assert_eq!(input_current_ma(38), 2000);
        assert_eq!(input_current_ma(0xff), 3250);
    }

    #[test]
    fn fast_charge_current() {
        assert_eq!(fast_charge_code(50), 0);
        assert_eq!(fast_charge_code(100), 1);
        assert_eq!(fast_charge_code(1700), 33);
        assert_eq!(fast_charge_code(5000), 0x33);
        assert_eq!(fast_charge_ma(33), 1700);
        assert_eq!(fast_charge_ma(0), 50);
    }

    #[test]
    fn cool_charge_current_is_capped_at_one_amp() {
        let half_amp = fast_charge_code(500);
        assert_eq!(cool_charge_code(half_amp), half_amp);
        let capped = cool_charge_code(fast_charge_code(2000));
        assert_eq!(capped, COOL_CHARGE_MAX_CODE);
        assert_eq!(fast_charge_ma(COOL_CHARGE_MAX_CODE), 1000);
    }

    #[test]
    fn topoff_current() {
        assert_eq!(topoff_code(100), 0);
        assert_eq!(topoff_code(101), 0);
        assert_eq!(topoff_code(250), 6);
        assert_eq!(topoff_code(475), 0x0f);
        assert_eq!(topoff_code(600), 0x0f);
        assert_eq!(topoff_ma(6), 250);
    }

    #[test]
    fn float_voltage() {
        assert_eq!(float_voltage_code(3500), 0);
        assert_eq!(float_voltage_code(4350), 45);
        assert_eq!(float_voltage_code(4355), 46);
        assert_eq!(float_voltage_code(4400), 0x32);
        assert_eq!(float_voltage_code(4500), 0x32);
        assert_eq!(float_voltage_mv(45), 4350);
    }

    #[test]
    fn decode_of_encode_is_within_one_step() {
        for ma in 100..=3250 {
            let back = input_current_ma(input_current_code(ma));
            assert!(back.abs_diff(ma) <= 50, "input {} -> {}", ma, back);
        }
        for ma in 100..=2600 {
            let back = fast_charge_ma(fast_charge_code(ma));
            assert!(back.abs_diff(ma) <= 50, "fast {} -> {}", ma, back);
        }
        for ma in 100..=475 {
            let back = topoff_ma(topoff_code(ma));
            assert!(back.abs_diff(ma) <= 25, "topoff {} -> {}", ma, back);
        }
        for mv in 3900..=4400 {
            let back = float_voltage_mv(float_voltage_code(mv));
            assert!(back.abs_diff(mv) <= 10, "float {} -> {}", mv, back);
        }
    }

    #[test]
    fn encoders_are_monotonic() {
        let encoders: [fn(u32) -> u8; 4] = [
            input_current_code,
            fast_charge_code,
            topoff_code,
            float_voltage_code,
        ];
        for encode in encoders {
            let mut last = 0;
            for value in 0..6000 {
                let code = encode(value);
                assert!(code >= last, "code dropped at {}", value);
                last = code;
            }
        }
    }
}
