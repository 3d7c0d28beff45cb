use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
pub type Fixed64 = I32F32;

/// Simulated time and durations. Signed so that causality violations
/// (negative delays) stay representable and can be rejected.
pub type SimTime = Fixed64;

/// Convert an f64 to SimTime. Use only for initialization, never in sim loop.
#[inline]
pub fn f64_to_time(v: f64) -> SimTime {
    SimTime::from_num(v)
}

/// Convert SimTime to f64. Use only for display and statistics.
#[inline]
pub fn time_to_f64(v: SimTime) -> f64 {
    v.to_num::<f64>()
}

/// Whole-unit time value.
#[inline]
pub fn time(units: i32) -> SimTime {
    SimTime::from_num(units)
}

/// Checked addition that returns None when the clock would overflow.
#[inline]
pub fn checked_add_time(a: SimTime, b: SimTime) -> Option<SimTime> {
    a.checked_add(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_basic_arithmetic() {
        let a = f64_to_time(1.5);
        let b = f64_to_time(2.0);
        assert_eq!(time_to_f64(a + b), 3.5);
    }

    #[test]
    fn whole_units() {
        assert_eq!(time(7), f64_to_time(7.0));
        assert!(time(-1) < SimTime::ZERO);
    }

    #[test]
    fn checked_add_overflow() {
        assert!(checked_add_time(SimTime::MAX, time(1)).is_none());
        assert_eq!(checked_add_time(time(3), time(4)), Some(time(7)));
    }

    #[test]
    fn subtraction_is_exact() {
        // 10 - (3 - 0) must leave exactly 7: remaining work is tracked by
        // subtraction across preemptions and must not drift.
        let requested = time(10);
        let planned = SimTime::ZERO + requested;
        let now = f64_to_time(3.0);
        assert_eq!(planned - now, time(7));
    }

    #[test]
    fn ordering() {
        assert!(time(1) < time(2));
        assert!(f64_to_time(0.25) < f64_to_time(0.5));
    }
}
