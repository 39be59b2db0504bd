use fixed::types::I32F32;

/// Q32.32 fixed-point: used for item value, money and every statistic so
/// runs are bit-identical across platforms.
pub type Fixed64 = I32F32;

/// Ticks are the atomic unit of simulation time.
pub type Ticks = u64;

/// Convert an f64 to Fixed64. Use only for initialization, never in sim loop.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::saturating_from_num(v)
}

/// Convert Fixed64 to f64. Use only for display and for handing values to
/// the optimizer.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Convert a count to Fixed64, saturating at the representable maximum.
#[inline]
pub fn count_to_fixed64(count: u64) -> Fixed64 {
    Fixed64::saturating_from_num(count)
}

/// Checked division: `None` on a zero divisor or overflow.
///
/// Every statistic with a possibly empty denominator goes through here, so
/// "no data" surfaces as `None` rather than a panic.
#[inline]
pub fn checked_div_64(a: Fixed64, b: Fixed64) -> Option<Fixed64> {
    a.checked_div(b)
}
