//! Currency helpers: minor-unit rounding and lot-step arithmetic.

/// Number of decimal digits in a currency's minor unit.
///
/// Currencies quoted without a fractional unit use 0; everything else uses 2.
pub fn minor_unit_digits(currency: &str) -> u32 {
    match currency.to_ascii_uppercase().as_str() {
        "JPY" | "KRW" | "CLP" | "ISK" | "VND" | "HUF" => 0,
        _ => 2,
    }
}

/// Round `value` to `digits` decimal places (half away from zero).
pub fn round_to(value: f64, digits: u32) -> f64 {
    let scale = 10f64.powi(digits as i32);
    (value * scale).round() / scale
}

/// Round an amount to the minor unit of `currency`.
pub fn round_money(value: f64, currency: &str) -> f64 {
    round_to(value, minor_unit_digits(currency))
}

/// Floor `value` to a multiple of `step`, tolerating representation error
/// (0.29 / 0.01 is 28.999999999999996).
pub fn floor_to_step(value: f64, step: f64) -> f64 {
    if step <= 0.0 {
        return value;
    }
    let steps = (value / step + 1e-9).floor();
    round_to(steps * step, step_digits(step))
}

/// Decimal places needed to represent `step` exactly (0.01 → 2).
fn step_digits(step: f64) -> u32 {
    let mut digits = 0;
    let mut scaled = step;
    while digits < 10 && (scaled - scaled.round()).abs() > 1e-9 {
        scaled *= 10.0;
        digits += 1;
    }
    digits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minor_units() {
        assert_eq!(minor_unit_digits("USD"), 2);
        assert_eq!(minor_unit_digits("jpy"), 0);
    }

    #[test]
    fn money_rounding() {
        assert_eq!(round_money(12.000000000000002, "USD"), 12.0);
        assert_eq!(round_money(1234.5, "JPY"), 1235.0);
        assert_eq!(round_to(-0.125, 2), -0.13);
    }

    #[test]
    fn floor_to_lot_step() {
        assert_eq!(floor_to_step(0.29, 0.01), 0.29);
        assert_eq!(floor_to_step(1.2345, 0.01), 1.23);
        assert_eq!(floor_to_step(7.0, 0.5), 7.0);
        assert_eq!(floor_to_step(7.4, 0.5), 7.0);
    }
}
