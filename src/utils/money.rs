/// Money helpers.
///
/// Amounts are `BigDecimal` normalised to two decimal places (half-up) before
/// they are stored, so ledger sums never drift below the minor unit.
use std::str::FromStr;

use bigdecimal::{BigDecimal, RoundingMode, Zero};
use num_traits::ToPrimitive;

pub const MINOR_UNIT_SCALE: i64 = 2;

pub fn round2(value: &BigDecimal) -> BigDecimal {
    value.with_scale_round(MINOR_UNIT_SCALE, RoundingMode::HalfUp)
}

/// Parse a client-supplied float into a two-place amount.
pub fn amount_from_f64(value: f64) -> Result<BigDecimal, String> {
    if !value.is_finite() {
        return Err("Amount must be a finite number".to_string());
    }
    if value < 0.0 {
        return Err("Amount cannot be negative".to_string());
    }
    BigDecimal::from_str(&value.to_string())
        .map(|parsed| round2(&parsed))
        .map_err(|_| "Invalid amount format".to_string())
}

pub fn rate_from_f64(rate: f64) -> Result<BigDecimal, String> {
    if !rate.is_finite() {
        return Err("Rate must be a finite number".to_string());
    }
    BigDecimal::from_str(&rate.to_string()).map_err(|_| "Invalid rate format".to_string())
}

/// Splits `amount` into (platform_fee, freelancer_amount). The fee is rounded
/// and the payout takes the remainder, so the two always sum to `amount`.
pub fn split_commission(amount: &BigDecimal, rate: &BigDecimal) -> (BigDecimal, BigDecimal) {
    let amount = round2(amount);
    let fee = round2(&(&amount * rate));
    let payout = &amount - &fee;
    (fee, payout)
}

pub fn to_f64_or_zero(value: &BigDecimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

pub fn sum<'a>(values: impl IntoIterator<Item = &'a BigDecimal>) -> BigDecimal {
    values
        .into_iter()
        .fold(BigDecimal::zero(), |acc, value| acc + value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn test_round2_half_up() {
        assert_eq!(round2(&dec("3.335")), dec("3.34"));
        assert_eq!(round2(&dec("3.334")), dec("3.33"));
        assert_eq!(round2(&dec("10")), dec("10.00"));
    }

    #[test]
    fn test_amount_from_f64() {
        assert_eq!(amount_from_f64(250.0), Ok(dec("250.00")));
        assert_eq!(amount_from_f64(19.999), Ok(dec("20.00")));
        assert!(amount_from_f64(-1.0).is_err());
        assert!(amount_from_f64(f64::NAN).is_err());
    }

    #[test]
    fn test_split_commission_ten_percent() {
        let (fee, payout) = split_commission(&dec("100"), &dec("0.10"));
        assert_eq!(fee, dec("10.00"));
        assert_eq!(payout, dec("90.00"));
    }

    #[test]
    fn test_split_commission_never_drifts() {
        for raw in ["33.33", "0.05", "199.99", "1234.57", "0.01"] {
            let amount = dec(raw);
            let (fee, payout) = split_commission(&amount, &dec("0.10"));
            assert_eq!(&fee + &payout, amount);
        }
    }

    #[test]
    fn test_sum() {
        let values = vec![dec("1.10"), dec("2.20"), dec("3.30")];
        assert_eq!(sum(&values), dec("6.60"));
    }
}
