use rust_decimal::{Decimal, RoundingStrategy};

/// Tolerance for monetary comparisons (0.01).
pub const MONEY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Largest amount a `NUMERIC(14, 2)` column holds (999 999 999 999.99).
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(276_447_231, 23_283, 0, false, 2);

const DECIMAL_PLACES: u32 = 2;

/// True when `value` has no fraction of a cent.
pub fn is_whole_cents(value: Decimal) -> bool {
    value.round_dp(DECIMAL_PLACES) == value
}

/// Round to cents, half away from zero.
pub fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// `quantity × unit_price`, rounded to cents.
pub fn line_amount(quantity: i32, unit_price: Decimal) -> Decimal {
    round_cents(Decimal::from(quantity) * unit_price)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_cents() {
        assert_eq!(round_cents(Decimal::new(12345, 3)), Decimal::new(1235, 2));
        assert_eq!(round_cents(Decimal::new(-12345, 3)), Decimal::new(-1235, 2));
        assert_eq!(round_cents(Decimal::new(10, 0)), Decimal::new(1000, 2));
    }

    #[test]
    fn test_max_amount_and_whole_cents() {
        assert_eq!(MAX_AMOUNT.to_string(), "999999999999.99");
        assert!(is_whole_cents(Decimal::new(120, 2)));
        assert!(is_whole_cents(Decimal::new(12, 1)));
        assert!(!is_whole_cents(Decimal::new(1205, 3)));
    }

    #[test]
    fn test_line_amount() {
        assert_eq!(line_amount(3, Decimal::new(1999, 2)), Decimal::new(5997, 2));
        assert_eq!(line_amount(0, Decimal::new(1999, 2)), Decimal::ZERO);
    }
}
