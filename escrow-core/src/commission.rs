//! Commission and fee arithmetic
//!
//! All amounts carry two minor-unit digits. Commission is rounded
//! half-up to that precision; the seller credit is whatever remains, so
//! commission + seller credit always reconstructs the escrow amount.

use rust_decimal::{Decimal, RoundingStrategy};

/// Minor-unit digits for all stored amounts
pub const MINOR_UNIT_DP: u32 = 2;

/// Platform commission for an escrow: `amount × rate / 100`, rounded
/// half-up to [`MINOR_UNIT_DP`].
pub fn commission_amount(amount: Decimal, rate_percent: Decimal) -> Decimal {
    (amount * rate_percent / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(MINOR_UNIT_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Amount credited to the seller (or expert) on release.
pub fn counterparty_credit(amount: Decimal, rate_percent: Decimal) -> Decimal {
    amount - commission_amount(amount, rate_percent)
}

/// Net amount of a transaction after provider and platform fees.
pub fn net_amount(
    amount: Decimal,
    provider_fee: Option<Decimal>,
    platform_fee: Option<Decimal>,
) -> Decimal {
    amount - provider_fee.unwrap_or(Decimal::ZERO) - platform_fee.unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! dec {
        ($lit:literal) => {
            ::rust_decimal::Decimal::from_str_exact(stringify!($lit)).unwrap()
        };
    }

    #[test]
    fn test_marketplace_commission() {
        // A=50000, R=2.5 -> commission 1250, seller credit 48750
        assert_eq!(commission_amount(dec!(50000), dec!(2.5)), dec!(1250));
        assert_eq!(counterparty_credit(dec!(50000), dec!(2.5)), dec!(48750));
    }

    #[test]
    fn test_consultation_commission() {
        // A=100000, R=20.00 -> commission 20000, expert credit 80000
        assert_eq!(commission_amount(dec!(100000), dec!(20.00)), dec!(20000));
        assert_eq!(counterparty_credit(dec!(100000), dec!(20.00)), dec!(80000));
    }

    #[test]
    fn test_round_half_up() {
        // 333.33 × 2.5% = 8.33325 -> 8.33
        assert_eq!(commission_amount(dec!(333.33), dec!(2.5)), dec!(8.33));
        // 100.10 × 2.5% = 2.5025 -> rounds half-up to 2.50
        assert_eq!(commission_amount(dec!(100.10), dec!(2.5)), dec!(2.50));
        // 101.00 × 2.5% = 2.525 -> midpoint rounds away from zero to 2.53
        assert_eq!(commission_amount(dec!(101.00), dec!(2.5)), dec!(2.53));
    }

    #[test]
    fn test_net_amount() {
        assert_eq!(net_amount(dec!(1000), None, None), dec!(1000));
        assert_eq!(
            net_amount(dec!(1000), Some(dec!(15)), Some(dec!(25))),
            dec!(960)
        );
        assert_eq!(net_amount(dec!(1000), Some(dec!(15)), None), dec!(985));
    }
}
