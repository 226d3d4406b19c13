//! Property-based tests for escrow and ledger invariants
//!
//! - Balance non-negativity: no sequence of guarded operations drives a
//!   wallet balance below zero
//! - Commission correctness: commission + counterparty credit always
//!   reconstructs the escrow amount
//! - Transition table: `apply` accepts exactly the legal edges
//! - Single-seller rule: mixed carts are always rejected

use escrow_core::checkout::{compute_totals, validate_lines, CartLine};
use escrow_core::commission::{commission_amount, counterparty_credit, net_amount};
use escrow_core::ledger::{check_credit, check_debit, WalletSnapshot};
use escrow_core::state::{apply, can_transition};
use escrow_core::types::{EscrowStatus, WalletStatus};
use escrow_core::Error;
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Strategy for amounts in minor units (0.01 .. 1,000,000.00)
fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy for commission rates with two decimal digits (0.00 .. 100.00)
fn rate_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..=10_000).prop_map(|bp| Decimal::new(bp, 2))
}

fn status_strategy() -> impl Strategy<Value = EscrowStatus> {
    prop_oneof![
        Just(EscrowStatus::AwaitingDeposit),
        Just(EscrowStatus::Funded),
        Just(EscrowStatus::Releasing),
        Just(EscrowStatus::Released),
        Just(EscrowStatus::Disputed),
        Just(EscrowStatus::Refunding),
        Just(EscrowStatus::Refunded),
    ]
}

/// A credit (true) or debit (false) of some amount
fn op_strategy() -> impl Strategy<Value = (bool, Decimal)> {
    (any::<bool>(), amount_strategy())
}

fn unlimited_snapshot(balance: Decimal) -> WalletSnapshot {
    WalletSnapshot {
        balance,
        status: WalletStatus::Active,
        single_transaction_limit: Decimal::new(i64::MAX / 4, 2),
        daily_transaction_limit: Decimal::new(i64::MAX / 4, 2),
        debited_today: Decimal::ZERO,
        credited_today: Decimal::ZERO,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Property: the balance never goes negative, and a rejected
    /// operation leaves it unchanged.
    #[test]
    fn prop_balance_never_negative(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let mut balance = Decimal::ZERO;

        for (is_credit, amount) in ops {
            let snapshot = unlimited_snapshot(balance);
            if is_credit {
                if check_credit(&snapshot, amount).is_ok() {
                    balance += amount;
                }
            } else {
                match check_debit(&snapshot, amount) {
                    Ok(()) => balance -= amount,
                    Err(_) => {
                        // rejected: balance untouched
                        prop_assert_eq!(balance, snapshot.balance);
                    }
                }
            }
            prop_assert!(balance >= Decimal::ZERO);
        }
    }

    /// Property: an overdraft attempt is always rejected with the
    /// available/requested pair.
    #[test]
    fn prop_overdraft_always_rejected(
        balance in 0i64..1_000_000,
        extra in 1i64..1_000_000,
    ) {
        let balance = Decimal::new(balance, 2);
        let requested = balance + Decimal::new(extra, 2);
        let snapshot = unlimited_snapshot(balance);

        let err = check_debit(&snapshot, requested).unwrap_err();
        prop_assert_eq!(err, Error::InsufficientFunds { available: balance, requested });
    }

    /// Property: commission is round-half-up of amount × rate / 100, and
    /// the counterparty credit is exactly the remainder.
    #[test]
    fn prop_commission_reconstructs_amount(
        amount in amount_strategy(),
        rate in rate_strategy(),
    ) {
        let commission = commission_amount(amount, rate);
        let credit = counterparty_credit(amount, rate);

        prop_assert_eq!(commission + credit, amount);
        prop_assert!(commission >= Decimal::ZERO);
        prop_assert!(credit <= amount);
        // two minor-unit digits
        prop_assert_eq!(commission, commission.round_dp(2));
    }

    /// Property: commission is monotone in the rate.
    #[test]
    fn prop_commission_monotone_in_rate(
        amount in amount_strategy(),
        rate_a in rate_strategy(),
        rate_b in rate_strategy(),
    ) {
        let (lo, hi) = if rate_a <= rate_b { (rate_a, rate_b) } else { (rate_b, rate_a) };
        prop_assert!(commission_amount(amount, lo) <= commission_amount(amount, hi));
    }

    /// Property: net amount plus fees reconstructs the gross amount.
    #[test]
    fn prop_net_amount_consistent(
        amount in amount_strategy(),
        provider_fee in 0i64..10_000,
        platform_fee in 0i64..10_000,
    ) {
        let provider_fee = Decimal::new(provider_fee, 2);
        let platform_fee = Decimal::new(platform_fee, 2);
        let net = net_amount(amount, Some(provider_fee), Some(platform_fee));
        prop_assert_eq!(net + provider_fee + platform_fee, amount);
    }

    /// Property: `apply` accepts exactly the edges in the transition
    /// table and reports the offending pair otherwise.
    #[test]
    fn prop_transition_table_exhaustive(
        from in status_strategy(),
        to in status_strategy(),
    ) {
        match apply(from, to) {
            Ok(next) => {
                prop_assert!(can_transition(from, to));
                prop_assert_eq!(next, to);
            }
            Err(Error::InvalidTransition { from: f, to: t }) => {
                prop_assert!(!can_transition(from, to));
                prop_assert_eq!((f, t), (from, to));
            }
            Err(other) => prop_assert!(false, "unexpected error {other:?}"),
        }
    }

    /// Property: terminal escrow states accept no transition at all.
    #[test]
    fn prop_terminal_states_closed(to in status_strategy()) {
        prop_assert!(!can_transition(EscrowStatus::Released, to));
        prop_assert!(!can_transition(EscrowStatus::Refunded, to));
    }

    /// Property: carts drawn from two or more sellers always fail the
    /// single-seller rule; single-seller carts pass and total correctly.
    #[test]
    fn prop_single_seller_rule(
        seller_count in 1usize..4,
        line_specs in prop::collection::vec((1i64..100_000, 1i64..10), 1..8),
    ) {
        let sellers: Vec<Uuid> = (0..seller_count).map(|_| Uuid::new_v4()).collect();
        let lines: Vec<CartLine> = line_specs
            .iter()
            .enumerate()
            .map(|(i, (price, qty))| CartLine {
                product_id: Uuid::new_v4(),
                seller_id: sellers[i % sellers.len()],
                product_name: format!("product-{i}"),
                product_active: true,
                available_quantity: Some(*qty),
                quantity: *qty,
                price_at_add: Decimal::from(*price),
            })
            .collect();

        let distinct = lines
            .iter()
            .map(|l| l.seller_id)
            .collect::<std::collections::HashSet<_>>()
            .len();

        match validate_lines(&lines) {
            Ok(seller) => {
                prop_assert_eq!(distinct, 1);
                prop_assert_eq!(seller, lines[0].seller_id);

                let fee = Decimal::from(2000);
                let totals = compute_totals(&lines, fee);
                let expected: Decimal = lines
                    .iter()
                    .map(|l| l.price_at_add * Decimal::from(l.quantity))
                    .sum();
                prop_assert_eq!(totals.subtotal, expected);
                prop_assert_eq!(totals.total, expected + fee);
            }
            Err(Error::MultiSellerCheckout { sellers: n }) => {
                prop_assert!(distinct > 1);
                prop_assert_eq!(n, distinct);
            }
            Err(other) => prop_assert!(false, "unexpected error {other:?}"),
        }
    }
}

#[cfg(test)]
mod scenario_tests {
    use super::*;

    /// An escrow of 100000 at 20.00% releases 80000 to the expert and
    /// 20000 to the platform.
    #[test]
    fn test_consultation_release_split() {
        let amount = Decimal::from(100_000);
        let rate = Decimal::new(2000, 2);
        assert_eq!(commission_amount(amount, rate), Decimal::from(20_000));
        assert_eq!(counterparty_credit(amount, rate), Decimal::from(80_000));
    }

    /// A refund fully reverses the funding transaction's effect on the
    /// buyer wallet.
    #[test]
    fn test_refund_nets_to_zero() {
        let amount = Decimal::from(50_000);
        let mut balance = Decimal::from(60_000);

        let snapshot = unlimited_snapshot(balance);
        check_debit(&snapshot, amount).unwrap();
        balance -= amount;

        let snapshot = unlimited_snapshot(balance);
        check_credit(&snapshot, amount).unwrap();
        balance += amount;

        assert_eq!(balance, Decimal::from(60_000));
    }
}
