//! Checkout validation and totals
//!
//! Pure checks the orchestrator runs against cart lines loaded inside its
//! unit of work: product availability, stock, the single-seller rule, and
//! total computation with price-at-add snapshots.

use crate::error::{Error, Result};
use crate::types::DeliveryAddress;
use rust_decimal::Decimal;
use std::collections::HashSet;
use uuid::Uuid;

/// One cart item joined with its product snapshot.
#[derive(Debug, Clone)]
pub struct CartLine {
    pub product_id: Uuid,
    pub seller_id: Uuid,
    pub product_name: String,
    /// False when the product has been deactivated since it was added
    pub product_active: bool,
    /// None means the product does not track stock
    pub available_quantity: Option<i64>,
    pub quantity: i64,
    /// Price captured when the item entered the cart
    pub price_at_add: Decimal,
}

/// Computed checkout totals.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutTotals {
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub total: Decimal,
    pub item_count: i64,
}

/// Require address, city, and region to be present.
pub fn validate_address(address: &DeliveryAddress) -> Result<()> {
    if address.address.trim().is_empty() {
        return Err(Error::InvalidAddress("address"));
    }
    if address.city.trim().is_empty() {
        return Err(Error::InvalidAddress("city"));
    }
    if address.region.trim().is_empty() {
        return Err(Error::InvalidAddress("region"));
    }
    Ok(())
}

/// Validate availability, stock, and the single-seller rule.
///
/// Returns the single seller id on success. A cart mixing sellers fails
/// with [`Error::MultiSellerCheckout`] before any order row is written;
/// the caller checks out per-seller instead.
pub fn validate_lines(lines: &[CartLine]) -> Result<Uuid> {
    if lines.is_empty() {
        return Err(Error::EmptyCart);
    }

    let mut sellers: HashSet<Uuid> = HashSet::new();

    for line in lines {
        if !line.product_active {
            return Err(Error::ProductUnavailable {
                name: line.product_name.clone(),
            });
        }

        if let Some(available) = line.available_quantity {
            if available < line.quantity {
                return Err(Error::InsufficientStock {
                    name: line.product_name.clone(),
                    available,
                    requested: line.quantity,
                });
            }
        }

        sellers.insert(line.seller_id);
    }

    if sellers.len() > 1 {
        return Err(Error::MultiSellerCheckout {
            sellers: sellers.len(),
        });
    }

    // Non-empty and single-seller at this point
    Ok(*sellers.iter().next().expect("at least one seller"))
}

/// Subtotal from price-at-add snapshots plus the flat delivery fee.
pub fn compute_totals(lines: &[CartLine], delivery_fee: Decimal) -> CheckoutTotals {
    let subtotal = lines
        .iter()
        .fold(Decimal::ZERO, |acc, l| acc + l.price_at_add * Decimal::from(l.quantity));
    let item_count = lines.iter().map(|l| l.quantity).sum();

    CheckoutTotals {
        subtotal,
        delivery_fee,
        total: subtotal + delivery_fee,
        item_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(seller: Uuid, price: i64, qty: i64) -> CartLine {
        CartLine {
            product_id: Uuid::new_v4(),
            seller_id: seller,
            product_name: "Cocoa beans".to_string(),
            product_active: true,
            available_quantity: Some(100),
            quantity: qty,
            price_at_add: Decimal::from(price),
        }
    }

    fn address() -> DeliveryAddress {
        DeliveryAddress {
            address: "12 Market Road".to_string(),
            city: "Douala".to_string(),
            region: "Littoral".to_string(),
            postal_code: String::new(),
            country: "Cameroon".to_string(),
        }
    }

    #[test]
    fn test_address_requires_core_fields() {
        assert!(validate_address(&address()).is_ok());

        let mut a = address();
        a.city = "  ".to_string();
        assert_eq!(validate_address(&a), Err(Error::InvalidAddress("city")));

        let mut a = address();
        a.region = String::new();
        assert_eq!(validate_address(&a), Err(Error::InvalidAddress("region")));
    }

    #[test]
    fn test_empty_cart_rejected() {
        assert_eq!(validate_lines(&[]), Err(Error::EmptyCart));
    }

    #[test]
    fn test_single_seller_enforced() {
        let s1 = Uuid::new_v4();
        let s2 = Uuid::new_v4();
        let lines = vec![line(s1, 1000, 1), line(s2, 2000, 1)];
        assert_eq!(
            validate_lines(&lines),
            Err(Error::MultiSellerCheckout { sellers: 2 })
        );

        let lines = vec![line(s1, 1000, 1), line(s1, 2000, 1)];
        assert_eq!(validate_lines(&lines), Ok(s1));
    }

    #[test]
    fn test_inactive_product_rejected() {
        let mut l = line(Uuid::new_v4(), 1000, 1);
        l.product_active = false;
        let err = validate_lines(&[l]).unwrap_err();
        assert!(matches!(err, Error::ProductUnavailable { .. }));
    }

    #[test]
    fn test_stock_shortfall_reports_quantities() {
        let mut l = line(Uuid::new_v4(), 1000, 5);
        l.available_quantity = Some(3);
        assert_eq!(
            validate_lines(&[l]),
            Err(Error::InsufficientStock {
                name: "Cocoa beans".to_string(),
                available: 3,
                requested: 5,
            })
        );
    }

    #[test]
    fn test_untracked_stock_is_not_checked() {
        let mut l = line(Uuid::new_v4(), 1000, 50);
        l.available_quantity = None;
        assert!(validate_lines(&[l]).is_ok());
    }

    #[test]
    fn test_totals_scenario() {
        // Two items (1000×1, 2000×1) + 2000 delivery fee = 5000
        let seller = Uuid::new_v4();
        let lines = vec![line(seller, 1000, 1), line(seller, 2000, 1)];
        let totals = compute_totals(&lines, Decimal::from(2000));
        assert_eq!(totals.subtotal, Decimal::from(3000));
        assert_eq!(totals.total, Decimal::from(5000));
        assert_eq!(totals.item_count, 2);
    }

    #[test]
    fn test_totals_multiply_quantity() {
        let seller = Uuid::new_v4();
        let lines = vec![line(seller, 1500, 3)];
        let totals = compute_totals(&lines, Decimal::ZERO);
        assert_eq!(totals.subtotal, Decimal::from(4500));
        assert_eq!(totals.item_count, 3);
    }
}
