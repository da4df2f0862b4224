//! Monetary arithmetic shared by every [`crate::aggregate::Order`] mutation.
//!
//! Values are `rust_decimal::Decimal` with two fractional digits. `total`
//! is recomputed from scratch on every mutation rather than adjusted
//! incrementally, so a bug in one operation can't leave a stale total behind.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

/// Rounds to two fractional digits, half-to-even (banker's rounding).
/// Applied once to the tax figure at the subtotal level — never per item —
/// so repeated per-item rounding can't drift the total away from what a
/// single subtotal-level computation would give.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

/// `tax = round(taxable_base * rate)`, rate expressed as e.g. `0.07` for 7%.
/// `taxable_base` is `items_subtotal - discount`, never per-item.
pub fn calculate_tax(taxable_base: Decimal, rate: Decimal) -> Decimal {
    round_money(taxable_base * rate)
}

/// `ORD` + UTC date (`YYYYMMDD`) + 4 characters drawn from the order id,
/// e.g. `ORD202601150f3a`. The 4 characters are the first 4 hex digits of
/// the id's simple (no-hyphen) form, which keeps the code short while still
/// tying back to a specific order for support lookups.
pub fn generate_order_code(order_id: Uuid, created_at: DateTime<Utc>) -> String {
    let date = created_at.format("%Y%m%d");
    let id_fragment = &order_id.simple().to_string()[..4];
    format!("ORD{date}{id_fragment}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn rounds_half_to_even_at_the_midpoint() {
        // 0.125 is exactly halfway between 0.12 and 0.13; even digit wins.
        assert_eq!(round_money(Decimal::from_str("0.125").unwrap()), Decimal::new(12, 2));
        assert_eq!(round_money(Decimal::from_str("0.135").unwrap()), Decimal::new(14, 2));
    }

    #[test]
    fn tax_is_computed_once_on_the_subtotal_not_per_item() {
        // Two items of 3.33 each (6.66 subtotal) at 7%: single calculation
        // avoids the drift that per-item rounding would introduce.
        let subtotal = Decimal::new(333, 2) + Decimal::new(333, 2);
        let rate = Decimal::from_str("0.07").unwrap();
        let tax = calculate_tax(subtotal, rate);
        assert_eq!(tax, round_money(Decimal::new(666, 2) * rate));
    }

    #[test]
    fn order_code_embeds_date_and_id_fragment() {
        let id = Uuid::parse_str("0f3a1b2c-0000-0000-0000-000000000000").unwrap();
        let created = DateTime::parse_from_rfc3339("2026-01-15T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(generate_order_code(id, created), "ORD202601150f3a");
    }
}
