//! The order aggregate: its shape, the legal state transitions over it,
//! and the mutating operations that keep `total` in sync with its items.
//!
//! Every mutation either succeeds and returns the [`event_schema::DomainEvent`]s
//! it produced (for the caller to append to the outbox in the same
//! transaction as the row update) or fails with a typed [`OrderError`] and
//! leaves the aggregate untouched. No operation here talks to a database;
//! persistence is the repository's job.

use chrono::{DateTime, Utc};
use event_schema::domain::{
    EventOrderItem, OrderCancelled, OrderConfirmed, OrderCreated, OrderStatusChanged, StockOverrideApplied,
};
use event_schema::DomainEvent;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{OrderError, OrderResult};
use crate::money::{calculate_tax, generate_order_code, round_money};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }

    /// Generic status transition table. `cancel` has its own, broader rule (any
    /// non-terminal state except `delivered`) checked separately in
    /// [`Order::cancel`].
    fn can_transition_to(&self, to: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, to),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Processing)
                | (Confirmed, Cancelled)
                | (Processing, Shipped)
                | (Processing, Cancelled)
                | (Shipped, Delivered)
                | (Delivered, Refunded)
        )
    }

    fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Refunded)
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "refunded" => Ok(OrderStatus::Refunded),
            other => Err(OrderError::InvalidStatusTransition {
                from: other.to_string(),
                to: "<unknown>".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaidStatus {
    Unpaid,
    PartialPaid,
    Paid,
    Refunded,
}

impl PaidStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaidStatus::Unpaid => "unpaid",
            PaidStatus::PartialPaid => "partial_paid",
            PaidStatus::Paid => "paid",
            PaidStatus::Refunded => "refunded",
        }
    }

    fn can_transition_to(&self, to: PaidStatus) -> bool {
        use PaidStatus::*;
        matches!(
            (self, to),
            (Unpaid, PartialPaid)
                | (Unpaid, Paid)
                | (PartialPaid, Paid)
                | (PartialPaid, Refunded)
                | (Paid, Refunded)
        )
    }
}

impl std::str::FromStr for PaidStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unpaid" => Ok(PaidStatus::Unpaid),
            "partial_paid" => Ok(PaidStatus::PartialPaid),
            "paid" => Ok(PaidStatus::Paid),
            "refunded" => Ok(PaidStatus::Refunded),
            other => Err(OrderError::InvalidPaidStatusTransition {
                from: other.to_string(),
                to: "<unknown>".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub is_override: bool,
    pub override_reason: Option<String>,
}

impl OrderItem {
    pub fn new(product_id: impl Into<String>, quantity: i64, unit_price: Decimal) -> OrderResult<Self> {
        if quantity <= 0 {
            return Err(OrderError::InvalidQuantity(quantity));
        }
        if unit_price < Decimal::ZERO {
            return Err(OrderError::NegativeMonetaryField {
                field: "unit_price",
                value: unit_price.to_string(),
            });
        }
        let total_price = round_money(unit_price * Decimal::from(quantity));
        Ok(Self {
            product_id: product_id.into(),
            quantity,
            unit_price,
            total_price,
            is_override: false,
            override_reason: None,
        })
    }

    fn to_event_item(&self) -> EventOrderItem {
        EventOrderItem {
            product_id: self.product_id.clone(),
            quantity: self.quantity.max(0) as u32,
            unit_price: self.unit_price,
            total_price: self.total_price,
            is_override: self.is_override,
            override_reason: self.override_reason.clone(),
        }
    }
}

/// One override requested by a manager/admin at confirm time: identifies the
/// item by `product_id` and carries the mandatory reason.
#[derive(Debug, Clone)]
pub struct StockOverrideRequest {
    pub product_id: String,
    pub reason: String,
}

/// Role claim presented by the caller of `confirm_with_stock_override`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorRole {
    Employee,
    Manager,
    Admin,
}

impl ActorRole {
    fn is_authorized_for_override(&self) -> bool {
        matches!(self, ActorRole::Manager | ActorRole::Admin)
    }
}

impl std::str::FromStr for ActorRole {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "employee" => Ok(ActorRole::Employee),
            "manager" => Ok(ActorRole::Manager),
            "admin" => Ok(ActorRole::Admin),
            other => Err(OrderError::UnauthorizedStockOverride(other.to_string())),
        }
    }
}

/// The order aggregate. `total` is a derived field: every public mutation
/// recomputes it from `items`, `discount`, `shipping_fee`, `tax` before
/// returning. Callers never set `total` directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub code: Option<String>,
    pub customer_id: Option<String>,
    pub source: String,
    pub items: Vec<OrderItem>,

    pub items_subtotal: Decimal,
    pub discount: Decimal,
    pub shipping_fee: Decimal,
    pub tax: Decimal,
    pub tax_enabled: bool,
    pub total: Decimal,

    pub status: OrderStatus,
    pub paid_status: PaidStatus,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_reason: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// `create` — the only constructor. Emits `OrderCreated`.
    pub fn create(
        customer_id: Option<String>,
        source: impl Into<String>,
        items: Vec<OrderItem>,
        now: DateTime<Utc>,
    ) -> OrderResult<(Self, DomainEvent)> {
        if items.is_empty() {
            return Err(OrderError::EmptyOrder);
        }

        let id = Uuid::new_v4();
        let mut order = Order {
            id,
            code: Some(generate_order_code(id, now)),
            customer_id,
            source: source.into(),
            items,
            items_subtotal: Decimal::ZERO,
            discount: Decimal::ZERO,
            shipping_fee: Decimal::ZERO,
            tax: Decimal::ZERO,
            tax_enabled: false,
            total: Decimal::ZERO,
            status: OrderStatus::Pending,
            paid_status: PaidStatus::Unpaid,
            confirmed_at: None,
            cancelled_at: None,
            cancelled_reason: None,
            created_at: now,
            updated_at: now,
        };
        order.recompute_total()?;

        let event = DomainEvent::OrderCreated(OrderCreated {
            order_id: order.id.to_string(),
            code: order.code.clone().unwrap_or_default(),
            customer_id: order.customer_id.clone(),
            items: order.items.iter().map(OrderItem::to_event_item).collect(),
            total: order.total,
        });

        Ok((order, event))
    }

    /// Recomputes `total`: `Σ items.total_price - discount +
    /// shipping_fee + tax`. Called by every mutator after it changes an
    /// input; never called with stale inputs left in place.
    fn recompute_total(&mut self) -> OrderResult<()> {
        self.require_non_negative("discount", self.discount)?;
        self.require_non_negative("shipping_fee", self.shipping_fee)?;
        self.require_non_negative("tax", self.tax)?;

        self.items_subtotal = round_money(
            self.items
                .iter()
                .fold(Decimal::ZERO, |acc, item| acc + item.total_price),
        );
        self.total =
            round_money(self.items_subtotal - self.discount + self.shipping_fee + self.tax);
        Ok(())
    }

    fn require_non_negative(&self, field: &'static str, value: Decimal) -> OrderResult<()> {
        if value < Decimal::ZERO {
            return Err(OrderError::NegativeMonetaryField {
                field,
                value: value.to_string(),
            });
        }
        Ok(())
    }

    fn require_pending(&self, operation: &'static str) -> OrderResult<()> {
        if self.status != OrderStatus::Pending {
            return Err(OrderError::NotPending {
                operation,
                status: self.status.as_str().to_string(),
            });
        }
        Ok(())
    }

    pub fn add_item(&mut self, item: OrderItem, now: DateTime<Utc>) -> OrderResult<()> {
        self.require_pending("add_item")?;
        self.items.push(item);
        self.recompute_total()?;
        self.updated_at = now;
        Ok(())
    }

    pub fn apply_discount(&mut self, discount: Decimal, now: DateTime<Utc>) -> OrderResult<()> {
        self.require_pending("apply_discount")?;
        self.discount = discount;
        self.recompute_total()?;
        self.updated_at = now;
        Ok(())
    }

    pub fn set_shipping_fee(&mut self, shipping_fee: Decimal, now: DateTime<Utc>) -> OrderResult<()> {
        self.require_pending("set_shipping_fee")?;
        self.shipping_fee = shipping_fee;
        self.recompute_total()?;
        self.updated_at = now;
        Ok(())
    }

    /// Taxable base is `items_subtotal - discount`, rounded once at the
    /// subtotal level, never per item.
    pub fn calculate_tax(&mut self, rate: Decimal, now: DateTime<Utc>) -> OrderResult<()> {
        self.require_pending("calculate_tax")?;
        let taxable_base = self.items_subtotal - self.discount;
        self.tax = calculate_tax(taxable_base, rate);
        self.tax_enabled = true;
        self.recompute_total()?;
        self.updated_at = now;
        Ok(())
    }

    fn transition_status(&mut self, to: OrderStatus) -> OrderResult<()> {
        if !self.status.can_transition_to(to) {
            return Err(OrderError::InvalidStatusTransition {
                from: self.status.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }
        self.status = to;
        Ok(())
    }

    /// `pending -> confirmed`. Emits `OrderConfirmed`.
    pub fn confirm(&mut self, now: DateTime<Utc>) -> OrderResult<DomainEvent> {
        self.transition_status(OrderStatus::Confirmed)?;
        self.confirmed_at = Some(now);
        self.updated_at = now;

        Ok(DomainEvent::OrderConfirmed(OrderConfirmed {
            order_id: self.id.to_string(),
            confirmed_at: now,
        }))
    }

    /// `confirm_with_stock_override` — `pending -> confirmed`, authorizing a
    /// set of per-item stock overrides. Emits `OrderConfirmed` then
    /// `StockOverrideApplied`, in that order, both against this aggregate's
    /// `aggregate_id` so a consumer can apply them in sequence.
    ///
    /// Fails closed: an unauthorized role, an unknown product_id, or a
    /// missing reason leaves the order entirely untouched (no partial
    /// override, no status change) and returns before constructing any
    /// event.
    pub fn confirm_with_stock_override(
        &mut self,
        actor_id: impl Into<String>,
        actor_role: ActorRole,
        overrides: Vec<StockOverrideRequest>,
        now: DateTime<Utc>,
    ) -> OrderResult<(DomainEvent, DomainEvent)> {
        if !actor_role.is_authorized_for_override() {
            return Err(OrderError::UnauthorizedStockOverride(format!("{actor_role:?}").to_lowercase()));
        }

        // Validate the whole batch before mutating anything: every
        // override must name an existing item and carry a reason.
        for ov in &overrides {
            if ov.reason.trim().is_empty() {
                return Err(OrderError::MissingOverrideReason(ov.product_id.clone()));
            }
            if !self.items.iter().any(|i| i.product_id == ov.product_id) {
                return Err(OrderError::UnknownOverrideProduct(ov.product_id.clone()));
            }
        }

        // Legality of the status transition itself is still governed by
        // the normal table; an override doesn't bypass it.
        if !self.status.can_transition_to(OrderStatus::Confirmed) {
            return Err(OrderError::InvalidStatusTransition {
                from: self.status.as_str().to_string(),
                to: OrderStatus::Confirmed.as_str().to_string(),
            });
        }

        for ov in &overrides {
            if let Some(item) = self.items.iter_mut().find(|i| i.product_id == ov.product_id) {
                item.is_override = true;
                item.override_reason = Some(ov.reason.clone());
            }
        }

        self.status = OrderStatus::Confirmed;
        self.confirmed_at = Some(now);
        self.updated_at = now;

        let actor_id = actor_id.into();
        let confirmed = DomainEvent::OrderConfirmed(OrderConfirmed {
            order_id: self.id.to_string(),
            confirmed_at: now,
        });
        let overridden_items: Vec<EventOrderItem> = overrides
            .iter()
            .filter_map(|ov| self.items.iter().find(|i| i.product_id == ov.product_id))
            .map(OrderItem::to_event_item)
            .collect();
        let override_applied = DomainEvent::StockOverrideApplied(StockOverrideApplied {
            order_id: self.id.to_string(),
            actor_id,
            items: overridden_items,
        });

        Ok((confirmed, override_applied))
    }

    /// `cancel` — allowed from any non-terminal state except `delivered`.
    /// Resets `paid_status` to `unpaid`. Emits `OrderCancelled`.
    pub fn cancel(&mut self, reason: impl Into<String>, now: DateTime<Utc>) -> OrderResult<DomainEvent> {
        if self.status.is_terminal() || self.status == OrderStatus::Delivered {
            return Err(OrderError::InvalidStatusTransition {
                from: self.status.as_str().to_string(),
                to: OrderStatus::Cancelled.as_str().to_string(),
            });
        }

        let reason = reason.into();
        self.status = OrderStatus::Cancelled;
        self.paid_status = PaidStatus::Unpaid;
        self.cancelled_at = Some(now);
        self.cancelled_reason = Some(reason.clone());
        self.updated_at = now;

        Ok(DomainEvent::OrderCancelled(OrderCancelled {
            order_id: self.id.to_string(),
            reason,
            cancelled_at: now,
        }))
    }

    /// Generic status advance backing `PATCH /orders/{id}/status` for the
    /// transitions that have no dedicated business operation (`confirmed ->
    /// processing`, `processing -> shipped`, `shipped -> delivered`).
    /// `confirm` and `cancel` remain the named operations for their
    /// transitions; this exists only for the remainder of the transition
    /// table. Emits `OrderStatusChanged`.
    pub fn advance_status(&mut self, to: OrderStatus, now: DateTime<Utc>) -> OrderResult<DomainEvent> {
        let from = self.status;
        self.transition_status(to)?;
        self.updated_at = now;

        Ok(DomainEvent::OrderStatusChanged(OrderStatusChanged {
            order_id: self.id.to_string(),
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        }))
    }

    /// `update_paid_status` — guarded by the paid-status transition table.
    /// Does not itself emit an event; it's folded into whichever caller
    /// (e.g. the payment webhook pipeline) already emits `PaymentCompleted`.
    pub fn update_paid_status(&mut self, new_status: PaidStatus, now: DateTime<Utc>) -> OrderResult<()> {
        if !self.paid_status.can_transition_to(new_status) {
            return Err(OrderError::InvalidPaidStatusTransition {
                from: self.paid_status.as_str().to_string(),
                to: new_status.as_str().to_string(),
            });
        }
        self.paid_status = new_status;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn sample_order() -> Order {
        let item = OrderItem::new("P1", 2, Decimal::new(1000, 2)).unwrap();
        let (order, _event) = Order::create(None, "web", vec![item], now()).unwrap();
        order
    }

    #[test]
    fn create_confirm_cancel_scenario() {
        let item = OrderItem::new("P", 2, Decimal::new(1000, 2)).unwrap();
        let (mut order, event) = Order::create(None, "web", vec![item], now()).unwrap();
        assert_eq!(order.total, Decimal::new(2000, 2));
        assert!(matches!(event, DomainEvent::OrderCreated(_)));

        let confirm_event = order.confirm(now()).unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert!(matches!(confirm_event, DomainEvent::OrderConfirmed(_)));

        let cancel_event = order.cancel("customer request", now()).unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.paid_status, PaidStatus::Unpaid);
        assert!(matches!(cancel_event, DomainEvent::OrderCancelled(_)));
    }

    #[test]
    fn stock_override_by_employee_is_rejected_and_order_is_unchanged() {
        let mut order = sample_order();
        let before = order.clone();
        let overrides = vec![StockOverrideRequest {
            product_id: "P1".to_string(),
            reason: "damaged box".to_string(),
        }];

        let err = order
            .confirm_with_stock_override("emp-1", ActorRole::Employee, overrides, now())
            .unwrap_err();

        assert!(matches!(err, OrderError::UnauthorizedStockOverride(_)));
        assert_eq!(order.status, before.status);
        assert_eq!(order.items, before.items);
    }

    #[test]
    fn stock_override_by_manager_succeeds_and_emits_both_events_in_order() {
        let mut order = sample_order();
        let overrides = vec![StockOverrideRequest {
            product_id: "P1".to_string(),
            reason: "damaged box".to_string(),
        }];

        let (confirmed, applied) = order
            .confirm_with_stock_override("mgr-1", ActorRole::Manager, overrides, now())
            .unwrap();

        assert_eq!(order.status, OrderStatus::Confirmed);
        assert!(order.items[0].is_override);
        assert_eq!(order.items[0].override_reason.as_deref(), Some("damaged box"));
        assert!(matches!(confirmed, DomainEvent::OrderConfirmed(_)));
        assert!(matches!(applied, DomainEvent::StockOverrideApplied(_)));
    }

    #[test]
    fn stock_override_rejects_unknown_product_and_leaves_order_untouched() {
        let mut order = sample_order();
        let before = order.clone();
        let overrides = vec![StockOverrideRequest {
            product_id: "NOT-IN-ORDER".to_string(),
            reason: "n/a".to_string(),
        }];

        let err = order
            .confirm_with_stock_override("mgr-1", ActorRole::Manager, overrides, now())
            .unwrap_err();

        assert!(matches!(err, OrderError::UnknownOverrideProduct(_)));
        assert_eq!(order.status, before.status);
    }

    #[test]
    fn stock_override_rejects_empty_reason() {
        let mut order = sample_order();
        let overrides = vec![StockOverrideRequest {
            product_id: "P1".to_string(),
            reason: "   ".to_string(),
        }];

        let err = order
            .confirm_with_stock_override("mgr-1", ActorRole::Manager, overrides, now())
            .unwrap_err();
        assert!(matches!(err, OrderError::MissingOverrideReason(_)));
    }

    #[test]
    fn total_reflects_discount_shipping_and_tax() {
        let mut order = sample_order();
        order.apply_discount(Decimal::new(200, 2), now()).unwrap();
        order.set_shipping_fee(Decimal::new(500, 2), now()).unwrap();
        order.calculate_tax(Decimal::new(7, 2), now()).unwrap();

        let expected_tax = calculate_tax(order.items_subtotal - order.discount, Decimal::new(7, 2));
        let expected_total = order.items_subtotal - order.discount + order.shipping_fee + expected_tax;
        assert_eq!(order.total, expected_total);
    }

    #[test]
    fn mutations_are_rejected_once_order_is_no_longer_pending() {
        let mut order = sample_order();
        order.confirm(now()).unwrap();

        let err = order.apply_discount(Decimal::new(100, 2), now()).unwrap_err();
        assert!(matches!(err, OrderError::NotPending { .. }));
    }

    #[test]
    fn cancel_is_disallowed_from_delivered() {
        let mut order = sample_order();
        order.status = OrderStatus::Delivered;
        let err = order.cancel("too late", now()).unwrap_err();
        assert!(matches!(err, OrderError::InvalidStatusTransition { .. }));
    }

    #[test]
    fn paid_status_transition_table_is_enforced() {
        let mut order = sample_order();
        order.update_paid_status(PaidStatus::Paid, now()).unwrap();
        assert_eq!(order.paid_status, PaidStatus::Paid);

        let err = order.update_paid_status(PaidStatus::Unpaid, now()).unwrap_err();
        assert!(matches!(err, OrderError::InvalidPaidStatusTransition { .. }));
    }

    #[test]
    fn status_round_trips_through_string_form() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
            OrderStatus::Refunded,
        ] {
            assert_eq!(OrderStatus::from_str(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn item_rejects_zero_quantity() {
        let err = OrderItem::new("P1", 0, Decimal::new(100, 2)).unwrap_err();
        assert!(matches!(err, OrderError::InvalidQuantity(0)));
    }

    #[test]
    fn advance_status_walks_confirmed_through_to_delivered() {
        let mut order = sample_order();
        order.confirm(now()).unwrap();

        let event = order.advance_status(OrderStatus::Processing, now()).unwrap();
        assert_eq!(order.status, OrderStatus::Processing);
        assert!(matches!(event, DomainEvent::OrderStatusChanged(_)));

        order.advance_status(OrderStatus::Shipped, now()).unwrap();
        order.advance_status(OrderStatus::Delivered, now()).unwrap();
        assert_eq!(order.status, OrderStatus::Delivered);
    }

    #[test]
    fn advance_status_rejects_illegal_skip() {
        let mut order = sample_order();
        let err = order.advance_status(OrderStatus::Shipped, now()).unwrap_err();
        assert!(matches!(err, OrderError::InvalidStatusTransition { .. }));
    }
}
