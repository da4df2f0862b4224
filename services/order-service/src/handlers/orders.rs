//! HTTP handlers for the order aggregate.
//!
//! Every handler follows the same shape: load or construct the aggregate,
//! call the mutating operation that returns its `DomainEvent`(s), then hand
//! both to `OrderRepository::save` so the row update and the outbox append
//! commit in one transaction. The in-memory mutation never touches SQL
//! directly.

use std::str::FromStr;

use actix_web::{web, HttpResponse};
use chrono::Utc;
use order_domain::{ActorRole, Order, OrderError, OrderItem, OrderRepository, OrderStatus, StockOverrideRequest};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateOrderItemRequest {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: Option<String>,
    #[serde(default = "default_source")]
    pub source: String,
    pub items: Vec<CreateOrderItemRequest>,
}

fn default_source() -> String {
    "web".to_string()
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    #[serde(flatten)]
    pub order: Order,
}

pub async fn create_order(
    state: web::Data<AppState>,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let items = body
        .items
        .iter()
        .map(|i| OrderItem::new(i.product_id.clone(), i.quantity, i.unit_price))
        .collect::<Result<Vec<_>, _>>()?;

    let now = Utc::now();
    let (order, event) = Order::create(body.customer_id.clone(), body.source.clone(), items, now)?;

    state.repository.save(&order, &[event]).await?;
    state.outbox_wake.notify_one();

    Ok(HttpResponse::Created().json(OrderResponse { order }))
}

pub async fn get_order(state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let order = state
        .repository
        .find_by_id(id)
        .await?
        .ok_or(OrderError::NotFound(id))?;

    Ok(HttpResponse::Ok().json(OrderResponse { order }))
}

/// `POST /orders/{id}/confirm` — the plain confirm path (no stock
/// override). Dedicated route for the named aggregate operation, distinct
/// from the generic `PATCH /orders/{id}/status`.
pub async fn confirm(state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let mut order = state
        .repository
        .find_by_id(id)
        .await?
        .ok_or(OrderError::NotFound(id))?;

    let event = order.confirm(Utc::now())?;

    state.repository.save(&order, &[event]).await?;
    state.outbox_wake.notify_one();

    Ok(HttpResponse::Ok().json(OrderResponse { order }))
}

#[derive(Debug, Deserialize)]
pub struct CancelOrderRequest {
    pub reason: String,
}

/// `POST /orders/{id}/cancel` — cancel with a mandatory reason. Dedicated
/// route for the named aggregate operation, distinct from the generic
/// `PATCH /orders/{id}/status`.
pub async fn cancel(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<CancelOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let mut order = state
        .repository
        .find_by_id(id)
        .await?
        .ok_or(OrderError::NotFound(id))?;

    let event = order.cancel(body.reason.clone(), Utc::now())?;

    state.repository.save(&order, &[event]).await?;
    state.outbox_wake.notify_one();

    Ok(HttpResponse::Ok().json(OrderResponse { order }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    /// Required when `status == "cancelled"`.
    pub reason: Option<String>,
}

/// `PATCH /orders/{id}/status` — the generic status change endpoint,
/// covering transitions that have no dedicated route (`confirmed ->
/// processing`, `processing -> shipped`, `shipped -> delivered`). `confirmed`
/// and `cancelled` are still accepted here too, routed to the same named
/// aggregate operations as the dedicated `/confirm` and `/cancel` routes.
pub async fn update_status(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateStatusRequest>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let mut order = state
        .repository
        .find_by_id(id)
        .await?
        .ok_or(OrderError::NotFound(id))?;

    let target = OrderStatus::from_str(&body.status)
        .map_err(|_| AppError::BadRequest(format!("unknown status '{}'", body.status)))?;

    let now = Utc::now();
    let event = match target {
        OrderStatus::Confirmed => order.confirm(now)?,
        OrderStatus::Cancelled => {
            let reason = body
                .reason
                .clone()
                .ok_or_else(|| AppError::BadRequest("cancelling requires a reason".to_string()))?;
            order.cancel(reason, now)?
        }
        other => order.advance_status(other, now)?,
    };

    state.repository.save(&order, &[event]).await?;
    state.outbox_wake.notify_one();

    Ok(HttpResponse::Ok().json(OrderResponse { order }))
}

#[derive(Debug, Deserialize)]
pub struct StockOverrideItemRequest {
    pub product_id: String,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmWithOverrideRequest {
    pub actor_id: String,
    pub actor_role: String,
    pub overrides: Vec<StockOverrideItemRequest>,
}

/// `POST /orders/{id}/confirm-with-override` — the stock-override
/// authorization path. Requires a `manager`/`admin` role claim; emits
/// `OrderConfirmed` then `StockOverrideApplied`, both in the same
/// transaction as the mutation so the override is recorded atomically.
pub async fn confirm_with_override(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<ConfirmWithOverrideRequest>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let mut order = state
        .repository
        .find_by_id(id)
        .await?
        .ok_or(OrderError::NotFound(id))?;

    let role = ActorRole::from_str(&body.actor_role)?;
    let overrides = body
        .overrides
        .iter()
        .map(|o| StockOverrideRequest {
            product_id: o.product_id.clone(),
            reason: o.reason.clone(),
        })
        .collect();

    let now = Utc::now();
    let (confirmed, applied) = order.confirm_with_stock_override(body.actor_id.clone(), role, overrides, now)?;

    state.repository.save(&order, &[confirmed, applied]).await?;
    state.outbox_wake.notify_one();

    Ok(HttpResponse::Ok().json(OrderResponse { order }))
}
