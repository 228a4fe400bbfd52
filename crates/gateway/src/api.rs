//! HTTP API handlers and routes using axum.
//!
//! Routes:
//! - `POST /orders` - Submit a market swap order
//! - `GET /orders` - List orders with status filter and pagination
//! - `GET /orders/{id}` - Fetch one order (cache read-through)
//! - `GET /orders/{id}/updates` - Transition history, newest first
//! - `GET /stats` - Store, queue, hub, and cache statistics
//! - `GET /health` - Health check

use crate::config::Config;
use crate::error::ApiError;
use crate::ws_server::ws_handler;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use common::{HubStats, Order, OrderStatus, OrderType, SubscriptionHub, TransitionEvent, Venue};
use engine::{JobQueue, QueueStats};
use metrics::counter;
use order_store::{HotCache, OrderDraft, OrderStore, StoreStats};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Hard bounds on admitted orders.
const MIN_SLIPPAGE: Decimal = Decimal::from_parts(1, 0, 0, false, 4); // 0.0001
const MAX_SLIPPAGE: Decimal = Decimal::from_parts(5, 0, 0, false, 1); // 0.5
const DEFAULT_SLIPPAGE: Decimal = Decimal::from_parts(1, 0, 0, false, 2); // 0.01
const MAX_FRACTIONAL_DIGITS: u32 = 8;
const MAX_PAGE_LIMIT: usize = 100;
const DEFAULT_PAGE_LIMIT: usize = 20;

/// Application state shared across handlers.
pub struct AppState {
    pub store: Arc<OrderStore>,
    pub cache: Arc<HotCache>,
    pub hub: Arc<SubscriptionHub>,
    pub queue: Arc<JobQueue>,
    pub venues: Vec<Venue>,
    pub config: Config,
}

/// Create the API router (REST + WebSocket).
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/orders", post(submit_handler).get(list_handler))
        .route("/orders/{id}", get(get_handler))
        .route("/orders/{id}/updates", get(updates_handler))
        .route("/ws/orders/{id}", get(ws_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Request / Response Types
// ============================================================================

/// Swap submission payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub token_in: String,
    pub token_out: String,
    pub amount_in: Decimal,
    #[serde(default)]
    pub slippage: Option<Decimal>,
    #[serde(rename = "type", default)]
    pub order_type: OrderType,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    order_id: String,
    status: OrderStatus,
    subscribe_url: String,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    status: Option<OrderStatus>,
    limit: Option<usize>,
    offset: Option<usize>,
}

#[derive(Debug, Serialize)]
struct Pagination {
    limit: usize,
    offset: usize,
    total: usize,
}

#[derive(Debug, Serialize)]
struct ListResponse {
    orders: Vec<Order>,
    pagination: Pagination,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdatesResponse {
    order_id: String,
    updates: Vec<TransitionEvent>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CacheStats {
    active_orders: usize,
    cached_orders: usize,
}

#[derive(Serialize)]
struct StatsResponse {
    orders: StoreStats,
    queue: QueueStats,
    subscriptions: HubStats,
    cache: CacheStats,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    venues: Vec<Venue>,
    queue_depth: usize,
    active_subscribers: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint.
/// GET /health
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        venues: state.venues.clone(),
        queue_depth: state.queue.depth(),
        active_subscribers: state.hub.active_subscribers(),
    })
}

/// Service statistics.
/// GET /stats
async fn stats_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(StatsResponse {
        orders: state.store.stats(),
        queue: state.queue.stats(),
        subscriptions: state.hub.stats(),
        cache: CacheStats {
            active_orders: state.cache.active_count(),
            cached_orders: state.cache.cached_count(),
        },
    })
}

/// Submit a swap order.
/// POST /orders
///
/// The response only says whether the order was accepted; everything after
/// admission is observable via `GET /orders/{id}` and the subscribe stream.
async fn submit_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmitRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let slippage = validate_submit(&req)?;

    let order = state.store.create(OrderDraft {
        order_type: req.order_type,
        token_in: req.token_in,
        token_out: req.token_out,
        amount_in: req.amount_in,
        slippage,
    });
    state.cache.track(&order);
    state.queue.enqueue(&order.id)?;

    counter!("gateway_orders_submitted_total").increment(1);
    info!(
        "Accepted order {}: {} {} -> {}",
        order.id, order.amount_in, order.token_in, order.token_out
    );

    Ok(Json(SubmitResponse {
        subscribe_url: state.config.subscribe_url(&order.id),
        order_id: order.id,
        status: order.status,
    }))
}

/// Fetch one order, serving from the hot cache when possible.
/// GET /orders/{id}
async fn get_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(order) = state.cache.get(&id) {
        return Ok(Json(order));
    }
    let order = state.store.find(&id)?;
    state.cache.prime(&order);
    Ok(Json(order))
}

/// Transition history for one order, newest first.
/// GET /orders/{id}/updates
async fn updates_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    // 404 for unknown ids; an empty list for known ones with no history.
    state.store.find(&id)?;
    Ok(Json(UpdatesResponse {
        updates: state.cache.updates(&id),
        order_id: id,
    }))
}

/// List orders.
/// GET /orders?status=&limit=&offset=
async fn list_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    if limit == 0 || limit > MAX_PAGE_LIMIT {
        return Err(ApiError::Validation(format!(
            "limit must be between 1 and {}",
            MAX_PAGE_LIMIT
        )));
    }
    let offset = query.offset.unwrap_or(0);

    let (orders, total) = state.store.list(query.status, limit, offset);
    Ok(Json(ListResponse {
        orders,
        pagination: Pagination {
            limit,
            offset,
            total,
        },
    }))
}

// ============================================================================
// Validation
// ============================================================================

/// Admission checks. Returns the effective slippage.
fn validate_submit(req: &SubmitRequest) -> Result<Decimal, ApiError> {
    if req.order_type != OrderType::Market {
        return Err(ApiError::Validation(format!(
            "only market orders are accepted (got '{}')",
            req.order_type
        )));
    }

    normalizer::validate_pair(&req.token_in, &req.token_out)?;

    if req.amount_in <= Decimal::ZERO {
        return Err(ApiError::Validation(
            "amountIn must be positive".to_string(),
        ));
    }
    let max_amount = Decimal::from_u32(1_000_000).unwrap_or(Decimal::MAX);
    if req.amount_in > max_amount {
        return Err(ApiError::Validation(format!(
            "amountIn must not exceed {}",
            max_amount
        )));
    }
    if req.amount_in.normalize().scale() > MAX_FRACTIONAL_DIGITS {
        return Err(ApiError::Validation(format!(
            "amountIn must have at most {} fractional digits",
            MAX_FRACTIONAL_DIGITS
        )));
    }

    let slippage = req.slippage.unwrap_or(DEFAULT_SLIPPAGE);
    if !(MIN_SLIPPAGE..=MAX_SLIPPAGE).contains(&slippage) {
        return Err(ApiError::Validation(format!(
            "slippage must be between {} and {}",
            MIN_SLIPPAGE, MAX_SLIPPAGE
        )));
    }

    Ok(slippage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const NATIVE: &str = "11111111111111111111111111111111";
    const WRAPPED: &str = "So11111111111111111111111111111111111111112";
    const USDC: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

    fn make_request() -> SubmitRequest {
        SubmitRequest {
            token_in: NATIVE.to_string(),
            token_out: USDC.to_string(),
            amount_in: dec!(1.5),
            slippage: None,
            order_type: OrderType::Market,
        }
    }

    #[test]
    fn test_valid_request_gets_default_slippage() {
        assert_eq!(validate_submit(&make_request()).unwrap(), dec!(0.01));
    }

    #[test]
    fn test_rejects_non_market_orders() {
        let mut req = make_request();
        req.order_type = OrderType::Limit;
        assert!(matches!(
            validate_submit(&req),
            Err(ApiError::Validation(msg)) if msg.contains("market")
        ));
    }

    #[test]
    fn test_rejects_same_asset_pair() {
        let mut req = make_request();
        req.token_out = WRAPPED.to_string();
        assert!(matches!(
            validate_submit(&req),
            Err(ApiError::Validation(msg)) if msg.contains("same asset")
        ));
    }

    #[test]
    fn test_rejects_amount_bounds() {
        let mut req = make_request();
        req.amount_in = Decimal::ZERO;
        assert!(validate_submit(&req).is_err());

        req.amount_in = dec!(-2);
        assert!(validate_submit(&req).is_err());

        req.amount_in = dec!(1000001);
        assert!(validate_submit(&req).is_err());

        req.amount_in = dec!(1000000);
        assert!(validate_submit(&req).is_ok());
    }

    #[test]
    fn test_rejects_excess_precision() {
        let mut req = make_request();
        req.amount_in = dec!(0.123456789);
        assert!(matches!(
            validate_submit(&req),
            Err(ApiError::Validation(msg)) if msg.contains("fractional")
        ));

        // Trailing zeros do not count against the limit.
        req.amount_in = dec!(0.1234567800);
        assert!(validate_submit(&req).is_ok());
    }

    #[test]
    fn test_rejects_slippage_out_of_range() {
        let mut req = make_request();
        req.slippage = Some(dec!(0.00001));
        assert!(validate_submit(&req).is_err());

        req.slippage = Some(dec!(0.51));
        assert!(validate_submit(&req).is_err());

        req.slippage = Some(dec!(0.5));
        assert_eq!(validate_submit(&req).unwrap(), dec!(0.5));
        req.slippage = Some(dec!(0.0001));
        assert_eq!(validate_submit(&req).unwrap(), dec!(0.0001));
    }

    #[test]
    fn test_rejects_malformed_address() {
        let mut req = make_request();
        req.token_in = "l0l".to_string();
        assert!(matches!(
            validate_submit(&req),
            Err(ApiError::Validation(msg)) if msg.contains("invalid token address")
        ));
    }
}
