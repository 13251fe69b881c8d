use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use read_model::{lookup_order, OrderLookup};
use serde::Deserialize;
use tracing::{error, info};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OrderQuery {
    pub id: Option<String>,
}

fn order_response(payload: Bytes) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], payload).into_response()
}

/// Get a single order by ID
pub async fn get_order_handler(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Response {
    info!("Fetching order: {}", order_id);

    match lookup_order(&state.cache, &order_id) {
        OrderLookup::Found(payload) => order_response(payload),
        OrderLookup::NotFound => {
            info!("Order not found: {}", order_id);
            (StatusCode::NOT_FOUND, format!("Order not found: {}", order_id)).into_response()
        }
        OrderLookup::Failed(e) => {
            error!("Failed to fetch order {}: {}", order_id, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

/// Query-string lookup, `GET /api/?id=<order_uid>`. Unknown ids answer 400.
pub async fn get_order_by_query_handler(
    State(state): State<AppState>,
    Query(query): Query<OrderQuery>,
) -> Response {
    let order_id = match query.id.filter(|id| !id.is_empty()) {
        Some(id) => id,
        None => return (StatusCode::BAD_REQUEST, "Order ID is required").into_response(),
    };

    match lookup_order(&state.cache, &order_id) {
        OrderLookup::Found(payload) => order_response(payload),
        OrderLookup::NotFound => (StatusCode::BAD_REQUEST, "Not found").into_response(),
        OrderLookup::Failed(e) => {
            error!("Error while getting order {}: {}", order_id, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}
