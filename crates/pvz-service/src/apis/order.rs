//! Order API handlers.
//!
//! Each handler extracts the request, calls the matching [`OrderService`]
//! operation and maps lifecycle errors to HTTP statuses. Extraction failures
//! (malformed JSON, non-numeric ids) are reported in the same error format.

use crate::server::AppState;
use axum::{
	extract::{
		rejection::{JsonRejection, PathRejection},
		Path, Query, State,
	},
	http::{header, StatusCode},
	response::{IntoResponse, Json, Response},
};
use pvz_core::{OrderService, OrderServiceError};
use pvz_types::{
	APIError, AuditEntry, CreateOrderRequest, CreateOrderResponse, ListOrdersQuery,
	MessageResponse, Order, OrderActionRequest, OrderFilter, SetStatusRequest, StatsSnapshot,
};
use serde_json::json;
use std::sync::Arc;

pub const ORDER_CREATED: &str = "Order created successfully";
pub const ORDER_ISSUED: &str = "Order issued successfully";
pub const ORDER_CANCELLED: &str = "Order cancelled successfully";
pub const STATUS_UPDATED: &str = "Status updated successfully";
pub const ORDER_DELETED: &str = "Order deleted successfully";

/// Maps a lifecycle error to its HTTP representation.
pub fn to_api_error(err: OrderServiceError) -> APIError {
	let message = err.to_string();
	match err {
		OrderServiceError::MissingField(field) => APIError::BadRequest {
			error_type: "MISSING_FIELD".into(),
			message,
			details: Some(json!({ "field": field })),
		},
		OrderServiceError::InvalidField { field, .. } => APIError::BadRequest {
			error_type: "INVALID_FIELD".into(),
			message,
			details: Some(json!({ "field": field })),
		},
		OrderServiceError::InvalidStatus(_) => APIError::bad_request("INVALID_STATUS", message),
		OrderServiceError::AlreadyTerminal { status, .. } => APIError::BadRequest {
			error_type: "ORDER_ALREADY_TERMINAL".into(),
			message,
			details: Some(json!({ "status": status })),
		},
		OrderServiceError::InvalidState { status, .. } => APIError::BadRequest {
			error_type: "INVALID_ORDER_STATE".into(),
			message,
			details: Some(json!({ "status": status })),
		},
		OrderServiceError::NotFound(_) => APIError::NotFound {
			error_type: "ORDER_NOT_FOUND".into(),
			message,
		},
		OrderServiceError::DuplicateKey(_) => APIError::Conflict {
			error_type: "DUPLICATE_ORDER_NUMBER".into(),
			message,
		},
		OrderServiceError::Storage(_) => APIError::InternalServerError {
			error_type: "STORAGE_ERROR".into(),
			message,
		},
	}
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, APIError> {
	payload
		.map(|Json(body)| body)
		.map_err(|rejection| APIError::bad_request("INVALID_JSON", rejection.body_text()))
}

fn order_id(path: Result<Path<u64>, PathRejection>) -> Result<u64, APIError> {
	path.map(|Path(id)| id)
		.map_err(|rejection| APIError::bad_request("INVALID_ORDER_ID", rejection.body_text()))
}

fn service(state: &AppState) -> &Arc<OrderService> {
	state.engine.service()
}

/// Handles GET /api/orders.
pub async fn list_orders(
	State(state): State<AppState>,
	Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<Order>>, APIError> {
	let filter = OrderFilter::try_from(query).inspect_err(|e| {
		tracing::warn!("Rejected order filter: {}", e);
	})?;
	Ok(Json(service(&state).list_orders(&filter).await))
}

/// Handles GET /api/orders/{id}.
pub async fn get_order(
	State(state): State<AppState>,
	path: Result<Path<u64>, PathRejection>,
) -> Result<Json<Order>, APIError> {
	let id = order_id(path)?;
	service(&state)
		.get_order(id)
		.await
		.map(Json)
		.map_err(to_api_error)
}

/// Handles GET /api/stats.
pub async fn get_stats(State(state): State<AppState>) -> Json<StatsSnapshot> {
	Json(service(&state).get_stats().await)
}

/// Handles POST /api/orders.
///
/// Responds 201 with a `Location` header pointing at the new order.
pub async fn create_order(
	State(state): State<AppState>,
	payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<Response, APIError> {
	let request = json_body(payload)?;
	let order = service(&state)
		.create_order(request)
		.await
		.map_err(to_api_error)?;

	Ok((
		StatusCode::CREATED,
		[(header::LOCATION, format!("/api/orders/{}", order.id))],
		Json(CreateOrderResponse {
			id: order.id,
			message: ORDER_CREATED.to_string(),
		}),
	)
		.into_response())
}

fn required_order_id(request: &OrderActionRequest) -> Result<u64, APIError> {
	request
		.order_id
		.ok_or_else(|| to_api_error(OrderServiceError::MissingField("order_id".into())))
}

/// Handles POST /api/orders/issue.
pub async fn issue_order(
	State(state): State<AppState>,
	payload: Result<Json<OrderActionRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, APIError> {
	let request = json_body(payload)?;
	let id = required_order_id(&request)?;

	service(&state)
		.issue_order(id)
		.await
		.map_err(to_api_error)?;
	Ok(Json(MessageResponse::new(ORDER_ISSUED)))
}

/// Handles POST /api/orders/cancel.
pub async fn cancel_order(
	State(state): State<AppState>,
	payload: Result<Json<OrderActionRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, APIError> {
	let request = json_body(payload)?;
	let id = required_order_id(&request)?;

	service(&state)
		.cancel_order(id, request.reason)
		.await
		.map_err(to_api_error)?;
	Ok(Json(MessageResponse::new(ORDER_CANCELLED)))
}

/// Handles PUT /api/orders/{id}/status.
pub async fn set_order_status(
	State(state): State<AppState>,
	path: Result<Path<u64>, PathRejection>,
	payload: Result<Json<SetStatusRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, APIError> {
	let id = order_id(path)?;
	let status = json_body(payload)?
		.status
		.ok_or_else(|| to_api_error(OrderServiceError::MissingField("status".into())))?;

	service(&state)
		.set_order_status(id, &status)
		.await
		.map_err(to_api_error)?;
	Ok(Json(MessageResponse::new(STATUS_UPDATED)))
}

/// Handles DELETE /api/orders/{id}.
pub async fn delete_order(
	State(state): State<AppState>,
	path: Result<Path<u64>, PathRejection>,
) -> Result<Json<MessageResponse>, APIError> {
	let id = order_id(path)?;
	service(&state)
		.delete_order(id)
		.await
		.map_err(to_api_error)?;
	Ok(Json(MessageResponse::new(ORDER_DELETED)))
}

/// Handles GET /api/orders/{id}/audit.
pub async fn get_order_audit(
	State(state): State<AppState>,
	path: Result<Path<u64>, PathRejection>,
) -> Result<Json<Vec<AuditEntry>>, APIError> {
	let id = order_id(path)?;
	service(&state)
		.audit_trail(id)
		.await
		.map(Json)
		.map_err(to_api_error)
}
