//! API types for the pickup-point HTTP API.
//!
//! Request bodies keep every field optional so the service layer can report
//! exactly which required field is missing.

use crate::{parse_date_bound, DateBound, FilterError, OrderFilter};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Body of `POST /api/orders`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateOrderRequest {
	pub order_number: Option<String>,
	pub client_name: Option<String>,
	pub phone: Option<String>,
	pub amount: Option<Decimal>,
	pub delivery_method: Option<String>,
	pub pickup_point: Option<String>,
	/// Initial status; defaults to `Pending`.
	pub status: Option<String>,
}

/// Body of `POST /api/orders/issue` and `POST /api/orders/cancel`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderActionRequest {
	pub order_id: Option<u64>,
	/// Cancellation reason, kept in the audit trail.
	#[serde(default)]
	pub reason: Option<String>,
}

/// Body of `PUT /api/orders/{id}/status`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetStatusRequest {
	pub status: Option<String>,
}

/// Raw query parameters of `GET /api/orders`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListOrdersQuery {
	pub status: Option<String>,
	pub search: Option<String>,
	pub date_from: Option<String>,
	pub date_to: Option<String>,
}

impl TryFrom<ListOrdersQuery> for OrderFilter {
	type Error = FilterError;

	/// Empty parameters are treated as absent.
	fn try_from(query: ListOrdersQuery) -> Result<Self, Self::Error> {
		fn present(value: Option<String>) -> Option<String> {
			value.filter(|v| !v.is_empty())
		}

		let status = present(query.status)
			.map(|s| s.parse().map_err(|_| FilterError::Status(s)))
			.transpose()?;
		let date_from = present(query.date_from)
			.map(|d| parse_date_bound(&d, DateBound::From))
			.transpose()?;
		let date_to = present(query.date_to)
			.map(|d| parse_date_bound(&d, DateBound::To))
			.transpose()?;

		Ok(OrderFilter {
			status,
			search_text: present(query.search),
			date_from,
			date_to,
		})
	}
}

/// Response of `POST /api/orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderResponse {
	pub id: u64,
	pub message: String,
}

/// Response of the lifecycle endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
	pub message: String,
}

impl MessageResponse {
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
		}
	}
}

/// API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
	/// Additional error context
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
}

/// Structured API error type with appropriate HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Bad request: validation or lifecycle rule violation (400)
	BadRequest {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Referenced order does not exist (404)
	NotFound { error_type: String, message: String },
	/// Uniqueness violation (409)
	Conflict { error_type: String, message: String },
	/// Internal server error (500)
	InternalServerError { error_type: String, message: String },
}

impl APIError {
	/// Shorthand for a 400 without details.
	pub fn bad_request(error_type: impl Into<String>, message: impl Into<String>) -> Self {
		APIError::BadRequest {
			error_type: error_type.into(),
			message: message.into(),
			details: None,
		}
	}

	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::NotFound { .. } => 404,
			APIError::Conflict { .. } => 409,
			APIError::InternalServerError { .. } => 500,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		match self {
			APIError::BadRequest {
				error_type,
				message,
				details,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: details.clone(),
			},
			APIError::NotFound { error_type, message }
			| APIError::Conflict { error_type, message }
			| APIError::InternalServerError { error_type, message } => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: None,
			},
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			APIError::BadRequest { message, .. } => write!(f, "Bad Request: {}", message),
			APIError::NotFound { message, .. } => write!(f, "Not Found: {}", message),
			APIError::Conflict { message, .. } => write!(f, "Conflict: {}", message),
			APIError::InternalServerError { message, .. } => {
				write!(f, "Internal Server Error: {}", message)
			},
		}
	}
}

impl std::error::Error for APIError {}

impl From<FilterError> for APIError {
	fn from(err: FilterError) -> Self {
		APIError::bad_request("INVALID_FILTER", err.to_string())
	}
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = StatusCode::from_u16(self.status_code())
			.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		(status, Json(self.to_error_response())).into_response()
	}
}
