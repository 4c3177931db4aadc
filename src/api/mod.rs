// ============================================================================
// HTTP API - actix-web boundary of the order service
// ============================================================================
//
//   POST /api/v1/orders              create an order
//   GET  /api/v1/orders/{id}         fetch one order
//   GET  /api/v1/orders?user_id=...  most recent orders of a user
//   GET  /health                     liveness
//   GET  /metrics                    Prometheus exposition
//
// Error bodies are always `{"error": <summary>, "message": <detail>}`.
//
// ============================================================================

use std::sync::Arc;

use actix_web::{
    error::InternalError, http::StatusCode, web, HttpResponse, Responder, ResponseError,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::order::{CreateOrder, NewOrderItem, OrderCommandHandler, OrderError};
use crate::metrics::{metrics_handler, Metrics};

/// Shared state of the HTTP workers.
pub struct AppState {
    pub orders: OrderCommandHandler,
    /// Upper bound on the number of orders a list call returns.
    pub list_limit: u32,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: String,
    pub restaurant_id: String,
    pub items: Vec<NewOrderItem>,
}

impl From<CreateOrderRequest> for CreateOrder {
    fn from(req: CreateOrderRequest) -> Self {
        CreateOrder {
            user_id: req.user_id,
            restaurant_id: req.restaurant_id,
            items: req.items,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
#[error("{error}: {message}")]
pub struct ApiError {
    status: StatusCode,
    error: &'static str,
    message: String,
}

impl ApiError {
    fn bad_request(error: &'static str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error,
            message: message.into(),
        }
    }

    /// Map a domain error to a response, `error` naming the failed operation.
    fn from_order(error: &'static str, e: OrderError) -> Self {
        match e {
            OrderError::InvalidInput(_) => Self::bad_request(error, e.to_string()),
            OrderError::NotFound(_) => Self {
                status: StatusCode::NOT_FOUND,
                error: "Order not found",
                message: e.to_string(),
            },
            // Store and bus details stay in the logs.
            _ => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                error,
                message: "internal server error".to_string(),
            },
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        self.status
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status).json(ErrorResponse {
            error: self.error.to_string(),
            message: self.message.clone(),
        })
    }
}

/// Register every route on `cfg`. Expects `web::Data<AppState>` and
/// `web::Data<Arc<Metrics>>` to be provided by the app.
pub fn configure(cfg: &mut web::ServiceConfig) {
    let json_config = web::JsonConfig::default().error_handler(|err, _req| {
        let response = ApiError::bad_request("Invalid request body", err.to_string()).error_response();
        InternalError::from_response(err, response).into()
    });

    cfg.app_data(json_config)
        .service(
            web::resource("/api/v1/orders")
                .route(web::post().to(create_order))
                .route(web::get().to(list_orders)),
        )
        .route("/api/v1/orders/{id}", web::get().to(get_order))
        .route("/health", web::get().to(health))
        .route("/metrics", web::get().to(metrics_handler));
}

async fn create_order(
    state: web::Data<AppState>,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, ApiError> {
    let order = state
        .orders
        .create_order(body.into_inner().into())
        .await
        .map_err(|e| ApiError::from_order("Failed to create order", e))?;

    Ok(HttpResponse::Created().json(order))
}

async fn get_order(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let raw = path.into_inner();
    let id = Uuid::parse_str(&raw)
        .map_err(|e| ApiError::bad_request("Invalid order ID", format!("{raw}: {e}")))?;

    let order = state
        .orders
        .get_order(id)
        .await
        .map_err(|e| ApiError::from_order("Failed to fetch order", e))?;

    Ok(HttpResponse::Ok().json(order))
}

async fn list_orders(
    state: web::Data<AppState>,
    query: web::Query<ListOrdersQuery>,
) -> Result<HttpResponse, ApiError> {
    let user_id = match query.into_inner().user_id {
        Some(user_id) if !user_id.trim().is_empty() => user_id,
        _ => return Err(ApiError::bad_request("Missing user_id query parameter", "")),
    };

    let orders = state
        .orders
        .list_orders(&user_id, i64::from(state.list_limit))
        .await
        .map_err(|e| ApiError::from_order("Failed to list orders", e))?;

    Ok(HttpResponse::Ok().json(orders))
}

async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "healthy" }))
}

/// Wrap the handler and metrics as the app data `configure` expects.
pub fn app_data(
    orders: OrderCommandHandler,
    list_limit: u32,
    metrics: Arc<Metrics>,
) -> (web::Data<AppState>, web::Data<Arc<Metrics>>) {
    (
        web::Data::new(AppState { orders, list_limit }),
        web::Data::new(metrics),
    )
}
