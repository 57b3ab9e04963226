use std::convert::Infallible;

use axum::{
    extract::{rejection::JsonRejection, FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use clientele_core::domain::customer::{Customer, CustomerDraft, CustomerId};
use clientele_core::domain::summary::CustomerSummary;
use clientele_core::errors::{ApplicationError, InterfaceError};
use futures::TryStreamExt;
use serde::Serialize;
use tracing::{error, warn};
use uuid::Uuid;

use crate::lifecycle::CustomerLifecycle;
use crate::summary::SummaryOrchestrator;

pub const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Clone)]
pub struct ApiState {
    pub lifecycle: CustomerLifecycle,
    pub summaries: SummaryOrchestrator,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/v1/customers", post(create_customer).get(list_customers))
        .route(
            "/v1/customers/{id}",
            get(get_customer).put(update_customer).delete(delete_customer),
        )
        .route("/v1/customers/{id}/summary", get(customer_summary))
        .with_state(state)
}

/// Taken from the `x-correlation-id` header, or freshly generated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorrelationId(pub String);

impl<S: Send + Sync> FromRequestParts<S> for CorrelationId {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let supplied = parts
            .headers
            .get(CORRELATION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_owned);

        Ok(Self(supplied.unwrap_or_else(|| Uuid::new_v4().to_string())))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    pub correlation_id: String,
}

#[derive(Debug)]
pub struct ApiError(InterfaceError);

impl ApiError {
    fn new(error: ApplicationError, correlation_id: &CorrelationId) -> Self {
        Self(error.into_interface(correlation_id.0.clone()))
    }

    fn status(&self) -> StatusCode {
        match self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::BadGateway { .. } => StatusCode::BAD_GATEWAY,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = self.0;

        // Client errors echo the detail; server errors only get the safe message.
        let message = match &error {
            InterfaceError::BadRequest { message, .. } | InterfaceError::NotFound { message, .. } => {
                message.clone()
            }
            _ => error.user_message().to_string(),
        };

        if status.is_server_error() {
            error!(
                event_name = "api.request.failed",
                correlation_id = error.correlation_id(),
                code = error.code(),
                error = %error,
                "request failed"
            );
        } else {
            warn!(
                event_name = "api.request.rejected",
                correlation_id = error.correlation_id(),
                code = error.code(),
                error = %error,
                "request rejected"
            );
        }

        let body = ErrorBody {
            code: error.code(),
            message,
            correlation_id: error.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

fn draft_from(
    payload: Result<Json<CustomerDraft>, JsonRejection>,
    correlation_id: &CorrelationId,
) -> Result<CustomerDraft, ApiError> {
    payload.map(|Json(draft)| draft).map_err(|rejection| {
        ApiError::new(ApplicationError::MalformedInput(rejection.body_text()), correlation_id)
    })
}

pub async fn create_customer(
    State(state): State<ApiState>,
    correlation_id: CorrelationId,
    payload: Result<Json<CustomerDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<Customer>), ApiError> {
    let draft = draft_from(payload, &correlation_id)?;
    let customer = state
        .lifecycle
        .create(draft)
        .await
        .map_err(|error| ApiError::new(error, &correlation_id))?;

    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn list_customers(
    State(state): State<ApiState>,
    correlation_id: CorrelationId,
) -> Result<Json<Vec<Customer>>, ApiError> {
    let customers = state
        .lifecycle
        .list_all()
        .try_collect::<Vec<_>>()
        .await
        .map_err(|error| ApiError::new(error, &correlation_id))?;

    Ok(Json(customers))
}

pub async fn get_customer(
    State(state): State<ApiState>,
    correlation_id: CorrelationId,
    Path(id): Path<String>,
) -> Result<Json<Customer>, ApiError> {
    let customer = state
        .lifecycle
        .get(&CustomerId(id))
        .await
        .map_err(|error| ApiError::new(error, &correlation_id))?;

    Ok(Json(customer))
}

pub async fn update_customer(
    State(state): State<ApiState>,
    correlation_id: CorrelationId,
    Path(id): Path<String>,
    payload: Result<Json<CustomerDraft>, JsonRejection>,
) -> Result<Json<Customer>, ApiError> {
    let draft = draft_from(payload, &correlation_id)?;
    let customer = state
        .lifecycle
        .update(&CustomerId(id), draft)
        .await
        .map_err(|error| ApiError::new(error, &correlation_id))?;

    Ok(Json(customer))
}

pub async fn delete_customer(
    State(state): State<ApiState>,
    correlation_id: CorrelationId,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .lifecycle
        .delete(&CustomerId(id))
        .await
        .map_err(|error| ApiError::new(error, &correlation_id))?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn customer_summary(
    State(state): State<ApiState>,
    correlation_id: CorrelationId,
    Path(id): Path<String>,
) -> Result<Json<CustomerSummary>, ApiError> {
    let summary = state
        .summaries
        .summarize(&CustomerId(id))
        .await
        .map_err(|error| ApiError::new(error, &correlation_id))?;

    Ok(Json(summary))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use clientele_core::config::DownstreamConfig;
    use clientele_core::resilience::{BreakerRegistry, CircuitBreakerPolicy};
    use clientele_db::repositories::InMemoryCustomerRepository;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::{router, ApiState, CORRELATION_HEADER};
    use crate::gateway::OutboundGateway;
    use crate::lifecycle::CustomerLifecycle;
    use crate::stub::{self, Reply};
    use crate::summary::SummaryOrchestrator;

    async fn app() -> Router {
        let accounts = stub::spawn("/v1/accounts", Reply::Json(json!([{"id": "a1"}]))).await;
        let cards = stub::spawn("/v1/cards", Reply::Json(json!([]))).await;
        let credits = stub::spawn("/v1/credits", Reply::Json(json!([{"id": "r1"}]))).await;

        let lifecycle = CustomerLifecycle::new(Arc::new(InMemoryCustomerRepository::default()));
        let gateway = OutboundGateway::new(
            Arc::new(BreakerRegistry::new(CircuitBreakerPolicy::default())),
            Duration::from_secs(2),
        )
        .expect("gateway");
        let summaries = SummaryOrchestrator::new(
            lifecycle.clone(),
            Arc::new(gateway),
            DownstreamConfig {
                accounts_url: accounts.base_url.clone(),
                cards_url: cards.base_url.clone(),
                credits_url: credits.base_url.clone(),
                call_timeout_ms: 2_000,
            },
        );

        router(ApiState { lifecycle, summaries })
    }

    fn customer_body() -> Value {
        json!({
            "name": "Jane Doe",
            "type": "PERSONAL",
            "profile": "VIP",
            "documentId": "82782345",
            "email": "jane@example.com",
            "phoneNumber": "5555555555555"
        })
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.expect("router response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body bytes");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, body)
    }

    fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder().method(method).uri(uri).body(Body::empty()).expect("request")
    }

    async fn create(app: &Router) -> String {
        let (status, body) = send(app, json_request("POST", "/v1/customers", &customer_body())).await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().expect("id").to_string()
    }

    #[tokio::test]
    async fn create_returns_created_customer_with_id() {
        let app = app().await;

        let (status, body) =
            send(&app, json_request("POST", "/v1/customers", &customer_body())).await;

        assert_eq!(status, StatusCode::CREATED);
        assert!(!body["id"].as_str().unwrap_or_default().is_empty());
        assert_eq!(body["type"], "PERSONAL");
        assert_eq!(body["documentId"], "82782345");
    }

    #[tokio::test]
    async fn get_list_update_delete_flow() {
        let app = app().await;
        let id = create(&app).await;

        let (status, fetched) = send(&app, empty_request("GET", &format!("/v1/customers/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["name"], "Jane Doe");

        let (status, listed) = send(&app, empty_request("GET", "/v1/customers")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().map(Vec::len), Some(1));

        let mut changes = customer_body();
        changes["name"] = json!("Jane Roe");
        let (status, updated) =
            send(&app, json_request("PUT", &format!("/v1/customers/{id}"), &changes)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["id"], id.as_str());
        assert_eq!(updated["name"], "Jane Roe");

        let (status, _) = send(&app, empty_request("DELETE", &format!("/v1/customers/{id}"))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(&app, empty_request("GET", &format!("/v1/customers/{id}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "CUSTOMER-001");
    }

    #[tokio::test]
    async fn unknown_customer_is_404_with_correlation_id() {
        let app = app().await;
        let request = Request::builder()
            .uri("/v1/customers/missing")
            .header(CORRELATION_HEADER, "req-42")
            .body(Body::empty())
            .expect("request");

        let (status, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "CUSTOMER-001");
        assert_eq!(body["correlationId"], "req-42");
    }

    #[tokio::test]
    async fn update_and_delete_of_unknown_customer_are_404() {
        let app = app().await;

        let (status, _) =
            send(&app, json_request("PUT", "/v1/customers/missing", &customer_body())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, empty_request("DELETE", "/v1/customers/missing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_json_is_400() {
        let app = app().await;
        let request = Request::builder()
            .method("POST")
            .uri("/v1/customers")
            .header("content-type", "application/json")
            .body(Body::from("{\"name\": "))
            .expect("request");

        let (status, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "CUSTOMER-002");
        assert!(!body["correlationId"].as_str().unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn invalid_field_is_400() {
        let app = app().await;
        let mut body = customer_body();
        body["email"] = json!("not-an-email");

        let (status, response) = send(&app, json_request("POST", "/v1/customers", &body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["code"], "CUSTOMER-002");
        assert!(response["message"].as_str().unwrap_or_default().contains("email"));
    }

    #[tokio::test]
    async fn summary_route_returns_flat_summary() {
        let app = app().await;
        let id = create(&app).await;

        let (status, body) =
            send(&app, empty_request("GET", &format!("/v1/customers/{id}/summary"))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "id": id,
                "name": "Jane Doe",
                "accounts": [{"id": "a1"}],
                "cards": [],
                "credits": [{"id": "r1"}]
            })
        );
    }

    #[tokio::test]
    async fn summary_of_unknown_customer_is_404() {
        let app = app().await;

        let (status, body) = send(&app, empty_request("GET", "/v1/customers/missing/summary")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "CUSTOMER-001");
    }
}
