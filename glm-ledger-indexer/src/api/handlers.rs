//! API request handlers

use super::{responses::*, ApiState};
use crate::core::{Direction, IndexerError, SortBy, SortOrder, TxType};
use crate::database::DatabaseHealth;
use crate::pagination::PageRequest;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;

/// Query parameters for `GET /metrics/transactions`.
///
/// Everything arrives as text so malformed values become validation errors
/// with a JSON body instead of the extractor's plain-text rejection.
#[derive(Debug, Default, Deserialize)]
pub struct TransactionsQuery {
    pub limit: Option<String>,
    pub cursor: Option<String>,
    pub direction: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub tx_type: Option<String>,
}

impl TransactionsQuery {
    pub fn into_request(self, default_limit: u32) -> Result<PageRequest, IndexerError> {
        let limit = match non_empty(self.limit) {
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|_| IndexerError::Validation(format!("invalid limit: {}", raw)))?,
            None => default_limit,
        };

        Ok(PageRequest {
            limit,
            cursor: non_empty(self.cursor),
            direction: non_empty(self.direction)
                .map(|d| d.parse::<Direction>())
                .transpose()?
                .unwrap_or_default(),
            sort_by: non_empty(self.sort_by)
                .map(|s| s.parse::<SortBy>())
                .transpose()?
                .unwrap_or_default(),
            sort_order: non_empty(self.sort_order)
                .map(|s| s.parse::<SortOrder>())
                .transpose()?
                .unwrap_or_default(),
            tx_type: non_empty(self.tx_type)
                .map(|t| t.parse::<TxType>())
                .transpose()?,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Handler error carrying the indexer error it came from
pub struct ApiError(IndexerError);

impl From<IndexerError> for ApiError {
    fn from(err: IndexerError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            tracing::error!("Request failed: {}", self.0);
            StatusCode::INTERNAL_SERVER_ERROR
        };

        let error = if status == StatusCode::BAD_REQUEST {
            self.0.to_string()
        } else {
            "internal server error".to_string()
        };

        let body = ErrorResponse {
            error,
            code: status.as_u16(),
            timestamp: chrono::Utc::now().timestamp(),
        };
        (status, Json(body)).into_response()
    }
}

/// Paginated ledger listing
pub async fn list_transactions(
    State(state): State<ApiState>,
    Query(query): Query<TransactionsQuery>,
) -> Result<Json<TransactionsResponse>, ApiError> {
    let request = query.into_request(state.default_page_size)?;
    let page = state.engine.paginate(state.ledger.as_ref(), &request).await?;
    Ok(Json(TransactionsResponse::try_from(page)?))
}

/// Health check handler
pub async fn health(State(state): State<ApiState>) -> (StatusCode, Json<HealthResponse>) {
    let ledger = match state.ledger.health_check().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Ledger health check failed: {}", e);
            false
        }
    };

    let status = if ledger {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if ledger { "healthy" } else { "degraded" },
            database: DatabaseHealth {
                ledger,
                overall: ledger,
            },
            timestamp: chrono::Utc::now().timestamp(),
            service: "glm-ledger-indexer",
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_uses_defaults() {
        let request = TransactionsQuery::default().into_request(20).unwrap();
        assert_eq!(request, PageRequest::default());
    }

    #[test]
    fn bad_parameters_are_validation_errors() {
        let cases = [
            TransactionsQuery {
                limit: Some("ten".into()),
                ..Default::default()
            },
            TransactionsQuery {
                direction: Some("sideways".into()),
                ..Default::default()
            },
            TransactionsQuery {
                sort_by: Some("gas".into()),
                ..Default::default()
            },
            TransactionsQuery {
                tx_type: Some("provider_to_master".into()),
                ..Default::default()
            },
        ];

        for query in cases {
            assert!(query.into_request(20).unwrap_err().is_client_error());
        }
    }
}
