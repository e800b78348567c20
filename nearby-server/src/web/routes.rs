//! HTTP route handlers.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::Utc;
use tokio::task::JoinError;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::cancel::CancelToken;
use crate::domain::{InvalidNetworkId, NetworkId, ScheduleTarget};
use crate::proximity::ProximityError;
use crate::schedule::ScheduleError;

use super::dto::*;
use super::state::AppState;

/// Upper bound on `max_results` accepted from clients.
const MAX_RESULTS_CAP: usize = 100;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/nearby", get(nearby))
        .route("/departures", get(departures))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// POIs near a position.
///
/// The search runs as its own task and is cancelled if the client goes
/// away before it finishes.
async fn nearby(
    State(state): State<AppState>,
    Query(req): Query<NearbyRequest>,
) -> Result<Json<NearbyResponse>, AppError> {
    let networks = match req.network_ids()? {
        Some(ids) => ids,
        None => state.nearby.index().networks(),
    };

    let config = state.nearby.config();
    let min_results = req.min_results.unwrap_or(config.min_results);
    let max_results = req
        .max_results
        .unwrap_or(config.max_results)
        .min(MAX_RESULTS_CAP);

    let cancel = CancelToken::new();
    let _abandon = cancel.drop_guard();

    let task = tokio::spawn({
        let search = state.nearby.clone();
        let cancel = cancel.clone();
        let (lat, lng) = (req.lat, req.lng);
        async move {
            search
                .find_nearest(&networks, lat, lng, min_results, max_results, &cancel)
                .await
        }
    });
    let found = task.await??;

    let index = state.nearby.index();
    let results = found
        .iter()
        .map(|n| {
            NearbyResult::from_nearby(n, |stop_id| {
                index.stop_name(&n.poi.network, stop_id).map(str::to_string)
            })
        })
        .collect();

    Ok(Json(NearbyResponse { results }))
}

/// Upcoming departures of one stop, route and trip.
async fn departures(
    State(state): State<AppState>,
    Query(req): Query<DeparturesRequest>,
) -> Result<Json<DeparturesResponse>, AppError> {
    let network = NetworkId::new(req.network.as_str())?;
    if req.stop.trim().is_empty() {
        return Err(AppError::BadRequest {
            message: "Missing stop id".to_string(),
        });
    }

    let target = ScheduleTarget {
        network,
        stop_id: req.stop,
        route_id: req.route,
        trip_id: req.trip,
    };
    let now_ms = req
        .now_ms
        .unwrap_or_else(|| Utc::now().timestamp_millis());

    let cancel = CancelToken::new();
    let _abandon = cancel.drop_guard();

    let task = tokio::spawn({
        let departures = state.departures.clone();
        let target = target.clone();
        let cancel = cancel.clone();
        let (cache_only, max_age_secs) = (req.cache_only, req.max_age_secs);
        async move {
            departures
                .get_departure(&target, now_ms, cache_only, max_age_secs, &cancel)
                .await
        }
    });
    let result = task.await??;

    let next_departure = result.as_ref().and_then(|r| r.next_departure(now_ms));

    Ok(Json(DeparturesResponse {
        key: target.cache_key(),
        result,
        next_departure,
    }))
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    Internal { message: String },
}

impl From<InvalidNetworkId> for AppError {
    fn from(e: InvalidNetworkId) -> Self {
        AppError::BadRequest {
            message: e.to_string(),
        }
    }
}

impl From<ProximityError> for AppError {
    fn from(e: ProximityError) -> Self {
        AppError::Internal {
            message: e.to_string(),
        }
    }
}

impl From<ScheduleError> for AppError {
    fn from(e: ScheduleError) -> Self {
        AppError::Internal {
            message: e.to_string(),
        }
    }
}

impl From<JoinError> for AppError {
    fn from(e: JoinError) -> Self {
        AppError::Internal {
            message: format!("Lookup task failed: {e}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            AppError::Internal { message } => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        if status.is_server_error() {
            error!(%status, message = %message, "Request failed");
        } else {
            warn!(%status, message = %message, "Rejected request");
        }

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}
