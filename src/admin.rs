//! HTTP admin API for zone and record management.
//!
//! All writes go to the primary store; the coordinator picks them up on its
//! next tick via the change token. Authentication is a shared static key in
//! the `Authorization` header (or `X-Api-Key`, for acme-dns clients).

use std::sync::Arc;

use axum::extract::{Path, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use hickory_proto::rr::rdata::TXT;
use hickory_proto::rr::{Name, RData, Record};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::AdminConfig;
use crate::error::DnsError;
use crate::record::{parse_rr_text, StoredRecord};
use crate::storage::ZoneStore;
use crate::zone::normalize_name;

/// TTL applied to TXT records upserted through the acme-dns endpoint.
const ACME_TXT_TTL: u32 = 60;

#[derive(Clone)]
struct AdminState {
    store: Arc<dyn ZoneStore>,
    api_keys: Arc<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct AcmeUpdate {
    subdomain: String,
    txt: String,
}

#[derive(Debug, Serialize)]
struct AcmeResponse {
    txt: String,
}

/// Build the admin router over the given store.
pub fn router(store: Arc<dyn ZoneStore>, api_keys: Vec<String>) -> Router {
    let state = AdminState {
        store,
        api_keys: Arc::new(api_keys),
    };

    Router::new()
        .route("/api/v1/zone", get(list_zones))
        .route("/api/v1/zone/{zone}", put(put_zone).delete(delete_zone))
        .route(
            "/api/v1/zone/{zone}/{record}",
            put(put_record).delete(delete_record),
        )
        .route("/api/v1/zone/{zone}/acme/health", get(acme_health))
        .route("/api/v1/zone/{zone}/acme/update", post(acme_update))
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .with_state(state)
}

/// Serve the admin API until the cancellation token fires.
pub async fn serve(
    config: &AdminConfig,
    store: Arc<dyn ZoneStore>,
    cancel: CancellationToken,
) -> Result<(), DnsError> {
    let listener = TcpListener::bind(config.listen_addr).await?;
    info!(addr = %listener.local_addr()?, "admin API listening");

    let app = router(store, config.api_keys.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

    info!("admin API stopped");
    Ok(())
}

async fn require_api_key(State(state): State<AdminState>, request: Request, next: Next) -> Response {
    let headers = request.headers();
    let key = headers
        .get(header::AUTHORIZATION)
        .or_else(|| headers.get("x-api-key"))
        .and_then(|value| value.to_str().ok());

    match key {
        None => (StatusCode::UNAUTHORIZED, "missing API key\n").into_response(),
        Some(key) if !state.api_keys.iter().any(|accepted| accepted == key) => {
            warn!("admin request with unrecognized API key");
            (StatusCode::FORBIDDEN, "invalid API key\n").into_response()
        }
        Some(_) => next.run(request).await,
    }
}

fn store_error(e: DnsError) -> Response {
    warn!(error = %e, "admin store operation failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
}

/// Reject zone names that cannot double as etcd key segments and file names.
fn checked_zone_name(raw: &str) -> Result<String, Response> {
    let name = normalize_name(raw);
    if name == "." || name.contains('/') || name.contains(char::is_whitespace) {
        return Err((StatusCode::BAD_REQUEST, format!("invalid zone name: {raw}")).into_response());
    }
    Ok(name)
}

async fn list_zones(State(state): State<AdminState>) -> Response {
    match state.store.list_zones().await {
        Ok(zones) => Json(zones).into_response(),
        Err(e) => store_error(e),
    }
}

async fn put_zone(State(state): State<AdminState>, Path(zone): Path<String>) -> Response {
    let zone = match checked_zone_name(&zone) {
        Ok(zone) => zone,
        Err(resp) => return resp,
    };
    match state.store.add_zone(&zone).await {
        Ok(()) => {
            info!(zone = %zone, "zone declared via admin API");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => store_error(e),
    }
}

async fn delete_zone(State(state): State<AdminState>, Path(zone): Path<String>) -> Response {
    let zone = match checked_zone_name(&zone) {
        Ok(zone) => zone,
        Err(resp) => return resp,
    };
    match state.store.remove_zone(&zone).await {
        Ok(()) => {
            info!(zone = %zone, "zone removed via admin API");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => store_error(e),
    }
}

async fn put_record(
    State(state): State<AdminState>,
    Path((zone, record_id)): Path<(String, String)>,
    body: String,
) -> Response {
    let zone = match checked_zone_name(&zone) {
        Ok(zone) => zone,
        Err(resp) => return resp,
    };

    let origin = match Name::from_ascii(&zone) {
        Ok(origin) => origin,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };
    let rr = match parse_rr_text(&body, &origin) {
        Ok(rr) => rr,
        Err(e) => {
            debug!(zone = %zone, error = %e, "rejected unparsable record");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    // Owners outside the zone would be unreachable through zone selection.
    let owner = rr.name().to_ascii().to_ascii_lowercase();
    if !owner.ends_with(&zone) {
        return (
            StatusCode::BAD_REQUEST,
            format!("owner {owner} is outside zone {zone}"),
        )
            .into_response();
    }

    match state.store.patch(&zone, StoredRecord::new(record_id, rr)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => store_error(e),
    }
}

async fn delete_record(
    State(state): State<AdminState>,
    Path((zone, record_id)): Path<(String, String)>,
) -> Response {
    let zone = match checked_zone_name(&zone) {
        Ok(zone) => zone,
        Err(resp) => return resp,
    };
    match state.store.delete(&zone, &record_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => store_error(e),
    }
}

async fn acme_health() -> StatusCode {
    StatusCode::OK
}

async fn acme_update(
    State(state): State<AdminState>,
    Path(zone): Path<String>,
    Json(update): Json<AcmeUpdate>,
) -> Response {
    let zone = match checked_zone_name(&zone) {
        Ok(zone) => zone,
        Err(resp) => return resp,
    };

    let owner = match Name::from_ascii(format!("{}.{}", update.subdomain, zone)) {
        Ok(owner) => owner,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };
    let rr = Record::from_rdata(owner, ACME_TXT_TTL, RData::TXT(TXT::new(vec![update.txt.clone()])));
    let record = StoredRecord::new(format!("acme-{}", update.subdomain), rr);
    match state.store.patch(&zone, record).await {
        Ok(()) => Json(AcmeResponse { txt: update.txt }).into_response(),
        Err(e) => store_error(e),
    }
}
