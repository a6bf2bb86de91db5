use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::{
    error::AppError,
    handlers::{user_agent, ClientAddr},
    models::email_tracking::{OpenContext, TrackingHealth, TrackingStats},
    services::email_tracking::{resolve_client_ip, TRANSPARENT_PNG},
    state::AppState,
};

const PIXEL_SUFFIX: &str = ".png";

/// Always answers 200 with the same image, whether or not the token is
/// known, so the endpoint cannot be used to discover valid tokens.
pub async fn tracking_pixel(
    State(state): State<AppState>,
    ClientAddr(peer): ClientAddr,
    headers: HeaderMap,
    Path(file): Path<String>,
) -> Response {
    if let Some(token) = file.strip_suffix(PIXEL_SUFFIX) {
        record_open(&state, token, &headers, peer).await;
    }
    pixel_response()
}

async fn record_open(
    state: &AppState,
    token: &str,
    headers: &HeaderMap,
    peer: Option<std::net::SocketAddr>,
) {
    if !state.config.tracking.enabled {
        return;
    }
    let context = OpenContext {
        ip_address: resolve_client_ip(headers, peer),
        user_agent: user_agent(headers),
    };
    let open = match state.tracking().record_open(token, &context).await {
        Ok(Some(open)) => open,
        Ok(None) => return,
        Err(err) => {
            tracing::error!(error = %err, "Failed to record email open");
            return;
        }
    };

    if state.config.tracking.send_instant_report {
        let notifications = state.notifications();
        state
            .notifier
            .submit(async move { notifications.send_open_notification(&open).await })
            .await;
    }
}

pub fn pixel_response() -> Response {
    let mut response = (StatusCode::OK, TRANSPARENT_PNG.to_vec()).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate, private, max-age=0"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    headers.insert(
        HeaderName::from_static("x-accel-expires"),
        HeaderValue::from_static("0"),
    );
    headers.insert(
        HeaderName::from_static("surrogate-control"),
        HeaderValue::from_static("no-store"),
    );
    response
}

pub async fn tracking_health(State(state): State<AppState>) -> Json<TrackingHealth> {
    Json(TrackingHealth {
        status: "UP".into(),
        tracking_enabled: state.config.tracking.enabled,
    })
}

pub async fn tracking_stats(State(state): State<AppState>) -> Result<Json<TrackingStats>, AppError> {
    Ok(Json(state.tracking().stats().await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn pixel_response_disables_every_cache() {
        let response = pixel_response();
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "image/png");
        assert_eq!(
            headers[header::CACHE_CONTROL],
            "no-cache, no-store, must-revalidate, private, max-age=0"
        );
        assert_eq!(headers[header::PRAGMA], "no-cache");
        assert_eq!(headers[header::EXPIRES], "0");
        assert_eq!(headers["x-accel-expires"], "0");
        assert_eq!(headers["surrogate-control"], "no-store");

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], &TRANSPARENT_PNG[..]);
    }
}
