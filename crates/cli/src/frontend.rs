//! Local HTTP front end.
//!
//! Every request is bound to a session from the `flowdev-session` cookie and
//! touched under the session lock. Asset requests are then forwarded to the
//! dev server; anything it does not handle is a 404.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use flowdev::SessionStore;
use flowdev_runtime::{DevServerConfig, DevServerRegistry, ProxyRequest, ProxyResponse};
use tracing::{debug, warn};

pub const SESSION_COOKIE: &str = "flowdev-session";

/// Largest request body forwarded to the dev server.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
	pub sessions: Arc<SessionStore>,
	pub registry: Arc<DevServerRegistry>,
	pub config: Arc<DevServerConfig>,
}

pub fn router(state: AppState) -> Router {
	Router::new().fallback(handle).with_state(state)
}

/// Extracts the session id from the request cookies.
pub fn session_id(headers: &HeaderMap) -> Option<String> {
	headers
		.get_all(COOKIE)
		.iter()
		.filter_map(|value| value.to_str().ok())
		.flat_map(|value| value.split(';'))
		.filter_map(|pair| pair.trim().split_once('='))
		.find(|(name, _)| *name == SESSION_COOKIE)
		.map(|(_, value)| value.to_string())
		.filter(|value| !value.is_empty())
}

async fn handle(State(state): State<AppState>, request: Request) -> Response {
	let started = Instant::now();
	let (parts, body) = request.into_parts();

	let cookie = session_id(&parts.headers);
	let (session, created) = state.sessions.get_or_create(cookie.as_deref());
	if let Err(e) = session.run_with_lock(|guard| guard.set_last_request_timestamp(started)) {
		warn!(target = "flowdev.cli", error = %e, "cannot lock session");
		return (StatusCode::INTERNAL_SERVER_ERROR, "session unavailable").into_response();
	}

	let path = parts
		.uri
		.path_and_query()
		.map(|p| p.as_str().to_string())
		.unwrap_or_else(|| "/".to_string());

	let forwarded = if state.config.is_dev_mode_request(parts.uri.path()) {
		match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
			Ok(body) => {
				state
					.registry
					.forward(ProxyRequest {
						method: parts.method.clone(),
						path: path.clone(),
						headers: parts.headers.clone(),
						body,
					})
					.await
			}
			Err(e) => {
				debug!(target = "flowdev.cli", error = %e, "failed to read request body");
				return (StatusCode::PAYLOAD_TOO_LARGE, "request body too large").into_response();
			}
		}
	} else {
		None
	};

	let mut response = match forwarded {
		Some(proxied) => proxied_response(proxied),
		None => {
			debug!(target = "flowdev.cli", method = %parts.method, path = %path, "not handled");
			(StatusCode::NOT_FOUND, "Not found").into_response()
		}
	};

	if let Err(e) = session.run_with_lock(|guard| guard.set_last_request_duration(started.elapsed())) {
		warn!(target = "flowdev.cli", error = %e, "cannot record request duration");
	}

	if created {
		let cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, session.id());
		if let Ok(value) = HeaderValue::from_str(&cookie) {
			response.headers_mut().append(SET_COOKIE, value);
		}
	}

	response
}

fn proxied_response(proxied: ProxyResponse) -> Response {
	let mut response = Response::new(Body::from(proxied.body));
	*response.status_mut() = proxied.status;
	*response.headers_mut() = proxied.headers;
	response
}
