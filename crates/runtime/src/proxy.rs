//! HTTP plumbing between the application and the dev server.

use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use tracing::debug;

use crate::error::Result;

/// A request to forward to the dev server.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
	pub method: Method,
	/// Path including the query string, e.g. `/VAADIN/build/app.js?v=1`.
	pub path: String,
	pub headers: HeaderMap,
	pub body: Bytes,
}

impl ProxyRequest {
	/// A `GET` request without headers or body.
	pub fn get(path: impl Into<String>) -> Self {
		Self {
			method: Method::GET,
			path: path.into(),
			headers: HeaderMap::new(),
			body: Bytes::new(),
		}
	}

	/// Path component without the query string.
	pub fn path_only(&self) -> &str {
		self.path.split_once('?').map_or(self.path.as_str(), |(path, _)| path)
	}
}

/// The dev server's answer.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
	pub status: StatusCode,
	pub headers: HeaderMap,
	pub body: Bytes,
}

impl ProxyResponse {
	pub fn forbidden() -> Self {
		Self {
			status: StatusCode::FORBIDDEN,
			headers: HeaderMap::new(),
			body: Bytes::new(),
		}
	}
}

/// Client used to talk to the dev server: no system proxy, no redirects.
pub fn client(timeout: Duration) -> Result<Client> {
	Ok(Client::builder()
		.no_proxy()
		.redirect(reqwest::redirect::Policy::none())
		.connect_timeout(timeout)
		.timeout(timeout)
		.build()?)
}

fn url(port: u16, path: &str) -> String {
	format!("http://127.0.0.1:{}{}", port, path)
}

/// Returns true if anything answers HTTP on `port`. Any status counts.
pub async fn probe(client: &Client, port: u16) -> bool {
	match client.get(url(port, "/")).send().await {
		Ok(response) => {
			debug!(target = "flowdev.devserver", port, status = %response.status(), "probe answered");
			true
		}
		Err(e) => {
			debug!(target = "flowdev.devserver", port, error = %e, "probe failed");
			false
		}
	}
}

/// Asks the dev server to shut itself down.
pub async fn send_stop(client: &Client, port: u16, timeout: Duration) {
	if let Err(e) = client.get(url(port, "/stop")).timeout(timeout).send().await {
		debug!(target = "flowdev.devserver", port, error = %e, "dev server /stop request failed");
	}
}

/// Rejects paths that could escape the served directory.
pub fn is_path_unsafe(path: &str) -> bool {
	let decoded = path
		.to_ascii_lowercase()
		.replace("%2e", ".")
		.replace("%2f", "/")
		.replace("%5c", "\\");
	decoded.contains('\\') || decoded.split('/').any(|segment| segment == "..")
}

/// Forwards a request to the dev server.
///
/// Returns `None` when the server cannot be reached or answers 404; any other
/// status is handed back with its headers and body.
pub async fn forward(client: &Client, port: u16, request: ProxyRequest) -> Option<ProxyResponse> {
	if is_path_unsafe(request.path_only()) {
		debug!(target = "flowdev.devserver", path = %request.path, "refusing unsafe path");
		return Some(ProxyResponse::forbidden());
	}

	let mut headers = HeaderMap::with_capacity(request.headers.len() + 1);
	for (name, value) in &request.headers {
		if name == header::HOST
			|| name == header::CONNECTION
			|| name == header::CONTENT_LENGTH
			|| name == header::TRANSFER_ENCODING
		{
			continue;
		}
		headers.append(name.clone(), value.clone());
	}
	headers.insert(header::CONNECTION, HeaderValue::from_static("close"));

	debug!(target = "flowdev.devserver", method = %request.method, path = %request.path, port, "forwarding to dev server");

	let response = match client
		.request(request.method, url(port, &request.path))
		.headers(headers)
		.body(request.body)
		.send()
		.await
	{
		Ok(response) => response,
		Err(e) => {
			debug!(target = "flowdev.devserver", port, error = %e, "dev server request failed");
			return None;
		}
	};

	let status = response.status();
	if status == StatusCode::NOT_FOUND {
		debug!(target = "flowdev.devserver", path = %request.path, "resource not served by dev server");
		return None;
	}

	let mut headers = response.headers().clone();
	headers.remove(header::TRANSFER_ENCODING);

	let body = match response.bytes().await {
		Ok(body) => body,
		Err(e) => {
			debug!(target = "flowdev.devserver", port, error = %e, "failed to read dev server response");
			return None;
		}
	};

	Some(ProxyResponse { status, headers, body })
}
