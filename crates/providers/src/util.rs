//! Shared utility functions for provider handlers.

use mr_domain::error::{Error, Result};
use mr_domain::stream::{ApiStream, StreamEvent};
use serde_json::Value;

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeout errors map to [`Error::Timeout`]; everything else maps to
/// [`Error::Http`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Resolve an API key at call time.
///
/// Precedence:
/// 1. the configured option (when non-empty)
/// 2. the vendor's conventional environment variable
/// 3. [`Error::Auth`] naming both
pub(crate) fn resolve_api_key(
    configured: Option<&str>,
    option_name: &str,
    env_var: &str,
) -> Result<String> {
    if let Some(key) = configured.filter(|k| !k.is_empty()) {
        return Ok(key.to_string());
    }
    match std::env::var(env_var) {
        Ok(val) if !val.is_empty() => {
            tracing::debug!(env_var = %env_var, "API key resolved from environment");
            Ok(val)
        }
        _ => Err(Error::Auth(format!(
            "no API key configured: set '{option_name}' or the {env_var} environment variable"
        ))),
    }
}

/// Trim a configured base URL, or fall back to the vendor default.
pub(crate) fn base_url(configured: Option<&str>, default: &str) -> String {
    configured
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}

/// Send a request and turn any non-2xx status into [`Error::Provider`]
/// carrying the status code and response body.
pub(crate) async fn send_checked(
    provider: &str,
    request: Result<reqwest::RequestBuilder>,
) -> Result<reqwest::Response> {
    let resp = request?.send().await.map_err(from_reqwest)?;

    let status = resp.status();
    if !status.is_success() {
        let err_text = resp.text().await.map_err(from_reqwest)?;
        return Err(Error::Provider {
            provider: provider.to_string(),
            message: format!("HTTP {} - {}", status.as_u16(), err_text),
        });
    }
    Ok(resp)
}

/// Send a request and parse the response body as JSON.
pub(crate) async fn send_json(
    provider: &str,
    request: Result<reqwest::RequestBuilder>,
) -> Result<Value> {
    let resp = send_checked(provider, request).await?;
    let resp_text = resp.text().await.map_err(from_reqwest)?;
    Ok(serde_json::from_str(&resp_text)?)
}

/// The full text of a non-streaming reply plus optional usage.
#[derive(Debug, Default)]
pub(crate) struct Reply {
    pub text: String,
    pub usage: Option<StreamEvent>,
}

/// Build an [`ApiStream`] over a single blocking (non-streaming) call.
///
/// Yields exactly one text event with the whole reply, or none when the
/// vendor returned no content, followed by usage when reported.
pub(crate) fn json_stream<F>(
    provider: String,
    request: Result<reqwest::RequestBuilder>,
    extract: F,
) -> ApiStream
where
    F: FnOnce(&Value) -> Result<Reply> + Send + 'static,
{
    Box::pin(async_stream::try_stream! {
        let body = send_json(&provider, request).await?;
        let reply = extract(&body)?;
        if !reply.text.is_empty() {
            yield StreamEvent::Text { text: reply.text };
        }
        if let Some(usage) = reply.usage {
            yield usage;
        }
    })
}

/// A stream that fails immediately with `err` when polled.
pub(crate) fn failed_stream(err: Error) -> ApiStream {
    Box::pin(async_stream::stream! {
        yield Err(err);
    })
}

/// Redact an API key passed as a `key=` query parameter, for safe logging.
pub(crate) fn redact_url_key(url: &str) -> String {
    if let Some(idx) = url.find("key=") {
        let prefix = &url[..idx + 4];
        let rest = &url[idx + 4..];
        let end = rest.find('&').unwrap_or(rest.len());
        format!("{prefix}[REDACTED]{}", &rest[end..])
    } else {
        url.to_string()
    }
}

/// Read a `u32` field from a JSON object.
pub(crate) fn u32_field(v: &Value, name: &str) -> Option<u32> {
    v.get(name).and_then(|n| n.as_u64()).map(|n| n as u32)
}
