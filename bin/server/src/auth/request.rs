//! Values derived from the incoming request.

use axum::{
    extract::{ConnectInfo, FromRef, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use fedgate_sso::SsoError;
use rootcause::Report;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use super::AppState;

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
const X_FORWARDED_HOST: &str = "x-forwarded-host";

/// Used when the peer address is not known.
pub const UNKNOWN_IP: &str = "unknown";

/// Extractor for the caller's IP address.
///
/// Forwarding headers are honoured only when the server is configured to
/// trust them; otherwise the socket peer address is used.
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = Arc::<AppState>::from_ref(state);
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(ClientIp(client_ip(
            &parts.headers,
            peer,
            app_state.trust_forwarded_headers,
        )))
    }
}

fn first_header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Determines the caller's IP.
#[must_use]
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded: bool) -> String {
    if trust_forwarded {
        if let Some(ip) = first_header_value(headers, X_FORWARDED_FOR)
            .or_else(|| first_header_value(headers, X_REAL_IP))
        {
            return ip.to_string();
        }
    }

    peer.map_or_else(|| UNKNOWN_IP.to_string(), |addr| addr.ip().to_string())
}

/// Determines the externally visible API origin, without a trailing slash.
///
/// A configured URL wins; otherwise the origin is rebuilt from `Host`.
/// `X-Forwarded-Proto` and `X-Forwarded-Host` take precedence only when
/// `trust_forwarded` is set.
///
/// # Errors
///
/// Returns `InvalidSettings` when nothing names the host.
pub fn api_base(
    headers: &HeaderMap,
    configured: Option<&str>,
    trust_forwarded: bool,
) -> Result<String, Report<SsoError>> {
    if let Some(url) = configured.map(str::trim).filter(|u| !u.is_empty()) {
        return Ok(url.trim_end_matches('/').to_string());
    }

    let forwarded = |name| {
        if trust_forwarded {
            first_header_value(headers, name)
        } else {
            None
        }
    };
    let scheme = forwarded(X_FORWARDED_PROTO).unwrap_or("http");
    let host = forwarded(X_FORWARDED_HOST)
        .or_else(|| first_header_value(headers, axum::http::header::HOST.as_str()))
        .ok_or_else(|| SsoError::InvalidSettings {
            details: "cannot determine the api url: no host header and no api_url configured"
                .to_string(),
        })?;

    Ok(format!("{scheme}://{host}"))
}
