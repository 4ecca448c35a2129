pub mod session;

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::Response;
use tally_core::VoterIdentity;

use crate::config::{IdentityConfig, IdentityScheme};
use crate::error::AppError;
use crate::state::AppState;

/// The voter behind a request, identified per the configured scheme.
pub struct Voter {
    pub identity: VoterIdentity,
    /// `Set-Cookie` value for a session minted on this request.
    pub issued_cookie: Option<String>,
}

impl Voter {
    /// Attaches the session cookie, if one was minted, to `response`.
    pub fn attach_cookie(&self, response: &mut Response) {
        let Some(cookie) = &self.issued_cookie else {
            return;
        };
        match HeaderValue::from_str(cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::error!("Session cookie is not a valid header value: {e}"),
        }
    }
}

impl FromRequestParts<AppState> for Voter {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let config = &state.config.identity;
        match config.scheme {
            IdentityScheme::Ip => {
                let peer = parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| *addr);
                let ip = client_ip(config, &parts.headers, peer)
                    .ok_or_else(|| AppError::Internal("peer address unavailable".to_string()))?;
                Ok(Voter {
                    identity: VoterIdentity::new(ip)?,
                    issued_cookie: None,
                })
            }
            IdentityScheme::Session => {
                if let Some(session_id) = session::existing_session(config, &parts.headers) {
                    return Ok(Voter {
                        identity: VoterIdentity::new(session_id)?,
                        issued_cookie: None,
                    });
                }
                let issued = session::issue(config)?;
                Ok(Voter {
                    identity: VoterIdentity::new(issued.session_id)?,
                    issued_cookie: Some(issued.set_cookie),
                })
            }
        }
    }
}

/// Resolves the client IP, honouring `X-Forwarded-For` only when configured.
fn client_ip(config: &IdentityConfig, headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    if config.trust_forwarded_for {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return Some(ip.to_string());
        }
    }
    peer.map(|addr| addr.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> Option<SocketAddr> {
        Some(SocketAddr::from(([192, 0, 2, 10], 51000)))
    }

    fn forwarded(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn peer_ip_drops_port() {
        let config = IdentityConfig::default();
        assert_eq!(
            client_ip(&config, &HeaderMap::new(), peer()),
            Some("192.0.2.10".to_string())
        );
    }

    #[test]
    fn forwarded_for_ignored_unless_trusted() {
        let config = IdentityConfig::default();
        let headers = forwarded("203.0.113.5, 10.0.0.1");
        assert_eq!(client_ip(&config, &headers, peer()), Some("192.0.2.10".to_string()));
    }

    #[test]
    fn forwarded_for_first_hop_when_trusted() {
        let config = IdentityConfig {
            trust_forwarded_for: true,
            ..IdentityConfig::default()
        };
        let headers = forwarded("203.0.113.5, 10.0.0.1");
        assert_eq!(client_ip(&config, &headers, peer()), Some("203.0.113.5".to_string()));
    }

    #[test]
    fn no_peer_and_no_header_yields_none() {
        let config = IdentityConfig::default();
        assert_eq!(client_ip(&config, &HeaderMap::new(), None), None);
    }
}
