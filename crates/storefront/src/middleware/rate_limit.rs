//! Per-client rate limiting for cart mutations using governor and
//! `tower_governor`.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

/// Key extractor for the client address.
///
/// By default the key is the socket peer from `ConnectInfo`; request headers
/// are ignored because any client can set them. With `trust_proxy` the
/// server sits behind a reverse proxy that appends the address it saw to
/// `X-Forwarded-For`, so the right-most entry is used, then `X-Real-IP`,
/// then the peer.
#[derive(Clone, Copy, Debug, Default)]
pub struct ClientIpKeyExtractor {
    trust_proxy: bool,
}

impl ClientIpKeyExtractor {
    #[must_use]
    pub const fn new(trust_proxy: bool) -> Self {
        Self { trust_proxy }
    }
}

/// The hop appended by the nearest proxy.
fn forwarded_by_proxy(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.rsplit(',').next())
        .and_then(|s| s.trim().parse().ok())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse().ok())
        })
}

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        if self.trust_proxy
            && let Some(ip) = forwarded_by_proxy(req.headers())
        {
            return Ok(ip);
        }

        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Rate limiter for cart writes: one token per second, burst of 30.
///
/// # Panics
///
/// Never in practice: `per_second(1)` and `burst_size(30)` are both non-zero,
/// which is all `GovernorConfigBuilder::finish` checks.
#[must_use]
pub fn cart_rate_limiter(trust_proxy: bool) -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor::new(trust_proxy))
        .per_second(1)
        .burst_size(30)
        .finish()
        .expect("rate limiter config with per_second(1) and burst_size(30) is valid");
    GovernorLayer::new(Arc::new(config))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tower_governor::key_extractor::KeyExtractor;

    const PEER: &str = "192.0.2.10:51000";

    fn request(headers: &[(&str, &str)]) -> Request<()> {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let mut req = builder.body(()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(PEER.parse::<SocketAddr>().unwrap()));
        req
    }

    #[test]
    fn test_headers_ignored_without_trusted_proxy() {
        let req = request(&[
            ("x-forwarded-for", "203.0.113.7"),
            ("x-real-ip", "198.51.100.2"),
        ]);
        let ip = ClientIpKeyExtractor::default().extract(&req).unwrap();
        assert_eq!(ip.to_string(), "192.0.2.10");
    }

    #[test]
    fn test_trusted_proxy_uses_right_most_hop() {
        let req = request(&[
            ("x-forwarded-for", "1.2.3.4, 203.0.113.7"),
            ("x-real-ip", "198.51.100.2"),
        ]);
        let ip = ClientIpKeyExtractor::new(true).extract(&req).unwrap();
        assert_eq!(ip.to_string(), "203.0.113.7");
    }

    #[test]
    fn test_trusted_proxy_falls_back_to_real_ip_then_peer() {
        let req = request(&[("x-forwarded-for", "garbage"), ("x-real-ip", "198.51.100.2")]);
        let ip = ClientIpKeyExtractor::new(true).extract(&req).unwrap();
        assert_eq!(ip.to_string(), "198.51.100.2");

        let req = request(&[]);
        let ip = ClientIpKeyExtractor::new(true).extract(&req).unwrap();
        assert_eq!(ip.to_string(), "192.0.2.10");
    }

    #[test]
    fn test_missing_peer_is_an_error() {
        let req = Request::builder().uri("/").body(()).unwrap();
        assert!(ClientIpKeyExtractor::default().extract(&req).is_err());
    }
}
