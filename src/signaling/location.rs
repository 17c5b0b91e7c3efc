//! Client location lookup
//!
//! Only a coarse descriptor is produced. A real GeoIP backend can be plugged
//! in through [`LocationResolver`].

use crate::types::Location;
use crate::utils::is_loopback;
use async_trait::async_trait;
use axum::http::HeaderMap;
use std::net::SocketAddr;
use tracing::debug;

/// Trait for resolving a client address to a location
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LocationResolver: Send + Sync {
    async fn resolve(&self, address: &str) -> Location;
}

/// Resolver without a database: loopback addresses map to the local
/// development location, everything else is unknown.
#[derive(Debug, Default, Clone, Copy)]
pub struct FallbackLocationResolver;

#[async_trait]
impl LocationResolver for FallbackLocationResolver {
    async fn resolve(&self, address: &str) -> Location {
        if is_loopback(address) {
            Location::local_development()
        } else {
            Location::unknown()
        }
    }
}

/// Best-effort client address: first `X-Forwarded-For` hop, then the peer address
pub fn client_address(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    match (forwarded, peer) {
        (Some(forwarded), _) => forwarded.to_string(),
        (None, Some(peer)) => peer.ip().to_string(),
        (None, None) => "unknown".to_string(),
    }
}

/// Resolve the location of a connecting client
pub async fn locate_client(
    resolver: &dyn LocationResolver,
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
) -> Location {
    let address = client_address(headers, peer);
    let location = resolver.resolve(&address).await;
    debug!("Resolved client address {} to {}", address, location.code);
    location
}
