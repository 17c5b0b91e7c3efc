//! Utility functions for the matchmaking service

use chrono::{DateTime, Utc};
use std::net::IpAddr;
use uuid::Uuid;

/// Generate a new unique room ID
pub fn generate_room_id() -> Uuid {
    Uuid::new_v4()
}

/// Generate a new unique connection ID
pub fn generate_connection_id() -> String {
    Uuid::new_v4().to_string()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Check whether an address string refers to the local machine
pub fn is_loopback(address: &str) -> bool {
    if address.eq_ignore_ascii_case("localhost") {
        return true;
    }

    // IPv4-mapped IPv6 addresses arrive as "::ffff:127.0.0.1"
    let trimmed = address.trim_start_matches("::ffff:");
    match trimmed.parse::<IpAddr>() {
        Ok(ip) => ip.is_loopback(),
        Err(_) => false,
    }
}
