//! Shared types for the portgate relay
//!
//! A `TunnelSpec` describes one forwarding entry point: a local address to
//! listen on and the remote address every accepted connection is relayed to.
//! Specs are parsed from the literal textual form `LOCAL_ADDR>REMOTE_ADDR`.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced while parsing tunnel spec strings
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("invalid tunnel spec: {0} (expected format: 0.0.0.0:9090>postgres:5432)")]
    InvalidFormat(String),
}

/// Static description of one forwarding entry point.
///
/// Created once at startup from configuration and never mutated. The only
/// supported transport is stream-oriented TCP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelSpec {
    /// Transport identifier; always `"tcp"`.
    pub network: String,
    /// Local bind address, e.g. `0.0.0.0:9090` or `:9090` for a wildcard bind.
    pub local_addr: String,
    /// Remote target address, e.g. `postgres:5432`.
    pub remote_addr: String,
}

impl TunnelSpec {
    /// Address to hand to the TCP listener. `:9090` binds every interface,
    /// same as `0.0.0.0:9090`.
    pub fn bind_addr(&self) -> String {
        if self.local_addr.starts_with(':') {
            format!("0.0.0.0{}", self.local_addr)
        } else {
            self.local_addr.clone()
        }
    }
}

impl FromStr for TunnelSpec {
    type Err = SpecError;

    /// Parse a `LOCAL_ADDR>REMOTE_ADDR` spec string.
    ///
    /// Exactly one `>` separator is required; anything else is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('>');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(local), Some(remote), None) => Ok(TunnelSpec {
                network: "tcp".to_string(),
                local_addr: local.to_string(),
                remote_addr: remote.to_string(),
            }),
            _ => Err(SpecError::InvalidFormat(s.to_string())),
        }
    }
}

impl fmt::Display for TunnelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}>{}", self.local_addr, self.remote_addr)
    }
}
