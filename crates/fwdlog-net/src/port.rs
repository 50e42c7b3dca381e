//! Free-port search for test drivers.
//!
//! [`find_free_port`] has no hidden state: it probes each candidate by
//! binding and immediately releasing it. Another process can still grab the
//! port before the caller binds, so callers retry on
//! [`ReceiverError::Bind`](crate::receiver::ReceiverError::Bind).

use std::ops::Range;

use thiserror::Error;
use tracing::trace;

/// Default range for free-port searches.
pub const DEFAULT_PORT_RANGE: Range<u16> = 10000..20000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PortError {
    #[error("no free port on {host} in {start}..{end}")]
    Exhausted { host: String, start: u16, end: u16 },
}

/// Return the first port in `range` that `host` can bind right now.
pub fn find_free_port(host: &str, range: Range<u16>) -> Result<u16, PortError> {
    for port in range.clone() {
        match std::net::TcpListener::bind((host, port)) {
            Ok(_probe) => return Ok(port),
            Err(e) => trace!(port, error = %e, "port unavailable"),
        }
    }
    Err(PortError::Exhausted {
        host: host.to_string(),
        start: range.start,
        end: range.end,
    })
}
