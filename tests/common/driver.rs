//! Test-driver glue: port selection and waiting on the receiver.
//!
//! The free-port search is a pure function; the retry on a lost bind race
//! lives here, in the driver, and never inside the receiver.

use std::ops::Range;
use std::time::Duration;

use fwdlog::{find_free_port, Receiver, ReceiverError, DEFAULT_PORT_RANGE};

/// Upper bound for any wait in the harnesses.
pub const WAIT: Duration = Duration::from_secs(5);

/// Start a receiver on the first free port in `range`, moving past ports
/// that are lost to another process between probe and bind.
pub async fn start_receiver_in(range: Range<u16>) -> Receiver {
    let mut candidates = range;
    loop {
        let port = find_free_port("127.0.0.1", candidates.clone())
            .unwrap_or_else(|e| panic!("no port left to try: {e}"));
        match Receiver::start(port).await {
            Ok(rx) => return rx,
            Err(ReceiverError::Bind { .. }) => candidates = port + 1..candidates.end,
            Err(e) => panic!("unexpected receiver error: {e}"),
        }
    }
}

/// Start a receiver on the first free port in 10000..20000.
pub async fn start_receiver() -> Receiver {
    start_receiver_in(DEFAULT_PORT_RANGE).await
}

/// Give in-flight connections a moment to be drained, then snapshot.
///
/// Only for negative checks ("nothing arrived"); positive checks should use
/// `Receiver::wait_for`.
pub async fn settle(rx: &Receiver) -> Vec<fwdlog::EventRecord> {
    tokio::time::sleep(Duration::from_millis(100)).await;
    rx.get_received()
}
