// rust/engine/src/oracle/timeout.rs
#![forbid(unsafe_code)]

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use crate::board::RawPlacement;

use super::base::{FaultKind, LegalityOracle, OracleFault, Verdict};

/// Bounds every call of an inner oracle by a wall-clock limit.
///
/// Each verdict is computed on a detached worker thread. If no answer arrives
/// within `limit` the call returns a `Timeout` fault at once; the worker is
/// abandoned and its late answer dropped. A verdict that arrives in time is
/// returned unchanged.
pub struct TimeoutOracle {
    inner: Arc<dyn LegalityOracle>,
    limit: Duration,
}

impl TimeoutOracle {
    pub fn new(inner: Arc<dyn LegalityOracle>, limit: Duration) -> Self {
        Self { inner, limit }
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }
}

impl LegalityOracle for TimeoutOracle {
    fn judge(&self, placement: &RawPlacement) -> Result<Verdict, OracleFault> {
        let (tx, rx) = mpsc::sync_channel(1);
        let inner = Arc::clone(&self.inner);
        let placement = *placement;
        thread::Builder::new()
            .name("oracle-call".to_string())
            .spawn(move || {
                // The receiver is gone once the caller gave up.
                let _ = tx.send(inner.judge(&placement));
            })
            .map_err(|e| {
                OracleFault::new(FaultKind::Internal, format!("cannot spawn oracle worker: {e}"))
            })?;

        match rx.recv_timeout(self.limit) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(OracleFault::new(
                FaultKind::Timeout,
                format!("no verdict within {:?}", self.limit),
            )),
            Err(RecvTimeoutError::Disconnected) => Err(OracleFault::new(
                FaultKind::Internal,
                "oracle worker exited without a verdict",
            )),
        }
    }

    fn name(&self) -> String {
        self.inner.name()
    }
}
