use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{EngineError, EngineResult};

/// Cooperative cancellation flag shared between a caller and running simulations.
///
/// Clones share the same flag. Simulations poll it between angles or steps,
/// so cancellation takes effect at the next check, never mid-step.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    pub(crate) fn check(&self) -> EngineResult<()> {
        if self.is_cancelled() {
            Err(EngineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Poll an optional token.
pub(crate) fn check_cancelled(token: Option<&CancellationToken>) -> EngineResult<()> {
    match token {
        Some(token) => token.check(),
        None => Ok(()),
    }
}
