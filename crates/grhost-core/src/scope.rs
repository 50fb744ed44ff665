use crate::events::ExitHook;
use crate::process::ProcessId;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Cancellation scope shared by all in-flight calls on the runtime channel.
///
/// Calls take a child of the current token. `invalidate` cancels the current
/// token, failing every outstanding call at once, and installs a fresh one for
/// calls issued afterwards.
#[derive(Default)]
pub struct CancellationScope {
    current: Mutex<CancellationToken>,
}

impl CancellationScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> CancellationToken {
        self.current.lock().child_token()
    }

    pub fn invalidate(&self) {
        let previous = std::mem::take(&mut *self.current.lock());
        previous.cancel();
    }
}

impl ExitHook for CancellationScope {
    fn on_process_exited(&self, pid: ProcessId) {
        debug!(pid = %pid, "Invalidating runtime call scope");
        self.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalidate_cancels_outstanding_tokens_only() {
        let scope = CancellationScope::new();
        let before = scope.token();

        scope.on_process_exited(ProcessId(1));
        let after = scope.token();

        assert!(before.is_cancelled());
        assert!(!after.is_cancelled());
    }
}
