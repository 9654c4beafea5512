//! Close-gate chain: async guards that can veto a window close.
//!
//! Gates run one at a time in registration order. The first denial, failure
//! or timeout stops the chain and nothing is closed. Gates that passed are
//! consumed; the gate that stopped the chain and those behind it stay
//! registered for the next attempt.

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tracing::debug;

use crate::error::CloseGateError;

/// Default time a single gate may take before counting as a denial.
pub const DEFAULT_GATE_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of a single gate: `Ok(true)` allows the close.
pub type GateResult = Result<bool, Box<dyn StdError + Send + Sync>>;

/// A guard consulted before a window closes.
#[async_trait]
pub trait CloseGate: Send + Sync {
    async fn check(&self) -> GateResult;
}

/// Adapts an async closure into a [`CloseGate`].
pub struct FnGate<F>(F);

impl<F> FnGate<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> CloseGate for FnGate<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = GateResult> + Send + 'static,
{
    async fn check(&self) -> GateResult {
        (self.0)().await
    }
}

/// Ordered set of close gates owned by one window.
pub struct CloseGateChain {
    gates: VecDeque<Box<dyn CloseGate>>,
    timeout: Duration,
}

impl Default for CloseGateChain {
    fn default() -> Self {
        Self::new(DEFAULT_GATE_TIMEOUT)
    }
}

impl std::fmt::Debug for CloseGateChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloseGateChain")
            .field("gates", &self.gates.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CloseGateChain {
    pub fn new(timeout: Duration) -> Self {
        Self {
            gates: VecDeque::new(),
            timeout,
        }
    }

    pub fn register(&mut self, gate: impl CloseGate + 'static) {
        self.gates.push_back(Box::new(gate));
    }

    /// Registers an async closure as a gate.
    pub fn register_fn<F, Fut>(&mut self, f: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = GateResult> + Send + 'static,
    {
        self.register(FnGate::new(f));
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    /// Drains the chain. `Ok(())` means every gate allowed the close.
    pub async fn run(&mut self) -> Result<(), CloseGateError> {
        let mut index = 0;
        while let Some(gate) = self.gates.pop_front() {
            let verdict = match timeout(self.timeout, gate.check()).await {
                Ok(Ok(true)) => None,
                Ok(Ok(false)) => Some(CloseGateError::Denied { index }),
                Ok(Err(e)) => Some(CloseGateError::Failed {
                    index,
                    reason: e.to_string(),
                }),
                Err(_) => Some(CloseGateError::TimedOut {
                    index,
                    timeout: self.timeout,
                }),
            };

            if let Some(err) = verdict {
                debug!(error = %err, remaining = self.gates.len() + 1, "close gate stopped the chain");
                self.gates.push_front(gate);
                return Err(err);
            }
            index += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_gate(calls: &Arc<AtomicUsize>, allow: bool) -> impl CloseGate + 'static {
        let calls = Arc::clone(calls);
        FnGate::new(move || {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(allow)
            }
        })
    }

    #[tokio::test]
    async fn test_empty_chain_allows() {
        let mut chain = CloseGateChain::default();
        assert!(chain.run().await.is_ok());
    }

    #[tokio::test]
    async fn test_passing_chain_is_consumed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut chain = CloseGateChain::default();
        chain.register(counting_gate(&calls, true));
        chain.register(counting_gate(&calls, true));

        assert!(chain.run().await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(chain.is_empty());

        assert!(chain.run().await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_denial_short_circuits_in_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let later = Arc::new(AtomicUsize::new(0));
        let mut chain = CloseGateChain::default();
        chain.register(counting_gate(&calls, true));
        chain.register(counting_gate(&calls, false));
        chain.register(counting_gate(&later, true));

        let err = chain.run().await.unwrap_err();
        assert_eq!(err, CloseGateError::Denied { index: 1 });
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(later.load(Ordering::SeqCst), 0);
        // passed gate consumed; denier and follower kept
        assert_eq!(chain.len(), 2);
    }

    #[tokio::test]
    async fn test_failing_gate_counts_as_denial() {
        let mut chain = CloseGateChain::default();
        chain.register_fn(|| async { Err("editor still dirty".into()) });

        let err = chain.run().await.unwrap_err();
        assert!(matches!(err, CloseGateError::Failed { index: 0, ref reason } if reason == "editor still dirty"));
        assert_eq!(chain.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_gate_times_out() {
        let mut chain = CloseGateChain::new(Duration::from_secs(5));
        chain.register_fn(|| std::future::pending::<GateResult>());

        let err = chain.run().await.unwrap_err();
        assert_eq!(
            err,
            CloseGateError::TimedOut {
                index: 0,
                timeout: Duration::from_secs(5)
            }
        );
    }
}
