//! Teardown routines and their aggregation.
//!
//! Factories may return a teardown routine alongside their capabilities.
//! The provisioner collects them into a single aggregate that runs all
//! routines concurrently on a best-effort basis: one failing teardown must
//! not prevent the others from draining their resources. Routines are
//! re-runnable — a snap goes idle once per cycle, and each cycle re-invokes
//! the same aggregate to drain whatever is open at that point.

use std::fmt;
use std::sync::Arc;

use futures::future::{BoxFuture, join_all};
use tracing::warn;

use crate::error::EndowmentResult;

type TeardownFn = dyn Fn() -> BoxFuture<'static, EndowmentResult<()>> + Send + Sync;

/// A repeatable asynchronous cleanup routine.
#[derive(Clone)]
pub struct Teardown {
    routines: Vec<Arc<TeardownFn>>,
}

impl Teardown {
    /// A teardown that does nothing.
    #[must_use]
    pub fn noop() -> Self {
        Self {
            routines: Vec::new(),
        }
    }

    /// Wrap a single routine.
    #[must_use]
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = EndowmentResult<()>> + Send + 'static,
    {
        Self {
            routines: vec![Arc::new(move || Box::pin(f()))],
        }
    }

    /// Aggregate many teardowns into one, preserving collection order.
    #[must_use]
    pub fn aggregate(parts: Vec<Teardown>) -> Self {
        Self {
            routines: parts.into_iter().flat_map(|t| t.routines).collect(),
        }
    }

    /// Number of underlying routines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routines.len()
    }

    /// Whether this teardown has no routines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routines.is_empty()
    }

    /// Run every routine concurrently, logging and swallowing failures.
    pub async fn run(&self) {
        let results = join_all(self.routines.iter().map(|routine| routine())).await;
        for (index, result) in results.into_iter().enumerate() {
            if let Err(e) = result {
                warn!(index, error = %e, "Endowment teardown routine failed");
            }
        }
    }
}

impl fmt::Debug for Teardown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Teardown")
            .field("routines", &self.routines.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::EndowmentError;

    #[tokio::test]
    async fn runs_all_routines_despite_failures() {
        let ran = Arc::new(AtomicUsize::new(0));

        let failing = Teardown::from_fn(|| async {
            Err(EndowmentError::Fetch {
                reason: "socket gone".to_string(),
            })
        });
        let counter = Arc::clone(&ran);
        let counting = Teardown::from_fn(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let aggregate = Teardown::aggregate(vec![failing, counting]);
        aggregate.run().await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn aggregate_is_rerunnable() {
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);
        let teardown = Teardown::from_fn(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        teardown.run().await;
        teardown.run().await;
        assert_eq!(ran.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn noop_is_empty() {
        let noop = Teardown::noop();
        assert!(noop.is_empty());
        noop.run().await;
    }
}
