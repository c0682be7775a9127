//! Ordered release of acquired resources.
//!
//! Whatever startup acquires is pushed here, and teardown unwinds it in
//! reverse. Each release gets its own deadline so one stuck collaborator
//! cannot hold up the rest of the drain.

use futures_util::future::BoxFuture;
use std::error::Error as StdError;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time;

type BoxError = Box<dyn StdError + Send + Sync>;
type ReleaseFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), BoxError>> + Send>;

#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("releasing {name} failed: {source}")]
    Failed {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("releasing {name} abandoned after {after:?}")]
    TimedOut { name: String, after: Duration },
}

#[derive(Default)]
pub struct ReleaseStack {
    entries: Vec<(String, ReleaseFn)>,
}

impl ReleaseStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<F, Fut, E>(&mut self, name: impl Into<String>, release: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: StdError + Send + Sync + 'static,
    {
        let release: ReleaseFn = Box::new(move || {
            Box::pin(async move { release().await.map_err(|e| Box::new(e) as BoxError) })
        });
        self.entries.push((name.into(), release));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run every release, newest first. Failures are logged and collected;
    /// they never stop the unwind.
    pub async fn unwind(mut self, timeout: Duration) -> Vec<ReleaseError> {
        let mut errors = Vec::new();
        while let Some((name, release)) = self.entries.pop() {
            match time::timeout(timeout, release()).await {
                Ok(Ok(())) => tracing::debug!(resource = %name, "Released"),
                Ok(Err(source)) => {
                    tracing::warn!(resource = %name, error = %source, "Release failed");
                    errors.push(ReleaseError::Failed { name, source });
                }
                Err(_) => {
                    tracing::warn!(resource = %name, timeout = ?timeout, "Release timed out, abandoning");
                    errors.push(ReleaseError::TimedOut { name, after: timeout });
                }
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> BoxFuture<'static, io::Result<()>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let record = move |name: &'static str| -> BoxFuture<'static, io::Result<()>> {
            let sink = Arc::clone(&sink);
            Box::pin(async move {
                sink.lock().unwrap().push(name);
                Ok(())
            })
        };
        (log, record)
    }

    #[tokio::test]
    async fn unwinds_in_reverse_order() {
        let (log, record) = recorder();
        let mut stack = ReleaseStack::new();
        for name in ["first", "second", "third"] {
            let fut = record(name);
            stack.push(name, move || fut);
        }
        assert_eq!(stack.len(), 3);

        let errors = stack.unwind(Duration::from_secs(1)).await;
        assert!(errors.is_empty());
        assert_eq!(*log.lock().unwrap(), vec!["third", "second", "first"]);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_and_timeouts_do_not_stop_unwind() {
        let (log, record) = recorder();
        let mut stack = ReleaseStack::new();

        let fut = record("bottom");
        stack.push("bottom", move || fut);
        stack.push("stuck", || async {
            std::future::pending::<()>().await;
            Ok::<(), io::Error>(())
        });
        stack.push("broken", || async { Err::<(), _>(io::Error::other("lease gone")) });

        let errors = stack.unwind(Duration::from_secs(2)).await;
        assert_eq!(errors.len(), 2);
        assert!(matches!(&errors[0], ReleaseError::Failed { name, .. } if name == "broken"));
        assert!(matches!(&errors[1], ReleaseError::TimedOut { name, .. } if name == "stuck"));
        assert_eq!(*log.lock().unwrap(), vec!["bottom"]);
    }
}
