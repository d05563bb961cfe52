use std::future::Future;

use tokio::task::JoinHandle;
use tracing::debug;

/// Owned handle to a spawned background task.
///
/// Dropping the handle aborts the task, so a handle that goes out of scope can
/// never leave a timer or subscription running in the background. `abort` is
/// idempotent: once released the handle stays in the absent state.
#[derive(Debug)]
pub struct TaskHandle {
    name: &'static str,
    inner: Option<JoinHandle<()>>,
}

impl TaskHandle {
    pub fn spawn<F>(name: &'static str, fut: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        debug!(task = name, "spawn");
        Self {
            name,
            inner: Some(tokio::spawn(fut)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// True while the task has been neither aborted nor run to completion.
    pub fn is_live(&self) -> bool {
        self.inner.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Abort the task. Returns false if it had already been released.
    pub fn abort(&mut self) -> bool {
        match self.inner.take() {
            Some(handle) => {
                handle.abort();
                debug!(task = self.name, "abort");
                true
            }
            None => false,
        }
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::TaskHandle;

    #[tokio::test(start_paused = true)]
    async fn abort_is_idempotent() {
        let mut h = TaskHandle::spawn("sleeper", async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        assert!(h.is_live());
        assert!(h.abort());
        assert!(!h.abort());
        assert!(!h.is_live());
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels_pending_work() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let h = TaskHandle::spawn("late", async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            flag.store(true, Ordering::SeqCst);
        });
        drop(h);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!ran.load(Ordering::SeqCst));
    }
}
