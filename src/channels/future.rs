use crate::error::{Error, Result};
use futures::future::BoxFuture;
use std::future::{Future, IntoFuture};
use tokio::sync::oneshot;
use tracing::debug;

/// Single-assignment result of one concurrent retrieval.
///
/// The producing task writes its `Result` once into a oneshot slot. The write
/// never waits for a reader, so a future that is dropped unread does not hold
/// its task back. Resolving consumes the future, so it can be read at most once.
#[derive(Debug)]
pub struct ResultFuture<T> {
    label: String,
    rx: oneshot::Receiver<Result<T>>,
}

impl<T: Send + 'static> ResultFuture<T> {
    /// Run `task` on the tokio runtime and capture its outcome
    pub fn spawn<F>(label: impl Into<String>, task: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let label = label.into();
        let (tx, rx) = oneshot::channel();
        let task_label = label.clone();

        tokio::spawn(async move {
            let result = task.await;
            if let Err(e) = &result {
                debug!("{} retrieval failed: {}", task_label, e);
            }
            if tx.send(result).is_err() {
                debug!("{} result dropped without a reader", task_label);
            }
        });

        Self { label, rx }
    }

    /// A future that is already resolved with `result`
    #[must_use]
    pub fn ready(label: impl Into<String>, result: Result<T>) -> Self {
        let (tx, rx) = oneshot::channel();
        // receiver is held below, send cannot fail
        let _ = tx.send(result);
        Self {
            label: label.into(),
            rx,
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Wait for the producing task and take its value or error
    ///
    /// # Errors
    ///
    /// Returns the retrieval error, or `Error::Custom` if the task ended
    /// (e.g. panicked) before writing a result
    pub async fn resolve(self) -> Result<T> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::Custom(format!(
                "{} retrieval ended without a result",
                self.label
            ))),
        }
    }

    /// Wait for the task and keep only its error, discarding any value
    pub async fn error(self) -> Option<Error> {
        self.resolve().await.err()
    }
}

impl<T: Send + 'static> IntoFuture for ResultFuture<T> {
    type Output = Result<T>;
    type IntoFuture = BoxFuture<'static, Result<T>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.resolve())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_resolves_value() {
        let future = ResultFuture::spawn("numbers", async { Ok::<_, Error>(vec![1, 2, 3]) });
        assert_eq!(future.await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_error_only_reader_sees_error() {
        let future: ResultFuture<Vec<u8>> =
            ResultFuture::spawn("events", async { Err(Error::Custom("boom".to_string())) });
        let error = future.error().await;
        assert!(matches!(error, Some(Error::Custom(msg)) if msg == "boom"));
    }

    #[tokio::test]
    async fn test_task_completes_without_reader() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();

        let future = ResultFuture::spawn("unread", async move {
            flag.store(true, Ordering::SeqCst);
            Ok::<_, Error>(vec!["x".to_string()])
        });
        drop(future);

        tokio::time::timeout(Duration::from_secs(1), async {
            while !finished.load(Ordering::SeqCst) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("producer should finish without a reader");
    }

    #[tokio::test]
    async fn test_panicking_task_resolves_as_error() {
        let future: ResultFuture<u8> = ResultFuture::spawn("panics", async {
            if true {
                panic!("task blew up");
            }
            Ok::<_, Error>(0)
        });
        let result = future.resolve().await;
        assert!(matches!(result, Err(Error::Custom(_))));
    }

    #[tokio::test]
    async fn test_ready_future() {
        let future = ResultFuture::ready("cached", Ok(7_u32));
        assert_eq!(future.label(), "cached");
        assert_eq!(future.await.unwrap(), 7);
    }
}
