use std::future::Future;

use crate::prelude::*;

/// Run `op`, retrying once with a fresh attempt when the store reports a
/// transient failure. A second transient failure surfaces as
/// [`Error::Transient`].
pub async fn retry_once<T, F, Fut>(name: &str, mut op: F) -> Result<T>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T>>,
{
  match op().await {
    Err(err) if err.is_transient() => {
      warn!("{name}: transient storage failure, retrying: {err}");
      op().await.map_err(|err| match err {
        Error::Transient(_) => err,
        err if err.is_transient() => Error::Transient(err.to_string()),
        err => err,
      })
    }
    other => other,
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use sea_orm::{DbErr, RuntimeErr};

  use super::*;

  fn locked() -> Error {
    Error::Db(DbErr::Exec(RuntimeErr::Internal("database is locked".into())))
  }

  #[tokio::test]
  async fn retries_transient_failure_once() {
    let calls = &AtomicUsize::new(0);
    let result = retry_once("test", move || async move {
      match calls.fetch_add(1, Ordering::SeqCst) {
        0 => Err(locked()),
        _ => Ok(7),
      }
    })
    .await;

    assert_eq!(result.unwrap(), 7);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn second_transient_failure_is_surfaced() {
    let calls = &AtomicUsize::new(0);
    let result: Result<()> = retry_once("test", move || async move {
      calls.fetch_add(1, Ordering::SeqCst);
      Err(locked())
    })
    .await;

    assert!(matches!(result, Err(Error::Transient(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn domain_errors_are_not_retried() {
    let calls = &AtomicUsize::new(0);
    let result: Result<()> = retry_once("test", move || async move {
      calls.fetch_add(1, Ordering::SeqCst);
      Err(Error::TrialAlreadyUsed)
    })
    .await;

    assert!(matches!(result, Err(Error::TrialAlreadyUsed)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }
}
