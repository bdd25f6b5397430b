//! # Run a single handler invocation.
//!
//! - **Derive a child token** from the dispatcher's token (isolated per invocation)
//! - **Apply timeout** if configured (wraps execution in `tokio::time::timeout`)
//! - **Catch panics** so the consumption loop survives a panicking handler
//!
//! ## Outcomes
//! ```text
//! handler → Ok(v)                → Ok(v)
//! handler → Err(e)               → Err(e)
//! handler panics                 → Err(Panicked { info })
//! timeout exceeded               → cancel child → Err(Timeout { timeout })
//! ```

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;

/// Executes one invocation produced by `call`, isolated from the caller's failure modes.
///
/// The child token passed to `call` is cancelled when `parent` is cancelled or
/// when the timeout expires. Cancelling the child never affects `parent`.
pub(crate) async fn run_once<T, Fut, F>(
    parent: &CancellationToken,
    timeout: Option<Duration>,
    call: F,
) -> Result<T, HandlerError>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<T, HandlerError>>,
{
    let child = parent.child_token();
    let guarded = AssertUnwindSafe(call(child.clone())).catch_unwind();

    let res = match timeout.filter(|d| *d > Duration::ZERO) {
        Some(dur) => match time::timeout(dur, guarded).await {
            Ok(r) => r,
            Err(_elapsed) => {
                child.cancel();
                return Err(HandlerError::Timeout { timeout: dur });
            }
        },
        None => guarded.await,
    };

    res.unwrap_or_else(|panic| {
        Err(HandlerError::Panicked {
            info: panic_message(&*panic),
        })
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ok_passes_through() {
        let token = CancellationToken::new();
        let res = run_once(&token, None, |_ctx| async { Ok::<_, HandlerError>(7) }).await;
        assert_eq!(res, Ok(7));
    }

    fn explode() -> Result<(), HandlerError> {
        panic!("boom")
    }

    #[tokio::test]
    async fn test_panic_is_caught() {
        let token = CancellationToken::new();
        let res = run_once(&token, None, |_ctx| async { explode() }).await;
        assert_eq!(
            res,
            Err(HandlerError::Panicked {
                info: "boom".to_string()
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_cancels_child_only() {
        let parent = CancellationToken::new();
        let (tx, rx) = tokio::sync::oneshot::channel();

        let res: Result<(), _> = run_once(&parent, Some(Duration::from_millis(50)), |ctx| async move {
            let _ = tx.send(ctx.clone());
            std::future::pending::<()>().await;
            Ok(())
        })
        .await;

        assert_eq!(
            res,
            Err(HandlerError::Timeout {
                timeout: Duration::from_millis(50)
            })
        );
        let child = rx.await.unwrap();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[tokio::test]
    async fn test_parent_cancel_reaches_child() {
        let parent = CancellationToken::new();
        parent.cancel();
        let res = run_once(&parent, None, |ctx| async move {
            if ctx.is_cancelled() {
                Err::<(), _>(HandlerError::Canceled)
            } else {
                Ok(())
            }
        })
        .await;
        assert_eq!(res, Err(HandlerError::Canceled));
    }
}
