use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use futures::Future;
use futures::FutureExt;

use crate::{AppError, AppResult};

fn panic_payload(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn app_error_from_panic(payload: Box<dyn Any + Send>) -> AppError {
    let message = panic_payload(payload.as_ref());
    tracing::error!(target: "tallybook", message = %message, "panic_caught");
    AppError::new("RUNTIME/PANIC", message)
}

/// Run a closure and convert a panic into a structured error instead of
/// unwinding through the mutation boundary.
pub fn dispatch_with_fence<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> T,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => Ok(result),
        Err(payload) => Err(app_error_from_panic(payload)),
    }
}

pub async fn dispatch_async_with_fence<F, Fut, T>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let fut = dispatch_with_fence(|| AssertUnwindSafe(f()).catch_unwind())?;
    match fut.await {
        Ok(value) => Ok(value),
        Err(payload) => Err(app_error_from_panic(payload)),
    }
}

pub async fn dispatch_async_app_result<F, Fut, T>(f: F) -> AppResult<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    dispatch_async_with_fence(f).await?
}
