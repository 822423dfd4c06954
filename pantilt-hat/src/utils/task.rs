//! Defines the background task runner.
use std::future::Future;

use log::error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::errors::{Error, RuntimeError};

/// Represents the result of a task.
/// A task may return either () or Result<(), Error> for flexibility: both are converted to a
/// TaskResult. Failing tasks are logged.
pub enum TaskResult {
    Ok,
    Err(Error),
}

/// Represents a handler on a running task: aborting it cancels the task.
pub type TaskHandler = JoinHandle<()>;

impl From<Result<(), Error>> for TaskResult {
    fn from(result: Result<(), Error>) -> Self {
        match result {
            Ok(_) => TaskResult::Ok,
            Err(e) => TaskResult::Err(e),
        }
    }
}

impl From<()> for TaskResult {
    fn from(_: ()) -> Self {
        TaskResult::Ok
    }
}

/// Runs a given future as a tokio task on the current runtime.
///
/// # Parameters
/// * `future`: A future that implements `Future<Output = T>`, `Send`, and has a `'static` lifetime.
///
/// # Errors
/// * `RuntimeError`: the function is not called from within a tokio runtime.
///
/// # Example
/// ```
/// use pantilt_hat::utils::task;
///
/// #[tokio::main]
/// async fn main() {
///     let handler = task::run(async move {
///         // whatever
///     }).unwrap();
///     handler.await.unwrap();
/// }
/// ```
pub fn run<F, T>(future: F) -> Result<TaskHandler, Error>
where
    F: Future<Output = T> + Send + 'static,
    T: Into<TaskResult> + Send + 'static,
{
    let runtime = Handle::try_current().map_err(|_| RuntimeError)?;
    let handler = runtime.spawn(async move {
        if let TaskResult::Err(err) = future.await.into() {
            error!("Task failed: {}", err);
        }
    });
    Ok(handler)
}

#[macro_export]
macro_rules! pause {
    ($ms:expr) => {
        tokio::time::sleep(tokio::time::Duration::from_millis($ms as u64)).await
    };
}
