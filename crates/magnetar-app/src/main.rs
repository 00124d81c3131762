#![forbid(unsafe_code)]

//! Binary entrypoint that wires the Magnetar services together and runs the
//! polling loops until shutdown.

use magnetar_app::{AppResult, run_app};

/// Bootstraps the Magnetar application and blocks until shutdown.
#[tokio::main]
async fn main() -> AppResult<()> {
    run_app().await
}
