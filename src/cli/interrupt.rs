//! Ctrl-C handling for `itemvault run`
//!
//! The first interrupt cancels the run: workers stop taking items, items in
//! flight finish, and the run is finalized as aborted. A second interrupt
//! exits right away.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::thread::{self, JoinHandle};

use crate::error::{VaultError, VaultResult};
use crate::queue::CancelToken;

type Interrupt = Pin<Box<dyn Future<Output = io::Result<()>> + Send>>;

/// Exit status of a process stopped by SIGINT
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Cancel `token` when the user presses Ctrl-C
pub fn cancel_on_interrupt(token: CancelToken) -> VaultResult<()> {
    watch(token, || -> Interrupt { Box::pin(tokio::signal::ctrl_c()) })?;
    Ok(())
}

fn watch<F>(token: CancelToken, mut next_interrupt: F) -> VaultResult<JoinHandle<()>>
where
    F: FnMut() -> Interrupt + Send + 'static,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| VaultError::Io(format!("Failed to start interrupt handler: {}", e)))?;

    thread::Builder::new()
        .name("interrupt".into())
        .spawn(move || {
            if let Err(e) = runtime.block_on(next_interrupt()) {
                log::warn!("Ctrl-C handling unavailable: {}", e);
                return;
            }
            log::warn!("Interrupted; finishing items in flight (Ctrl-C again to quit now)");
            token.cancel();

            if runtime.block_on(next_interrupt()).is_ok() {
                log::error!("Interrupted again, exiting");
                std::process::exit(INTERRUPTED_EXIT_CODE);
            }
        })
        .map_err(|e| VaultError::Io(format!("Failed to start interrupt handler: {}", e)))
}
