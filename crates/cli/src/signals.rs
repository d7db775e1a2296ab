//! Interrupt handling for the replay loop.
//!
//! The first SIGINT (Ctrl+C) or SIGTERM sets a flag that the replay loop
//! checks between revisions, so the revision in flight is finished and
//! checkpointed before the process exits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

/// Shared shutdown flag checked by the replay loop.
pub type ShutdownFlag = Arc<AtomicBool>;

/// Create a new shutdown flag and register OS signal handlers.
pub fn setup_signal_handlers() -> ShutdownFlag {
    let flag = Arc::new(AtomicBool::new(false));
    let flag_clone = flag.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => info!("received SIGINT (Ctrl+C), finishing current revision"),
                        _ = sigterm.recv() => info!("received SIGTERM, finishing current revision"),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed to register SIGTERM handler, listening for Ctrl+C only");
                    if ctrl_c.await.is_err() {
                        return;
                    }
                    info!("received SIGINT (Ctrl+C), finishing current revision");
                }
            }
        }

        #[cfg(not(unix))]
        {
            if ctrl_c.await.is_err() {
                warn!("failed to listen for Ctrl+C");
                return;
            }
            info!("received Ctrl+C, finishing current revision");
        }

        flag_clone.store(true, Ordering::SeqCst);
    });

    flag
}
