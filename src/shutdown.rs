use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Exit status used when the operator interrupts twice
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Turns an operator interrupt into cooperative cancellation of one run.
///
/// `Running -> ShutdownRequested` is one-way. Construct a new controller for
/// every batch; a controller is never reset.
#[derive(Debug, Clone, Default)]
pub struct ShutdownController {
    token: CancellationToken,
    requested: Arc<AtomicBool>,
}

impl ShutdownController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token to hand to the pool and reporting loop
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Request shutdown. Returns `true` only for the first request.
    pub fn request(&self) -> bool {
        let first = !self.requested.swap(true, Ordering::SeqCst);
        self.token.cancel();
        first
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Listen for Ctrl+C in the background.
    ///
    /// The first interrupt requests shutdown and lets in-flight jobs finish; a
    /// second one exits the process immediately.
    pub fn install(&self) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            if let Err(e) = signal::ctrl_c().await {
                warn!("Unable to listen for interrupts: {}", e);
                return;
            }
            info!("🛑 Interrupt received. Finishing in-flight downloads, press Ctrl+C again to abort.");
            controller.request();

            if signal::ctrl_c().await.is_ok() {
                warn!("Second interrupt received. Aborting now.");
                std::process::exit(INTERRUPTED_EXIT_CODE);
            }
        })
    }
}
