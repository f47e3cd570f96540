use log::debug;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// Exit status used after an interrupt, as shells do for SIGINT.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Tracks files that must not outlive an interrupted run
#[derive(Default)]
pub struct CleanupContext {
    #[cfg(test)]
    pub paths: Vec<PathBuf>,
    #[cfg(not(test))]
    paths: Vec<PathBuf>,
}

impl CleanupContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a path to be removed on interruption
    pub fn add(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    /// Remove all registered files
    pub fn cleanup(&self) {
        for path in &self.paths {
            debug!("Cleaning up: {:?}", path);
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Type alias for shared cleanup context
pub type SharedCleanupContext = Arc<Mutex<CleanupContext>>;

/// Create a new shared cleanup context
pub fn new_shared() -> SharedCleanupContext {
    Arc::new(Mutex::new(CleanupContext::new()))
}

/// Run the cleanup and exit when the process receives Ctrl-C or SIGTERM.
///
/// Abort the returned handle once the protected section has finished.
pub fn spawn_interrupt_handler(ctx: SharedCleanupContext) -> JoinHandle<()> {
    tokio::spawn(async move {
        if wait_for_interrupt().await {
            eprintln!("\nInterrupted, cleaning up...");
            if let Ok(ctx) = ctx.lock() {
                ctx.cleanup();
            }
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    })
}

/// Returns false when no signal handler could be installed.
async fn wait_for_interrupt() -> bool {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => tokio::select! {
                result = tokio::signal::ctrl_c() => result.is_ok(),
                _ = term.recv() => true,
            },
            Err(_) => tokio::signal::ctrl_c().await.is_ok(),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.is_ok()
    }
}
