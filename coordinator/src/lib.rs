mod barrier;
pub mod config;
mod coordinator;
pub mod error;
mod link;
pub mod partition;
mod round;
mod session;

pub use config::CoordinatorConfig;
pub use coordinator::{Coordinator, RoundPlan};
pub use error::{CoordinatorError, Result};
pub use round::{Phase, RoundOutput};
pub use session::Session;

/// Connects to every configured worker and returns a session ready to run rounds.
///
/// # Errors
/// Returns a `CoordinatorError` if the configuration is invalid, a worker can't be
/// reached or the operator can't be resolved.
pub fn connect(config: CoordinatorConfig) -> Result<Session> {
    config.validate()?;
    log::info!("connecting to {} worker(s)", config.worker_addrs.len());
    Session::new(config)
}
