use std::io;

use comms::{
    OnoReceiver,
    msg::{Command, Msg},
    specs::AssignmentSpec,
};
use log::{info, warn};
use tokio::io::AsyncRead;

/// Waits for the coordinator to open a round.
pub struct WorkerAcceptor;

impl WorkerAcceptor {
    /// Receives `Assign(AssignmentSpec)` and returns the spec.
    ///
    /// Leftover abort notices from a previous round are skipped.
    ///
    /// # Args
    /// * `rx` - Receiving end of the coordinator channel.
    /// * `buf` - The receiving buffer.
    ///
    /// # Returns
    /// Returns `Ok(Some(spec))` on `Assign`.
    /// Returns `Ok(None)` if `Disconnect` is received instead.
    ///
    /// # Errors
    /// Returns `io::Error` if receiving fails.
    pub async fn handshake<R>(
        rx: &mut OnoReceiver<R>,
        buf: &mut Vec<u64>,
    ) -> io::Result<Option<AssignmentSpec>>
    where
        R: AsyncRead + Unpin + Send,
    {
        loop {
            match rx.recv_into(buf).await? {
                Msg::Control(Command::Assign(spec)) => return Ok(Some(spec)),
                Msg::Control(Command::Disconnect) => {
                    info!("received Disconnect, exiting");
                    return Ok(None);
                }
                Msg::Err(detail) => warn!("ignoring abort outside of a round: {detail}"),
                msg => warn!("expected Assign, got {}", msg.kind()),
            }
        }
    }
}
