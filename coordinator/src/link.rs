use comms::{
    OnoReceiver, OnoSender,
    msg::{Msg, Payload},
};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    error::{CoordinatorError, Result},
    round::Phase,
};

/// The coordinator's end of the channel with one worker.
pub(crate) struct WorkerLink<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub id: usize,
    rx: OnoReceiver<R>,
    tx: OnoSender<W>,
    buf: Vec<u64>,
}

impl<R, W> WorkerLink<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(id: usize, rx: OnoReceiver<R>, tx: OnoSender<W>) -> Self {
        Self {
            id,
            rx,
            tx,
            buf: Vec::new(),
        }
    }

    pub async fn send(&mut self, msg: &Msg<'_>) -> Result<()> {
        self.tx
            .send(msg)
            .await
            .map_err(|source| CoordinatorError::CommunicationFailure {
                worker_id: self.id,
                source,
            })
    }

    /// Receives the slice this worker reports in `phase`.
    ///
    /// # Returns
    /// The worker id, the slice offset and the slice values.
    ///
    /// # Errors
    /// `WorkerFailed` if the worker reports an error, `ProtocolViolation` for any
    /// other message and `CommunicationFailure` if the link breaks.
    pub async fn recv_slice(&mut self, phase: Phase) -> Result<(usize, usize, Vec<f64>)> {
        let id = self.id;
        let msg = self
            .rx
            .recv_into(&mut self.buf)
            .await
            .map_err(|source| CoordinatorError::CommunicationFailure {
                worker_id: id,
                source,
            })?;

        match (phase, msg) {
            (Phase::Forward, Msg::Data(Payload::Epsilon { offset, values }))
            | (Phase::Adjoint, Msg::Data(Payload::Correction { offset, values })) => {
                Ok((id, offset, values.to_vec()))
            }
            (_, Msg::Err(detail)) => Err(CoordinatorError::WorkerFailed {
                worker_id: id,
                detail: detail.into_owned(),
            }),
            (_, msg) => Err(CoordinatorError::ProtocolViolation {
                worker_id: id,
                detail: format!("unexpected {} during the {phase} phase", msg.kind()),
            }),
        }
    }
}
