use comms::{
    OnoReceiver, OnoSender,
    msg::{Msg, Payload},
    specs::AssignmentSpec,
};
use log::{debug, info, warn};
use ndarray::{Array1, Array2};
use tokio::{
    io::{self, AsyncRead, AsyncWrite},
    task,
};

use crate::{
    acceptor::WorkerAcceptor,
    compute,
    error::{Result, WorkerErr},
};

/// The operator blocks a worker needs for one round.
struct Blocks {
    rows: Array2<f64>,
    cols: Array2<f64>,
    nrows: usize,
}

/// The compute unit runtime.
///
/// Serves rounds one after the other over a single coordinator channel, no state
/// survives from one round to the next besides the receiving buffer.
pub struct Worker {
    rx_buf: Vec<u64>,
    rounds: u64,
}

impl Default for Worker {
    fn default() -> Self {
        Self::new()
    }
}

impl Worker {
    /// Creates a new `Worker`.
    pub fn new() -> Self {
        Self {
            rx_buf: Vec::new(),
            rounds: 0,
        }
    }

    /// Serves rounds until the coordinator disconnects.
    ///
    /// A round that fails for reasons local to it (the operator can't be loaded,
    /// the coordinator aborted it, ...) is reported and the worker waits for the next one.
    ///
    /// # Args
    /// * `rx` - Receiving end of the coordinator channel.
    /// * `tx` - Sending end of the coordinator channel.
    ///
    /// # Returns
    /// The amount of rounds completed.
    ///
    /// # Errors
    /// Returns `WorkerErr` on I/O failures or protocol violations.
    pub async fn run<R, W>(mut self, mut rx: OnoReceiver<R>, mut tx: OnoSender<W>) -> Result<u64>
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        while let Some(spec) = WorkerAcceptor::handshake(&mut rx, &mut self.rx_buf).await? {
            let (worker_id, round) = (spec.worker_id, spec.round);
            info!(worker_id = worker_id, round = round; "starting round");

            match self.round(spec, &mut rx, &mut tx).await {
                Ok(()) => {
                    self.rounds += 1;
                    info!(worker_id = worker_id, round = round; "round completed");
                }
                Err(WorkerErr::Aborted(reason)) => {
                    warn!(worker_id = worker_id, round = round; "round aborted: {reason}");
                }
                Err(e) if e.is_round_local() => {
                    warn!(worker_id = worker_id, round = round; "round failed: {e}");
                    let detail = format!("worker {worker_id}: {e}");
                    tx.send(&Msg::Err(detail.into())).await?;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(self.rounds)
    }

    /// Runs a single forward and adjoint round.
    async fn round<R, W>(
        &mut self,
        spec: AssignmentSpec,
        rx: &mut OnoReceiver<R>,
        tx: &mut OnoSender<W>,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let model = match rx.recv_into(&mut self.rx_buf).await? {
            Msg::Data(Payload::Model(model)) => Array1::from(model.to_vec()),
            Msg::Err(reason) => return Err(WorkerErr::Aborted(reason.into_owned())),
            msg => {
                return Err(WorkerErr::UnexpectedMessage {
                    stage: "waiting for the model",
                    got: msg.kind(),
                });
            }
        };

        let counts = if spec.counts {
            Some(self.recv_counts(rx).await?)
        } else {
            None
        };

        let blocks = Self::load_blocks(&spec, model.len()).await?;
        debug!(worker_id = spec.worker_id; "loaded operator blocks");

        let Blocks { rows, cols, nrows } = blocks;
        if let Some(got) = counts.as_ref().map(|c| c.len()).filter(|&got| got != nrows) {
            return Err(WorkerErr::LengthMismatch {
                what: "counts",
                got,
                expected: nrows,
            });
        }

        let background = spec.degeneracy.background();
        let epsilon = blocking(move || compute::forward(rows.view(), model.view(), background)).await?;

        let msg = Msg::Data(Payload::Epsilon {
            offset: spec.rows.offset,
            values: slice_of(&epsilon),
        });
        tx.send(&msg).await?;
        debug!(worker_id = spec.worker_id; "sent epsilon slice, waiting at barrier");

        let epsilon = match rx.recv_into(&mut self.rx_buf).await? {
            Msg::Data(Payload::Barrier(epsilon)) if epsilon.len() == nrows => {
                Array1::from(epsilon.to_vec())
            }
            Msg::Data(Payload::Barrier(epsilon)) => {
                return Err(WorkerErr::LengthMismatch {
                    what: "barrier epsilon",
                    got: epsilon.len(),
                    expected: nrows,
                });
            }
            Msg::Err(reason) => return Err(WorkerErr::Aborted(reason.into_owned())),
            msg => {
                return Err(WorkerErr::UnexpectedMessage {
                    stage: "waiting at the barrier",
                    got: msg.kind(),
                });
            }
        };

        let correction = blocking(move || {
            compute::adjoint(cols.view(), epsilon.view(), counts.as_ref().map(|c| c.view()))
        })
        .await?;

        let msg = Msg::Data(Payload::Correction {
            offset: spec.cols.offset,
            values: slice_of(&correction),
        });
        tx.send(&msg).await?;
        debug!(worker_id = spec.worker_id; "sent correction slice");

        Ok(())
    }

    /// Receives the observed counts that follow the model.
    async fn recv_counts<R>(&mut self, rx: &mut OnoReceiver<R>) -> Result<Array1<f64>>
    where
        R: AsyncRead + Unpin + Send,
    {
        match rx.recv_into(&mut self.rx_buf).await? {
            Msg::Data(Payload::Counts(counts)) => Ok(Array1::from(counts.to_vec())),
            Msg::Err(reason) => Err(WorkerErr::Aborted(reason.into_owned())),
            msg => Err(WorkerErr::UnexpectedMessage {
                stage: "waiting for the counts",
                got: msg.kind(),
            }),
        }
    }

    /// Resolves the operator on the blocking pool and loads this worker's row and column blocks.
    async fn load_blocks(spec: &AssignmentSpec, model_len: usize) -> Result<Blocks> {
        let operator = spec.operator.clone();
        let (rows, cols) = (spec.rows.range(), spec.cols.range());

        blocking(move || {
            let provider = storage::resolve_operator(&operator)?;
            let (nrows, ncols) = provider.shape();

            if model_len != ncols {
                return Err(WorkerErr::LengthMismatch {
                    what: "model",
                    got: model_len,
                    expected: ncols,
                });
            }

            Ok(Blocks {
                rows: provider.load_rows(rows)?,
                cols: provider.load_cols(cols)?,
                nrows,
            })
        })
        .await?
    }
}

/// Runs CPU bound work on tokio's blocking pool.
async fn blocking<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(f)
        .await
        .map_err(|e| WorkerErr::Io(io::Error::other(format!("compute join error: {e}"))))
}

/// The contiguous memory of a freshly computed vector.
fn slice_of(values: &Array1<f64>) -> &[f64] {
    values
        .as_slice()
        .unwrap_or_else(|| unreachable!("owned 1d arrays are contiguous"))
}
