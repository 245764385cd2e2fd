use std::{future::Future, time::Duration};

use comms::{
    OnoReceiver, OnoSender,
    msg::{Command, Msg, Payload},
    specs::{AssignmentSpec, DegeneracyPolicy, OperatorSpec, Partition},
};
use futures::future::{join_all, try_join_all};
use log::{debug, error, info, warn};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    time,
};

use crate::{
    barrier,
    error::{CoordinatorError, Result},
    link::WorkerLink,
    partition,
    round::{Assembler, Phase, RoundOutput},
};

/// What every round of a `Coordinator` runs with.
#[derive(Debug, Clone)]
pub struct RoundPlan {
    /// Where workers obtain the response operator from.
    pub operator: OperatorSpec,
    pub degeneracy: DegeneracyPolicy,
    /// Upper bound for each phase, `None` waits forever.
    pub phase_timeout: Option<Duration>,
}

/// Drives forward/adjoint rounds over a fixed pool of workers.
///
/// The coordinator never computes, it plans partitions, assembles the slices the
/// workers send back and releases the barrier between both steps.
pub struct Coordinator<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    links: Vec<WorkerLink<R, W>>,
    plan: RoundPlan,
    shape: (usize, usize),
    round: u64,
    poisoned: bool,
}

impl<R, W> Coordinator<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Creates a new `Coordinator`.
    ///
    /// Only the shape of the operator is read here, never its values.
    ///
    /// # Arguments
    /// * `channels` - One channel per worker, worker ids are assigned in order starting at 1.
    /// * `plan` - The round configuration.
    ///
    /// # Returns
    /// A new `Coordinator` or an error if there are no workers or the operator
    /// can't be resolved.
    pub fn new(channels: Vec<(OnoReceiver<R>, OnoSender<W>)>, plan: RoundPlan) -> Result<Self> {
        if channels.is_empty() {
            return Err(CoordinatorError::Configuration(
                "at least one worker besides the coordinator is required".to_string(),
            ));
        }

        let shape = storage::operator_shape(&plan.operator)?;
        let links: Vec<_> = channels
            .into_iter()
            .enumerate()
            .map(|(i, (rx, tx))| WorkerLink::new(i + 1, rx, tx))
            .collect();

        info!(workers = links.len(), rows = shape.0, cols = shape.1; "coordinator ready");

        Ok(Self {
            links,
            plan,
            shape,
            round: 0,
            poisoned: false,
        })
    }

    /// The amount of workers.
    pub fn workers(&self) -> usize {
        self.links.len()
    }

    /// The `(rows, cols)` shape of the operator.
    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    /// Whether a previous round failed.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Runs one forward and adjoint round for `model`, every observed count being one.
    ///
    /// Any failure after dispatch aborts the round at every worker and poisons the
    /// coordinator, partial results are never returned.
    ///
    /// # Arguments
    /// * `model` - The model vector, one entry per operator column.
    ///
    /// # Returns
    /// The assembled forward projection and correction vectors.
    ///
    /// # Errors
    /// `Poisoned` if a previous round failed, `Configuration` if the model length is
    /// wrong, or whatever made the round fail.
    pub async fn run_round(&mut self, model: &[f64]) -> Result<RoundOutput> {
        self.round_with(model, None).await
    }

    /// Runs one round whose adjoint step weights row `i` by the observed count `counts[i]`.
    ///
    /// # Arguments
    /// * `model` - The model vector, one entry per operator column.
    /// * `counts` - The observed counts, one entry per operator row.
    ///
    /// # Errors
    /// Same as `run_round`, plus `Configuration` if the counts length is wrong.
    pub async fn run_weighted_round(&mut self, model: &[f64], counts: &[f64]) -> Result<RoundOutput> {
        self.round_with(model, Some(counts)).await
    }

    async fn round_with(&mut self, model: &[f64], counts: Option<&[f64]>) -> Result<RoundOutput> {
        if self.poisoned {
            return Err(CoordinatorError::Poisoned);
        }

        let (rows, cols) = self.shape;
        if model.len() != cols {
            return Err(CoordinatorError::Configuration(format!(
                "the model has {} entries but the operator has {cols} columns",
                model.len()
            )));
        }

        if let Some(got) = counts.map(<[f64]>::len).filter(|&got| got != rows) {
            return Err(CoordinatorError::Configuration(format!(
                "the counts have {got} entries but the operator has {rows} rows"
            )));
        }

        let row_parts = partition::plan(rows, self.links.len())?;
        let col_parts = partition::plan(cols, self.links.len())?;

        let round = self.round;
        self.round += 1;
        info!(round = round, workers = self.links.len(), weighted = counts.is_some(); "starting round");

        let inputs = RoundInputs { model, counts };
        match self.drive(round, inputs, &row_parts, &col_parts).await {
            Ok(output) => {
                info!(round = round, non_finite = output.non_finite.len(); "round completed");
                Ok(output)
            }
            Err(e) => {
                error!(round = round; "round failed: {e}");
                self.poisoned = true;
                let reason = format!("round {round} aborted: {e}");
                let _ = within(
                    self.plan.phase_timeout,
                    Phase::Barrier,
                    async {
                        barrier::abort(&mut self.links, &reason).await;
                        Ok(())
                    },
                )
                .await;
                Err(e)
            }
        }
    }

    /// Sends `Disconnect` to every worker.
    pub async fn close(mut self) -> Result<()> {
        let msg = Msg::Control(Command::Disconnect);
        settle(self.links.iter_mut().map(|link| link.send(&msg))).await?;

        info!(workers = self.links.len(); "disconnected from every worker");
        Ok(())
    }

    async fn drive(
        &mut self,
        round: u64,
        inputs: RoundInputs<'_>,
        row_parts: &[Partition],
        col_parts: &[Partition],
    ) -> Result<RoundOutput> {
        let timeout = self.plan.phase_timeout;

        within(timeout, Phase::Dispatch, self.dispatch(round, inputs, row_parts, col_parts)).await?;
        debug!(round = round; "dispatched assignments");

        let epsilon = within(timeout, Phase::Forward, self.gather(Phase::Forward, row_parts)).await?;
        self.check_degeneracy(&epsilon)?;

        within(
            timeout,
            Phase::Barrier,
            barrier::broadcast(&mut self.links, &epsilon),
        )
        .await?;

        let correction = within(timeout, Phase::Adjoint, self.gather(Phase::Adjoint, col_parts)).await?;

        let non_finite: Vec<_> = correction
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_finite())
            .map(|(j, _)| j)
            .collect();

        if !non_finite.is_empty() {
            warn!(round = round, count = non_finite.len(); "correction has non finite entries at {non_finite:?}");
        }

        Ok(RoundOutput {
            epsilon,
            correction,
            non_finite,
        })
    }

    /// Sends every worker its assignment followed by the full model vector and the counts, if any.
    async fn dispatch(
        &mut self,
        round: u64,
        inputs: RoundInputs<'_>,
        row_parts: &[Partition],
        col_parts: &[Partition],
    ) -> Result<()> {
        let plan = &self.plan;
        let model = Msg::Data(Payload::Model(inputs.model));
        let counts = inputs.counts.map(|counts| Msg::Data(Payload::Counts(counts)));

        let sends = self
            .links
            .iter_mut()
            .zip(row_parts.iter().zip(col_parts))
            .map(|(link, (&rows, &cols))| {
                let assign = Msg::Control(Command::Assign(AssignmentSpec {
                    worker_id: link.id,
                    round,
                    rows,
                    cols,
                    operator: plan.operator.clone(),
                    degeneracy: plan.degeneracy,
                    counts: counts.is_some(),
                }));
                let (model, counts) = (&model, counts.as_ref());

                async move {
                    link.send(&assign).await?;
                    link.send(model).await?;
                    match counts {
                        Some(counts) => link.send(counts).await,
                        None => Ok(()),
                    }
                }
            });

        settle(sends).await?;
        Ok(())
    }

    /// Receives the slice of every worker concurrently and assembles them by offset.
    ///
    /// The first failure cancels the pending receives, only the coordinator's read side is
    /// left mid frame and the round is poisoned anyway.
    async fn gather(&mut self, phase: Phase, parts: &[Partition]) -> Result<Vec<f64>> {
        let slices = try_join_all(self.links.iter_mut().map(|link| link.recv_slice(phase))).await?;

        let what = if phase == Phase::Forward { "epsilon" } else { "correction" };
        let mut assembler = Assembler::new(what, parts);
        for (worker_id, offset, values) in slices {
            assembler.insert(worker_id, offset, &values)?;
        }

        assembler.finish()
    }

    /// Applies the degeneracy policy to the assembled forward projection.
    fn check_degeneracy(&self, epsilon: &[f64]) -> Result<()> {
        let rows: Vec<_> = epsilon
            .iter()
            .enumerate()
            .filter(|(_, e)| **e == 0. || !e.is_finite())
            .map(|(i, _)| i)
            .collect();

        if rows.is_empty() {
            return Ok(());
        }

        match self.plan.degeneracy {
            DegeneracyPolicy::Reject => Err(CoordinatorError::NumericDegeneracy { rows }),
            _ => {
                warn!(count = rows.len(); "forward projection is degenerate at rows {rows:?}");
                Ok(())
            }
        }
    }
}

/// The inputs of a single round.
#[derive(Clone, Copy)]
struct RoundInputs<'a> {
    model: &'a [f64],
    counts: Option<&'a [f64]>,
}

/// Waits for every future, then returns the first failure in worker order.
///
/// Unlike `try_join_all` no send is dropped halfway through a frame, so the workers
/// that are still healthy can read the abort that follows.
pub(crate) async fn settle<F, T>(futs: impl IntoIterator<Item = F>) -> Result<Vec<T>>
where
    F: Future<Output = Result<T>>,
{
    join_all(futs).await.into_iter().collect()
}

/// Bounds `fut` by `timeout` when there is one.
///
/// A send cut short by the timeout may leave a partial frame behind, the abort that
/// follows a timeout is best effort.
async fn within<F, T>(timeout: Option<Duration>, phase: Phase, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout {
        Some(limit) => time::timeout(limit, fut)
            .await
            .map_err(|_| CoordinatorError::Timeout { phase })?,
        None => fut.await,
    }
}
