use comms::{OnoReceiver, OnoSender, specs::ModelSpec};
use log::info;
use tokio::{
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    runtime::Runtime,
};

use storage::StorageErr;

use crate::{
    config::CoordinatorConfig,
    coordinator::Coordinator,
    error::{CoordinatorError, Result},
    round::RoundOutput,
};

type NetRx = OnoReceiver<OwnedReadHalf>;
type NetTx = OnoSender<OwnedWriteHalf>;

/// A blocking handle over a coordinator connected to its workers through TCP.
///
/// It owns the runtime the coordinator runs on, so it can be driven from synchronous code.
pub struct Session {
    runtime: Runtime,
    coordinator: Coordinator<OwnedReadHalf, OwnedWriteHalf>,
    model: ModelSpec,
    counts: Option<ModelSpec>,
}

impl Session {
    /// Creates a new `Session`.
    ///
    /// # Arguments
    /// * `config` - A validated coordinator configuration.
    ///
    /// # Returns
    /// A new `Session` connected to every worker or an error if any of them is unreachable.
    pub(crate) fn new(config: CoordinatorConfig) -> Result<Self> {
        let runtime = Runtime::new()?;
        let channels = runtime.block_on(Self::open_channels(&config.worker_addrs))?;
        let coordinator = Coordinator::new(channels, config.round_plan())?;

        Ok(Self {
            runtime,
            coordinator,
            model: config.model,
            counts: config.counts,
        })
    }

    /// Loads the configured model, and the observed counts if any, and runs one round with them.
    ///
    /// # Returns
    /// The round output or the error that made it fail.
    ///
    /// # Errors
    /// A loaded vector whose length doesn't fit the operator is a `StorageErr::ShapeMismatch`,
    /// reported before anything is sent to the workers.
    pub fn run_round(&mut self) -> Result<RoundOutput> {
        let (rows, cols) = self.coordinator.shape();
        let model = load_vector(&self.model, "model", cols)?;

        match &self.counts {
            Some(spec) => {
                let counts = load_vector(spec, "counts", rows)?;
                self.runtime
                    .block_on(self.coordinator.run_weighted_round(&model, &counts))
            }
            None => self.runtime.block_on(self.coordinator.run_round(&model)),
        }
    }

    /// The underlying coordinator.
    pub fn coordinator(&self) -> &Coordinator<OwnedReadHalf, OwnedWriteHalf> {
        &self.coordinator
    }

    /// Disconnects every worker.
    pub fn close(self) -> Result<()> {
        let Self {
            runtime,
            coordinator,
            ..
        } = self;

        runtime.block_on(coordinator.close())
    }

    /// Connects to every worker in order.
    ///
    /// # Arguments
    /// * `addrs` - The network addresses of the workers.
    ///
    /// # Returns
    /// The communication channels or the first connection failure.
    async fn open_channels(addrs: &[String]) -> Result<Vec<(NetRx, NetTx)>> {
        let mut channels = Vec::with_capacity(addrs.len());

        for (i, addr) in addrs.iter().enumerate() {
            let stream = TcpStream::connect(addr.as_str()).await.map_err(|source| {
                CoordinatorError::CommunicationFailure {
                    worker_id: i + 1,
                    source,
                }
            })?;

            let (rx, tx) = stream.into_split();
            channels.push(comms::channel(rx, tx));
            info!(worker_id = i + 1; "connected to worker at {addr}");
        }

        Ok(channels)
    }
}

/// Loads the vector described by `spec` and checks it has `expected` entries.
fn load_vector(spec: &ModelSpec, what: &'static str, expected: usize) -> Result<Vec<f64>> {
    let values = storage::resolve_model(spec).load()?;
    if values.len() != expected {
        return Err(StorageErr::ShapeMismatch {
            what,
            got: values.len(),
            expected,
        }
        .into());
    }

    Ok(values)
}
