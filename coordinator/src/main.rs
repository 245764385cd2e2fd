use std::{env, path::Path};

use anyhow::{Context, Result, bail};
use log::{info, warn};

use coordinator::CoordinatorConfig;

const CORRECTION_TENSOR: &str = "correction";

fn main() -> Result<()> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let Some(config_path) = args.next() else {
        bail!("usage: coordinator <config.json> [correction.safetensors]");
    };
    let output_path = args.next();

    let config = CoordinatorConfig::from_file(Path::new(&config_path))?;
    let mut session = coordinator::connect(config).context("couldn't start the session")?;

    let round = session.run_round();
    if let Err(e) = session.close() {
        warn!("couldn't disconnect every worker: {e}");
    }
    let output = round.context("round failed")?;

    info!(
        rows = output.epsilon.len(),
        cols = output.correction.len(),
        non_finite = output.non_finite.len();
        "round finished"
    );

    if let Some(path) = output_path {
        storage::save_model(Path::new(&path), CORRECTION_TENSOR, &output.correction)?;
        info!("correction written to {path}");
    }

    Ok(())
}
