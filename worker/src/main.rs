use std::{env, io};

use log::{error, info};
use tokio::{net::TcpListener, signal};

use worker::Worker;

const DEFAULT_HOST: &str = "127.0.0.1";

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let addr = format!(
        "{}:{}",
        env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
        env::var("PORT").map_err(io::Error::other)?,
    );

    let list = TcpListener::bind(&addr).await?;
    info!("listening at {addr}");

    tokio::select! {
        ret = serve(&list) => ret?,
        _ = signal::ctrl_c() => {
            info!("received SIGTERM");
        }
    }

    Ok(())
}

/// Serves coordinators one at a time, a finished session frees the worker for the next one.
async fn serve(list: &TcpListener) -> io::Result<()> {
    loop {
        let (stream, addr) = list.accept().await?;
        let (rx, tx) = stream.into_split();
        let (rx, tx) = comms::channel(rx, tx);
        info!("coordinator connected from {addr}");

        match Worker::new().run(rx, tx).await {
            Ok(rounds) => info!(rounds = rounds; "coordinator {addr} disconnected"),
            Err(e) => error!("session with {addr} failed: {e}"),
        }
    }
}
