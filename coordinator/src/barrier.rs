use std::borrow::Cow;

use comms::msg::{Msg, Payload};
use futures::future::join_all;
use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{coordinator::settle, error::Result, link::WorkerLink};

/// Broadcasts the complete forward projection to every worker.
///
/// No worker may start its adjoint step before receiving this, so it must only
/// be called once every epsilon slice has been assembled.
///
/// # Arguments
/// * `links` - Every worker link.
/// * `epsilon` - The assembled forward projection.
///
/// # Errors
/// Returns `CommunicationFailure` for the first link that fails, once every send has finished.
pub(crate) async fn broadcast<R, W>(links: &mut [WorkerLink<R, W>], epsilon: &[f64]) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let msg = Msg::Data(Payload::Barrier(epsilon));
    settle(links.iter_mut().map(|link| link.send(&msg))).await?;

    debug!(len = epsilon.len(), workers = links.len(); "barrier released");
    Ok(())
}

/// Tells every worker to abandon the current round.
///
/// Delivery is best effort, the links may already be broken.
pub(crate) async fn abort<R, W>(links: &mut [WorkerLink<R, W>], reason: &str)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let msg = Msg::Err(Cow::Borrowed(reason));
    let results = join_all(links.iter_mut().map(|link| link.send(&msg))).await;

    for e in results.into_iter().filter_map(|ret| ret.err()) {
        warn!("couldn't deliver abort: {e}");
    }
}
