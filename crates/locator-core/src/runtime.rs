use std::future::Future;

use anyhow::{Context, Result};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::manager::LocationManager;
use crate::source::{LocationSource, SourceEvents};

/// Runs the manager's event loop until `shutdown` resolves or the source is
/// exhausted. Source events and timer firings are handled one at a time on the
/// calling task. The manager is torn down before returning, also on error.
pub async fn drive<S, E, F>(mgr: &mut LocationManager<S>, events: &mut E, shutdown: F) -> Result<()>
where
    S: LocationSource,
    E: SourceEvents,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    let res = loop {
        let deadline = mgr.next_deadline();
        tokio::select! {
            _ = &mut shutdown => {
                info!("runtime: shutdown requested");
                break Ok(());
            }
            _ = sleep_until(deadline) => {
                debug!("runtime: timer due");
                mgr.poll_timers();
            }
            ev = events.next_event() => match ev {
                Ok(Some(ev)) => mgr.handle(ev),
                Ok(None) => {
                    info!("runtime: source exhausted");
                    break Ok(());
                }
                Err(e) => break Err(e).context("location source failed"),
            },
        }
    };

    mgr.shutdown();
    res
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}
