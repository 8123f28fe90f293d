//! Background ticker task.

use crate::store::Inbound;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Shortest period accepted for any store timer
pub(crate) const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Submit a tick for `generation` every `period` until cancelled.
///
/// The first tick fires one full period after the task starts.
pub(crate) async fn run<A>(
    period: Duration,
    generation: u64,
    inbound: mpsc::UnboundedSender<Inbound<A>>,
    token: CancellationToken,
) {
    let period = period.max(MIN_PERIOD);
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = token.cancelled() => break,
            _ = interval.tick() => {
                if inbound.send(Inbound::Tick { generation }).is_err() {
                    break;
                }
            }
        }
    }
    tracing::trace!(generation, "Ticker stopped");
}
