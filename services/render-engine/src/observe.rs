//! Observation loop shared by the aggregators.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use types::events::Event;

/// Why an observation loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserveOutcome {
    /// The cancellation token fired.
    Cancelled,
    /// The producer closed the event stream.
    StreamClosed,
    /// The renderer has no event source to follow.
    NothingToObserve,
}

/// Fold every event from `events` in delivery order until the stream closes
/// or `cancel` fires.
///
/// Cancellation is checked before each receive, so a token that is already
/// cancelled stops the loop without folding anything further.
pub async fn run_observer<F>(
    renderer: &'static str,
    mut events: mpsc::Receiver<Event>,
    cancel: CancellationToken,
    mut fold: F,
) -> ObserveOutcome
where
    F: FnMut(Event) + Send,
{
    debug!(renderer, "Observing event source");
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!(renderer, "Cancelled, stop observing");
                return ObserveOutcome::Cancelled;
            }
            received = events.recv() => match received {
                Some(event) => fold(event),
                None => {
                    warn!(renderer, "Event stream closed, stop observing");
                    return ObserveOutcome::StreamClosed;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use types::events::EventPayload;

    fn rates() -> Event {
        Event::now(EventPayload::ExchangeRates { rates: vec![] })
    }

    #[tokio::test]
    async fn test_folds_until_stream_closed() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(rates()).await.unwrap();
        tx.send(rates()).await.unwrap();
        drop(tx);

        let mut folded = 0;
        let outcome = run_observer("test", rx, CancellationToken::new(), |_| folded += 1).await;

        assert_eq!(outcome, ObserveOutcome::StreamClosed);
        assert_eq!(folded, 2);
    }

    #[tokio::test]
    async fn test_cancel_stops_waiting_loop() {
        let (_tx, rx) = mpsc::channel::<Event>(8);
        let cancel = CancellationToken::new();
        let cancel2 = cancel.clone();

        let handle = tokio::spawn(async move { run_observer("test", rx, cancel2, |_| {}).await });

        cancel.cancel();
        assert_eq!(handle.await.unwrap(), ObserveOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_already_cancelled_folds_nothing() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(rates()).await.unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let folded = Arc::new(Mutex::new(0));
        let counter = folded.clone();
        let outcome = run_observer("test", rx, cancel, move |_| *counter.lock().unwrap() += 1).await;

        assert_eq!(outcome, ObserveOutcome::Cancelled);
        assert_eq!(*folded.lock().unwrap(), 0);
    }
}
