//! Debounce primitive
//!
//! `Debouncer` is a pure state machine over explicit instants; `debounced`
//! lifts it onto a stream so a keystroke stream becomes a stream of settled
//! values.

use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::time::{sleep_until, Instant};

/// Holds the latest value until it has been stable for `window`
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    window: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(window: Duration) -> Self {
        Self { window, pending: None }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a new value, replacing any unsettled one and restarting the window
    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now));
    }

    /// Instant at which the pending value settles
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, at)| *at + self.window)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Take the pending value if it has been stable for the full window
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match self.deadline() {
            Some(deadline) if now >= deadline => self.pending.take().map(|(value, _)| value),
            _ => None,
        }
    }

    /// Take the pending value regardless of the window
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|(value, _)| value)
    }
}

enum Step<T> {
    Input(Option<T>),
    Elapsed,
}

/// Emit an item only once `input` has been quiet for `window`.
///
/// Intermediate items are dropped. A value still pending when the input ends
/// is emitted after its window elapses.
pub fn debounced<S>(input: S, window: Duration) -> impl Stream<Item = S::Item>
where
    S: Stream,
{
    async_stream::stream! {
        let mut input = std::pin::pin!(input);
        let mut debouncer = Debouncer::new(window);

        loop {
            let deadline = debouncer.deadline();
            let step = tokio::select! {
                item = input.next() => Step::Input(item),
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => Step::Elapsed,
            };

            match step {
                Step::Input(Some(value)) => debouncer.push(value, Instant::now()),
                Step::Input(None) => {
                    if let Some(deadline) = debouncer.deadline() {
                        sleep_until(deadline).await;
                    }
                    if let Some(value) = debouncer.flush() {
                        yield value;
                    }
                    break;
                }
                Step::Elapsed => {
                    if let Some(value) = debouncer.poll(Instant::now()) {
                        yield value;
                    }
                }
            }
        }
    }
}
