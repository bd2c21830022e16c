//! Turn scheduler: paced, cancellable reveal of one batch.
//!
//! A [`Reveal`] hands out the items of a batch strictly in the order they were
//! given, waiting the configured delay between consecutive items. Cancelling
//! its token ends the sequence at the next suspension point; nothing queued
//! after that point is ever yielded.

use futures::Stream;
use std::collections::VecDeque;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub struct Reveal<T> {
    queue: VecDeque<T>,
    delay: Duration,
    cancel: CancellationToken,
    started: bool,
}

impl<T> Reveal<T> {
    pub fn new(items: impl IntoIterator<Item = T>, delay: Duration, cancel: CancellationToken) -> Self {
        Self {
            queue: items.into_iter().collect(),
            delay,
            cancel,
            started: false,
        }
    }

    /// Yields the next item, or `None` once the batch is exhausted or cancelled.
    ///
    /// The first item is yielded immediately; each later one after `delay`.
    pub async fn next(&mut self) -> Option<T> {
        if self.cancel.is_cancelled() {
            self.queue.clear();
            return None;
        }
        if self.queue.is_empty() {
            return None;
        }

        if self.started && !self.delay.is_zero() {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.queue.clear();
                    return None;
                }
                _ = tokio::time::sleep(self.delay) => {}
            }
        }

        self.started = true;
        self.queue.pop_front()
    }

    /// Turns the reveal into a lazy stream of items.
    pub fn into_stream(self) -> impl Stream<Item = T>
    where
        T: Send,
    {
        futures::stream::unfold(self, |mut reveal| async move {
            let item = reveal.next().await?;
            Some((item, reveal))
        })
    }
}
