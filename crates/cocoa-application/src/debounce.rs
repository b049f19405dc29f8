//! Debounced trigger for typed queries.
//!
//! Each [`DebouncedTrigger::schedule`] call aborts the previous timer and
//! starts a new one. When the quiet period elapses, a [`Fired`] value is posted
//! to the owner's event queue; the owner hands it back to
//! [`DebouncedTrigger::accept`], which rejects anything superseded in between.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A timer that ran to completion, carrying the value it was scheduled with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired<T> {
    ticket: u64,
    pub value: T,
}

pub struct DebouncedTrigger<T, E> {
    delay: Duration,
    sender: mpsc::UnboundedSender<E>,
    ticket: u64,
    pending: bool,
    timer: Option<JoinHandle<()>>,
    _value: std::marker::PhantomData<fn(T)>,
}

impl<T, E> DebouncedTrigger<T, E>
where
    T: Send + 'static,
    E: From<Fired<T>> + Send + 'static,
{
    /// Creates a trigger that posts fired values to `sender` after `delay`.
    pub fn new(delay: Duration, sender: mpsc::UnboundedSender<E>) -> Self {
        Self {
            delay,
            sender,
            ticket: 0,
            pending: false,
            timer: None,
            _value: std::marker::PhantomData,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// (Re)starts the quiet period for `value`, superseding any earlier one.
    pub fn schedule(&mut self, value: T) {
        self.cancel();
        self.pending = true;

        let fired = Fired {
            ticket: self.ticket,
            value,
        };
        let delay = self.delay;
        let sender = self.sender.clone();
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = sender.send(E::from(fired));
        }));
    }

    /// Drops the scheduled invocation, including one already posted but not yet accepted.
    ///
    /// Returns whether anything was pending.
    pub fn cancel(&mut self) -> bool {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.ticket += 1;
        std::mem::replace(&mut self.pending, false)
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Returns the value of `fired` if it belongs to the latest schedule.
    pub fn accept(&mut self, fired: Fired<T>) -> Option<T> {
        if !self.pending || fired.ticket != self.ticket {
            tracing::trace!(ticket = fired.ticket, current = self.ticket, "superseded debounce fired");
            return None;
        }
        self.pending = false;
        self.timer = None;
        Some(fired.value)
    }
}

impl<T, E> Drop for DebouncedTrigger<T, E> {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Event(Fired<String>);

    impl From<Fired<String>> for Event {
        fn from(fired: Fired<String>) -> Self {
            Event(fired)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_changes_collapse_into_one_fire() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut trigger = DebouncedTrigger::<String, Event>::new(Duration::from_millis(300), tx);

        for text in ["b", "bu", "bud", "budg", "budget"] {
            trigger.schedule(text.to_string());
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let Event(fired) = rx.recv().await.unwrap();
        assert_eq!(trigger.accept(fired), Some("budget".to_string()));
        assert!(!trigger.is_pending());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_rejects_already_posted_fire() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut trigger = DebouncedTrigger::<String, Event>::new(Duration::from_millis(300), tx);

        trigger.schedule("stale".to_string());
        let Event(fired) = rx.recv().await.unwrap();

        assert!(trigger.cancel());
        assert_eq!(trigger.accept(fired), None);
        assert!(!trigger.cancel());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_quiet_period() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut trigger = DebouncedTrigger::<String, Event>::new(Duration::from_millis(300), tx);
        let started = tokio::time::Instant::now();

        trigger.schedule("q".to_string());
        let Event(fired) = rx.recv().await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(300));
        assert_eq!(trigger.accept(fired), Some("q".to_string()));
    }
}
