//! The single bounded queue between producers (button threads, action
//! workers) and the menu state machine.

use crate::buttons::GestureEvent;
use crate::lock::lock_or_recover;
use crate::maintenance::{ActionOutcome, MaintenanceAction};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    Gesture(GestureEvent),
    ActionProgress {
        action: MaintenanceAction,
        line: String,
    },
    ActionCompleted(ActionOutcome),
}

impl ControllerEvent {
    fn is_terminal(&self) -> bool {
        matches!(self, ControllerEvent::ActionCompleted(_))
    }

    fn describe(&self) -> String {
        match self {
            ControllerEvent::Gesture(gesture) => {
                format!("{:?} on {}", gesture.kind, gesture.button)
            }
            ControllerEvent::ActionProgress { action, .. } => format!("{action} progress line"),
            ControllerEvent::ActionCompleted(outcome) => format!("{} completion", outcome.action),
        }
    }
}

struct BoundedEventQueue {
    capacity: usize,
    inner: Mutex<VecDeque<ControllerEvent>>,
    dropped: AtomicU64,
}

impl BoundedEventQueue {
    fn push(&self, event: ControllerEvent) {
        let mut queue = lock_or_recover(&self.inner, "event queue push");
        if queue.len() >= self.capacity {
            match queue.iter().position(|queued| !queued.is_terminal()) {
                Some(idx) => {
                    if let Some(evicted) = queue.remove(idx) {
                        self.record_drop(&evicted);
                    }
                }
                None if !event.is_terminal() => {
                    self.record_drop(&event);
                    return;
                }
                // Completions are always delivered, even past capacity.
                None => {}
            }
        }
        queue.push_back(event);
    }

    fn pop(&self) -> Option<ControllerEvent> {
        lock_or_recover(&self.inner, "event queue pop").pop_front()
    }

    fn record_drop(&self, event: &ControllerEvent) {
        let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(
            dropped_total = total,
            "event queue full; dropped {}",
            event.describe()
        );
    }
}

/// Create a queue holding at most `capacity` events (completions excepted).
pub fn event_queue(capacity: usize) -> (EventSender, EventReceiver) {
    let queue = Arc::new(BoundedEventQueue {
        capacity: capacity.max(1),
        inner: Mutex::new(VecDeque::with_capacity(capacity)),
        dropped: AtomicU64::new(0),
    });
    // One pending wake-up is enough; the consumer drains everything per wake.
    let (signal_tx, signal_rx) = bounded(1);
    (
        EventSender {
            queue: Arc::clone(&queue),
            signal_tx: signal_tx.clone(),
        },
        EventReceiver {
            queue,
            signal_rx,
            _keepalive: signal_tx,
        },
    )
}

/// Producer handle; cheap to clone into every button thread and worker.
#[derive(Clone)]
pub struct EventSender {
    queue: Arc<BoundedEventQueue>,
    signal_tx: Sender<()>,
}

impl EventSender {
    pub fn post(&self, event: ControllerEvent) {
        self.queue.push(event);
        let _ = self.signal_tx.try_send(());
    }

    pub fn dropped(&self) -> u64 {
        self.queue.dropped.load(Ordering::Relaxed)
    }
}

/// Consumer handle owned by the controller's actor loop.
pub struct EventReceiver {
    queue: Arc<BoundedEventQueue>,
    signal_rx: Receiver<()>,
    // Keeps the signal channel connected so waiting never degrades to spinning.
    _keepalive: Sender<()>,
}

impl EventReceiver {
    pub fn try_next(&self) -> Option<ControllerEvent> {
        self.queue.pop()
    }

    /// Next queued event, waiting at most `timeout` for one to arrive.
    pub fn next_timeout(&self, timeout: Duration) -> Option<ControllerEvent> {
        if let Some(event) = self.try_next() {
            return Some(event);
        }
        match self.signal_rx.recv_timeout(timeout) {
            Ok(()) => self.try_next(),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn dropped(&self) -> u64 {
        self.queue.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buttons::{ButtonId, GestureKind};
    use crate::maintenance::ActionStatus;
    use std::thread;
    use std::time::Instant;

    fn tap(button: ButtonId) -> ControllerEvent {
        ControllerEvent::Gesture(GestureEvent::new(button, GestureKind::Tap, Instant::now()))
    }

    fn completion() -> ControllerEvent {
        ControllerEvent::ActionCompleted(ActionOutcome {
            action: MaintenanceAction::UpdatePadd,
            status: ActionStatus::Success {
                message: "done".to_string(),
            },
            elapsed: Duration::ZERO,
        })
    }

    fn button_of(event: Option<ControllerEvent>) -> Option<ButtonId> {
        match event {
            Some(ControllerEvent::Gesture(gesture)) => Some(gesture.button),
            _ => None,
        }
    }

    #[test]
    fn full_queue_drops_the_oldest_event() {
        let (tx, rx) = event_queue(2);
        tx.post(tap(ButtonId::Button1));
        tx.post(tap(ButtonId::Button2));
        tx.post(tap(ButtonId::Button3));
        assert_eq!(tx.dropped(), 1);
        assert_eq!(rx.dropped(), 1);
        assert_eq!(button_of(rx.try_next()), Some(ButtonId::Button2));
        assert_eq!(button_of(rx.try_next()), Some(ButtonId::Button3));
        assert!(rx.try_next().is_none());
    }

    #[test]
    fn completions_survive_a_full_queue() {
        let (tx, rx) = event_queue(2);
        tx.post(completion());
        tx.post(tap(ButtonId::Button1));
        tx.post(tap(ButtonId::Button4));
        assert_eq!(rx.try_next(), Some(completion()));
        assert_eq!(button_of(rx.try_next()), Some(ButtonId::Button4));
    }

    #[test]
    fn completion_is_queued_even_past_capacity() {
        let (tx, rx) = event_queue(1);
        tx.post(completion());
        tx.post(tap(ButtonId::Button1));
        assert_eq!(tx.dropped(), 1);
        tx.post(completion());
        assert_eq!(rx.try_next(), Some(completion()));
        assert_eq!(rx.try_next(), Some(completion()));
        assert!(rx.try_next().is_none());
    }

    #[test]
    fn next_timeout_wakes_for_events_from_other_threads() {
        let (tx, rx) = event_queue(4);
        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            tx.post(tap(ButtonId::Button3));
        });
        let event = rx.next_timeout(Duration::from_secs(5));
        producer.join().expect("producer");
        assert_eq!(button_of(event), Some(ButtonId::Button3));
    }

    #[test]
    fn next_timeout_returns_none_when_idle() {
        let (_tx, rx) = event_queue(4);
        assert!(rx.next_timeout(Duration::from_millis(10)).is_none());
    }
}
