//! Generic event-listener machinery shared by every component.
//!
//! Mirrors the teacher's `ResilienceEvent`/`EventListener` split: a trait for
//! "things that happened" plus a panic-isolated fan-out list of listeners.
//! Components in this workspace don't invent their own listener plumbing —
//! they register on the single [`crate::bus::EventSink`] produced at
//! orchestrator construction time.

#[cfg(feature = "tracing")]
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Trait for events emitted by orchestrator components.
pub trait OrchestratorEvent: Send + Sync + fmt::Debug {
    /// Event name as it appears on the bus (e.g. `"quota.exceeded"`).
    fn event_type(&self) -> &'static str;

    /// Monotonic time the event was recorded.
    fn timestamp(&self) -> Instant;
}

/// Trait for listening to orchestrator events.
pub trait EventListener<E: OrchestratorEvent>: Send + Sync {
    fn on_event(&self, event: &E);
}

pub type BoxedEventListener<E> = Arc<dyn EventListener<E>>;

/// A collection of event listeners, fanned out to on every emission.
#[derive(Clone)]
pub struct EventListeners<E: OrchestratorEvent> {
    listeners: Vec<BoxedEventListener<E>>,
}

impl<E: OrchestratorEvent> EventListeners<E> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Emits an event to all registered listeners.
    ///
    /// A panicking listener is caught and does not stop the remaining
    /// listeners from running. With `tracing` enabled the panic is logged;
    /// with `metrics` enabled a counter is incremented.
    pub fn emit(&self, event: &E) {
        for (index, listener) in self.listeners.iter().enumerate() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));

            if let Err(_panic_payload) = result {
                #[cfg(feature = "tracing")]
                log_listener_panic(index, event, _panic_payload.as_ref());

                #[cfg(feature = "metrics")]
                record_listener_panic_metric(event);

                #[cfg(not(feature = "tracing"))]
                let _ = index;

                #[cfg(not(any(feature = "tracing", feature = "metrics")))]
                let _ = _panic_payload;
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: OrchestratorEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// A function-based event listener, for quick ad-hoc subscriptions in tests.
pub struct FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    f: F,
    _phantom: std::marker::PhantomData<E>,
}

impl<E, F> FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: OrchestratorEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}

#[cfg(feature = "tracing")]
fn log_listener_panic<E: OrchestratorEvent>(
    index: usize,
    event: &E,
    panic_payload: &(dyn Any + Send),
) {
    let panic_message = panic_payload
        .downcast_ref::<&'static str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic_payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());

    tracing::warn!(
        listener_index = index,
        event_type = event.event_type(),
        panic_message = %panic_message,
        "orchestrator event listener panicked"
    );
}

#[cfg(feature = "metrics")]
fn record_listener_panic_metric<E: OrchestratorEvent>(event: &E) {
    let event_type_label = event.event_type().to_string();
    metrics::counter!(
        "orchestrator_event_listener_panics_total",
        "event_type" => event_type_label
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct TestEvent {
        timestamp: Instant,
    }

    impl OrchestratorEvent for TestEvent {
        fn event_type(&self) -> &'static str {
            "test"
        }

        fn timestamp(&self) -> Instant {
            self.timestamp
        }
    }

    #[test]
    fn emits_to_single_listener() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut listeners = EventListeners::new();
        listeners.add(FnListener::new(move |_event: &TestEvent| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        }));

        let event = TestEvent {
            timestamp: Instant::now(),
        };

        listeners.emit(&event);
        listeners.emit(&event);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn one_panicking_listener_does_not_block_others() {
        let successful = Arc::new(AtomicUsize::new(0));
        let successful_clone = Arc::clone(&successful);

        let mut listeners = EventListeners::new();
        listeners.add(FnListener::new(|_: &TestEvent| panic!("boom")));
        listeners.add(FnListener::new(move |_: &TestEvent| {
            successful_clone.fetch_add(1, Ordering::SeqCst);
        }));

        let event = TestEvent {
            timestamp: Instant::now(),
        };
        listeners.emit(&event);

        assert_eq!(successful.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn len_and_is_empty_track_registrations() {
        let mut listeners: EventListeners<TestEvent> = EventListeners::new();
        assert!(listeners.is_empty());
        listeners.add(FnListener::new(|_: &TestEvent| {}));
        assert_eq!(listeners.len(), 1);
        assert!(!listeners.is_empty());
    }
}
