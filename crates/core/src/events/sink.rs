//! Where category and association events go.
//!
//! Tree writes emit one lifecycle event after commit (`category.created`,
//! `category.moved`, ...). Association writes emit a before/after pair around
//! the store call: `categorizable.associating` / `categorizable.associated`
//! and `categorizable.detaching` / `categorizable.detached`. Typical listeners
//! re-index entities in search, warm category pages or write audit rows.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::DomainEvent;

/// Receives category and association events from the services.
///
/// `emit()` runs on the caller's task between the write and the return of the
/// service call, so it must not block and must not fail the operation.
pub trait DomainEventSink: Send + Sync {
    fn emit(&self, event: DomainEvent);

    /// Emits related events in order, e.g. the attach and detach halves of a sync.
    fn emit_batch(&self, events: Vec<DomainEvent>) {
        for event in events {
            self.emit(event);
        }
    }
}

/// Discards every event. Default sink of both services.
#[derive(Clone, Default)]
pub struct NoOpDomainEventSink;

impl DomainEventSink for NoOpDomainEventSink {
    fn emit(&self, _event: DomainEvent) {}
}

/// Records events in emission order.
#[derive(Clone, Default)]
pub struct MockDomainEventSink {
    events: Arc<Mutex<Vec<DomainEvent>>>,
}

impl MockDomainEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    // A panicking listener in another test must not hide what was recorded.
    fn recorded(&self) -> MutexGuard<'_, Vec<DomainEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        self.recorded().clone()
    }

    /// Dotted event names, e.g. `["categorizable.associating", "categorizable.associated"]`.
    pub fn names(&self) -> Vec<&'static str> {
        self.recorded().iter().map(DomainEvent::name).collect()
    }

    pub fn clear(&self) {
        self.recorded().clear();
    }

    pub fn len(&self) -> usize {
        self.recorded().len()
    }

    pub fn is_empty(&self) -> bool {
        self.recorded().is_empty()
    }
}

impl DomainEventSink for MockDomainEventSink {
    fn emit(&self, event: DomainEvent) {
        self.recorded().push(event);
    }
}
