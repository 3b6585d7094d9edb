//! Observer registry and broadcast.

use parking_lot::Mutex;

use super::{Notification, NotificationAnswer, NotificationObserver};
use crate::handle::Handle;

/// Registry of notification observers.
///
/// Answers of the most recent [`notifiate`](Self::notifiate) call are kept in
/// a shared buffer that is cleared at the start of every call. Concurrent
/// calls race on that buffer: [`collected_answers`](Self::collected_answers)
/// is only meaningful when nothing else is notifying. The list returned by
/// `notifiate` itself always belongs to that call.
#[derive(Default)]
pub struct NotificationCenter {
    observers: Mutex<Vec<Handle<dyn NotificationObserver>>>,
    answers: Mutex<Vec<NotificationAnswer>>,
}

impl NotificationCenter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Broadcast `notification` and collect the answers.
    ///
    /// Observers are visited in registration order; only those whose
    /// `should_observe` returns true are asked to observe.
    pub fn notifiate(&self, notification: &Notification) -> Vec<NotificationAnswer> {
        let observers = self.observers.lock().clone();
        self.answers.lock().clear();

        let mut answers = Vec::new();
        for observer in observers.iter().filter_map(Handle::try_get) {
            if observer.should_observe(self, notification) {
                let answer = observer.observe(self, notification);
                self.answers.lock().push(answer);
                answers.push(answer);
            }
        }

        tracing::trace!(
            module = notification.module(),
            function = notification.function(),
            name = notification.name(),
            answers = answers.len(),
            "notification sent"
        );
        answers
    }

    /// Answers collected by the last `notifiate` call.
    #[must_use]
    pub fn collected_answers(&self) -> Vec<NotificationAnswer> {
        self.answers.lock().clone()
    }

    /// Register an observer. Null handles are ignored.
    pub fn add_observer(&self, observer: &Handle<dyn NotificationObserver>) {
        if observer.valid() {
            self.observers.lock().push(observer.clone());
        }
    }

    /// Unregister an observer. Null handles are ignored.
    pub fn remove_observer(&self, observer: &Handle<dyn NotificationObserver>) {
        if observer.valid() {
            self.observers.lock().retain(|o| !o.ptr_eq(observer));
        }
    }

    /// Unregister every observer.
    pub fn clear_observers(&self) {
        self.observers.lock().clear();
    }

    /// Number of registered observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }
}
