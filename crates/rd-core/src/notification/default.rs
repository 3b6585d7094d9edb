//! Process-wide default notification center.
//!
//! The default center is an explicit registry slot: it is empty until
//! someone installs a center (the application does so when it is built) and
//! it is emptied again on [`reset_default_center`]. Sending through an empty
//! slot is a no-op that collects no answers.

use super::{Notification, NotificationAnswer, NotificationCenter, NOTIFICATION_ABORT_REQUESTED};
use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::spinlock::Spinlock;

static DEFAULT_CENTER: Spinlock<Option<Handle<NotificationCenter>>> = Spinlock::new(None);

/// The default center, or a null handle if none is installed.
#[must_use]
pub fn default_center() -> Handle<NotificationCenter> {
    DEFAULT_CENTER.lock().clone().unwrap_or_default()
}

/// Install `center` as the default center, returning the previous one.
pub fn install_default_center(center: Handle<NotificationCenter>) -> Handle<NotificationCenter> {
    DEFAULT_CENTER
        .lock()
        .replace(center)
        .unwrap_or_default()
}

/// The default center, creating and installing one if the slot is empty.
pub fn get_or_create_default_center() -> Handle<NotificationCenter> {
    DEFAULT_CENTER
        .lock()
        .get_or_insert_with(|| Handle::new(NotificationCenter::new()))
        .clone()
}

/// Empty the default slot.
pub fn reset_default_center() {
    let previous = DEFAULT_CENTER.lock().take();
    drop(previous);
}

/// Empty the default slot only if it currently holds `center`.
///
/// Returns true if the slot was emptied.
pub fn uninstall_default_center(center: &Handle<NotificationCenter>) -> bool {
    let mut slot = DEFAULT_CENTER.lock();
    if slot.as_ref().is_some_and(|c| c.ptr_eq(center)) {
        let previous = slot.take();
        drop(slot);
        drop(previous);
        true
    } else {
        false
    }
}

/// Send `notification` through the default center.
pub fn notifiate(notification: &Notification) -> Vec<NotificationAnswer> {
    default_center()
        .try_get()
        .map(|center| center.notifiate(notification))
        .unwrap_or_default()
}

/// Build a notification and send it through the default center.
///
/// See also the [`notifiate!`](crate::notifiate) macro, which formats the
/// message.
pub fn notifiate_message(
    module: &str,
    function: &str,
    name: &str,
    message: impl Into<String>,
) -> Vec<NotificationAnswer> {
    notifiate(&Notification::new(module, function, name, message))
}

/// Answers collected by the default center's last broadcast.
#[must_use]
pub fn collected_answers() -> Vec<NotificationAnswer> {
    default_center()
        .try_get()
        .map(NotificationCenter::collected_answers)
        .unwrap_or_default()
}

/// Send a notification and fail if any observer requests an abort.
///
/// When an answer has `should_abort` set, a
/// [`NOTIFICATION_ABORT_REQUESTED`] notification with the same module,
/// function and message is sent, then [`Error::AbortRequested`] is returned.
/// Otherwise the answers are returned.
pub fn notifiate_abort(
    module: &str,
    function: &str,
    name: &str,
    message: impl Into<String>,
) -> Result<Vec<NotificationAnswer>> {
    let message = message.into();
    let answers = notifiate(&Notification::new(module, function, name, message.clone()));

    if answers.iter().any(NotificationAnswer::should_abort) {
        tracing::warn!(module, function, name, %message, "abort requested by observer");
        notifiate(&Notification::new(
            module,
            function,
            NOTIFICATION_ABORT_REQUESTED,
            message.clone(),
        ));
        return Err(Error::AbortRequested {
            module: module.to_string(),
            function: function.to_string(),
            message,
        });
    }

    Ok(answers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::test_support::DEFAULT_CENTER_LOCK;
    use crate::notification::NotificationObserver;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct Veto {
        abort: bool,
        seen: Mutex<Vec<String>>,
    }

    impl NotificationObserver for Veto {
        fn observe(&self, _: &NotificationCenter, n: &Notification) -> NotificationAnswer {
            self.seen.lock().push(n.name().to_string());
            NotificationAnswer::with_abort(self.abort)
        }

        fn should_observe(&self, _: &NotificationCenter, _: &Notification) -> bool {
            true
        }
    }

    fn veto(abort: bool) -> (Arc<Veto>, Handle<dyn NotificationObserver>) {
        let arc = Arc::new(Veto {
            abort,
            seen: Mutex::new(Vec::new()),
        });
        let handle = Handle::from_arc(arc.clone() as Arc<dyn NotificationObserver>);
        (arc, handle)
    }

    #[test]
    fn empty_slot_collects_nothing() {
        let _guard = DEFAULT_CENTER_LOCK.lock();
        reset_default_center();
        assert!(!default_center().valid());
        assert!(crate::notifiate!("Core", "test", "Ping", "{}", 1).is_empty());
        assert!(notifiate_abort("Core", "test", "Ping", "").unwrap().is_empty());
        assert!(collected_answers().is_empty());
    }

    #[test]
    fn abort_is_reported_and_announced() {
        let _guard = DEFAULT_CENTER_LOCK.lock();
        let center = Handle::new(NotificationCenter::new());
        install_default_center(center.clone());

        let (polite, hp) = veto(false);
        let (strict, hs) = veto(true);
        center.get().unwrap().add_observer(&hp);
        center.get().unwrap().add_observer(&hs);

        let err = crate::notifiate_abort!("Core", "Driver::create_surface", "Failed", "surface {}", "main")
            .unwrap_err();
        assert_eq!(
            err,
            Error::AbortRequested {
                module: "Core".into(),
                function: "Driver::create_surface".into(),
                message: "surface main".into(),
            }
        );
        assert_eq!(
            *strict.seen.lock(),
            vec!["Failed".to_string(), NOTIFICATION_ABORT_REQUESTED.to_string()]
        );
        assert_eq!(polite.seen.lock().len(), 2);

        reset_default_center();
    }

    #[test]
    fn no_abort_returns_all_answers() {
        let _guard = DEFAULT_CENTER_LOCK.lock();
        let center = Handle::new(NotificationCenter::new());
        install_default_center(center.clone());

        let (_a, ha) = veto(false);
        let (_b, hb) = veto(false);
        center.get().unwrap().add_observer(&ha);
        center.get().unwrap().add_observer(&hb);

        let answers = notifiate_abort("Core", "test", "Ping", "fine").unwrap();
        assert_eq!(answers.len(), 2);
        assert_eq!(collected_answers().len(), 2);

        reset_default_center();
    }

    #[test]
    fn uninstall_only_removes_matching_center() {
        let _guard = DEFAULT_CENTER_LOCK.lock();
        let first = get_or_create_default_center();
        assert!(first.ptr_eq(&get_or_create_default_center()));

        let other = Handle::new(NotificationCenter::new());
        assert!(!uninstall_default_center(&other));
        assert!(default_center().ptr_eq(&first));

        assert!(uninstall_default_center(&first));
        assert!(!default_center().valid());
    }
}
