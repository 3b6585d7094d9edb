//! Decoupled request/response messaging.
//!
//! A [`Notification`] is broadcast through a [`NotificationCenter`] to every
//! registered [`NotificationObserver`] that wants it. Each observer answers
//! with a [`NotificationAnswer`]; the sender inspects the collected answers.
//! What the answer fields mean depends on the notification, by convention
//! between sender and observers.
//!
//! The most common convention is the cooperative abort: an observer answers
//! [`NotificationAnswer::with_abort`]`(true)` and [`notifiate_abort`] turns
//! that into [`Error::AbortRequested`](crate::Error::AbortRequested).

mod center;
mod default;

pub use center::NotificationCenter;
pub use default::{
    collected_answers, default_center, get_or_create_default_center, install_default_center,
    notifiate, notifiate_abort, notifiate_message, reset_default_center, uninstall_default_center,
};

/// Name of the notification sent when an observer requested an abort.
pub const NOTIFICATION_ABORT_REQUESTED: &str = "RDNotificationAbortRequested";

/// Immutable notification value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notification {
    module: String,
    function: String,
    name: String,
    message: String,
}

impl Notification {
    /// Create a notification.
    pub fn new(
        module: impl Into<String>,
        function: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            module: module.into(),
            function: function.into(),
            name: name.into(),
            message: message.into(),
        }
    }

    /// Module that sent the notification.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Function that sent the notification.
    #[must_use]
    pub fn function(&self) -> &str {
        &self.function
    }

    /// Unique name identifying the kind of notification.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Answer of one observer to one notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotificationAnswer {
    should_abort: bool,
    should_do: bool,
    value: i32,
}

impl NotificationAnswer {
    /// Answer with every field cleared.
    #[must_use]
    pub const fn null() -> Self {
        Self {
            should_abort: false,
            should_do: false,
            value: 0,
        }
    }

    /// Answer requesting (or not) an abort.
    #[must_use]
    pub const fn with_abort(should_abort: bool) -> Self {
        Self {
            should_abort,
            ..Self::null()
        }
    }

    /// Answer telling whether the sender should go on.
    #[must_use]
    pub const fn with_should_do(should_do: bool) -> Self {
        Self {
            should_do,
            ..Self::null()
        }
    }

    /// Answer carrying an integer.
    #[must_use]
    pub const fn with_value(value: i32) -> Self {
        Self {
            value,
            ..Self::null()
        }
    }

    #[must_use]
    pub const fn should_abort(&self) -> bool {
        self.should_abort
    }

    #[must_use]
    pub const fn should_do(&self) -> bool {
        self.should_do
    }

    #[must_use]
    pub const fn value(&self) -> i32 {
        self.value
    }
}

/// Observer registered on a [`NotificationCenter`].
///
/// By default an observer ignores everything.
pub trait NotificationObserver: Send + Sync {
    /// Process a notification and answer it.
    #[allow(unused_variables)]
    fn observe(&self, center: &NotificationCenter, notification: &Notification) -> NotificationAnswer {
        NotificationAnswer::null()
    }

    /// Whether `observe` should be called for this notification.
    #[allow(unused_variables)]
    fn should_observe(&self, center: &NotificationCenter, notification: &Notification) -> bool {
        false
    }
}

/// Sends a notification with a formatted message through the default center.
///
/// ```
/// use rd_core::notifiate;
///
/// let answers = notifiate!("Core", "example", "ExampleNotification", "{} + {}", 1, 2);
/// assert!(answers.is_empty());
/// ```
#[macro_export]
macro_rules! notifiate {
    ($module:expr, $function:expr, $name:expr, $($arg:tt)+) => {
        $crate::notification::notifiate_message($module, $function, $name, format!($($arg)+))
    };
}

/// Like [`notifiate!`], but fails with
/// [`Error::AbortRequested`](crate::Error::AbortRequested) if an observer
/// answered with `should_abort`.
#[macro_export]
macro_rules! notifiate_abort {
    ($module:expr, $function:expr, $name:expr, $($arg:tt)+) => {
        $crate::notification::notifiate_abort($module, $function, $name, format!($($arg)+))
    };
}

#[cfg(test)]
pub(crate) mod test_support {
    use parking_lot::Mutex;

    /// Serializes tests that install a default center.
    pub static DEFAULT_CENTER_LOCK: Mutex<()> = Mutex::new(());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_constructors() {
        assert_eq!(NotificationAnswer::default(), NotificationAnswer::null());
        assert!(NotificationAnswer::with_abort(true).should_abort());
        assert!(!NotificationAnswer::with_abort(true).should_do());
        assert!(NotificationAnswer::with_should_do(true).should_do());
        assert_eq!(NotificationAnswer::with_value(-3).value(), -3);
    }

    #[test]
    fn notification_accessors() {
        let n = Notification::new("Core", "Driver::create_surface", "Created", "ok");
        assert_eq!(n.module(), "Core");
        assert_eq!(n.function(), "Driver::create_surface");
        assert_eq!(n.name(), "Created");
        assert_eq!(n.message(), "ok");
    }
}
