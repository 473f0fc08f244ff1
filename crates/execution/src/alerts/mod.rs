//! Notification boundary.
//!
//! Notifications are fire-and-forget: a failed delivery is logged and
//! never changes engine control flow.

mod notification;
mod notifier;
mod telegram;

pub use notification::*;
pub use notifier::*;
pub use telegram::*;
