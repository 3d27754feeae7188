//! Transaction lifecycle notifications.
//!
//! Each submission produces a notification when it is broadcast, and another
//! when it is confirmed or fails:
//! - Submitted, with an explorer link
//! - Confirmed, titled after the action
//! - Failed, carrying the short error message

mod events;
mod notifier;

pub use events::*;
pub use notifier::*;
