mod event;
mod subscriptions;

pub use event::{Event, EventKind};
pub use subscriptions::Listener;

pub(crate) use subscriptions::{Handler, Subscriptions};
