// Messaging - Event broadcast and control/audio thread channels

pub mod channels;
pub mod event;
pub mod notification;

pub use event::{EventControl, SubscriptionId};
pub use notification::{ClickEvent, TransitionEvent};
