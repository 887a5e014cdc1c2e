mod request;
pub mod state;
mod types;

pub use request::{SubscriptionRequest, VerificationRequest};
pub use state::VerificationMismatch;
pub use types::{Mode, NewSubscription, Subscription, SubscriptionState, UnknownMode, UnknownState};
