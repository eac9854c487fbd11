pub mod error;
pub mod event;
pub mod message;
pub mod traits;

pub use error::BridgeError;
pub use event::{SlackEnvelope, SlackEvent, ENVELOPE_EVENT_CALLBACK, ENVELOPE_URL_VERIFICATION};
pub use message::OutgoingMessage;
pub use traits::{ChatPoster, LlmProvider, LlmRequest, LlmResponse};
