pub mod mention;
pub mod persona;
pub mod planner;
pub mod providers;

pub use mention::strip_mentions;
pub use persona::Persona;
pub use planner::{CompletionSettings, PlannedReply, ReplyOutcome, ReplyPlanner};
