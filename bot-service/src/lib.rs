//! The repost bot's per-cycle work: trend analysis, moderation, republishing,
//! and the scheduler that repeats it.

pub mod cycle;
pub mod moderation;
pub mod republish;
pub mod scheduler;

pub use cycle::{Bot, CycleSummary};
pub use moderation::{ModerationSummary, Moderator};
pub use republish::{filter_eligible, image_extension, RepublishOutcome, Republisher};
pub use scheduler::Scheduler;
