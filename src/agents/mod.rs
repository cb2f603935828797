//! The five agent roles (spec §4.1): four leaf skill-providers plus the
//! Coordinator that drives the monitoring-cycle workflow across them.

pub mod alert;
pub mod coordinator;
pub mod filter;
pub mod retrieval;
pub mod summarise;

pub use alert::{SendEmailSkill, SendSlackSkill};
pub use coordinator::Coordinator;
pub use filter::FilterContentSkill;
pub use retrieval::{DiscoverCommunitiesSkill, FetchCommentsSkill, FetchPostsSkill};
pub use summarise::SummariseContentSkill;
