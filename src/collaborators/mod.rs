//! Narrow interfaces to everything external to the pipeline substrate
//! itself: the discussion platform, the embedding/summarisation models,
//! and outbound notification channels (spec §6). `kernel::clock::Clock` is
//! the fifth narrow collaborator interface; it lives in `kernel` since the
//! substrate itself needs injectable time for breaker/retry tests.

pub mod content_source;
pub mod embedder;
pub mod notifier;
pub mod summariser;

pub use content_source::{ContentSource, HttpContentSource, NullContentSource, RawComment, RawCommunity, RawPost, TimeRange};
pub use embedder::{Embedder, HashingEmbedder};
pub use notifier::{LettreNotifier, Notifier, ReqwestNotifier};
pub use summariser::{ExtractiveSummariser, HttpSummariser, Summariser};
