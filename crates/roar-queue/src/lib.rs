//! Job claim queue over the shared document store.
//!
//! The only synchronization between concurrently running processors is an
//! optimistic compare-and-set on the job document's status: the store
//! notifies about `requested` jobs, each processor attempts an exclusive
//! claim, and losers silently drop the candidate.

pub mod error;
pub mod queue;
pub mod store;

pub use error::{QueueError, QueueResult};
pub use queue::{ClaimedJobs, JobQueue};
pub use store::{ClaimOutcome, JobStore};
