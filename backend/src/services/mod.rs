pub mod assignment;
pub mod memory;
pub mod pull_request_store;
pub mod review_history;
pub mod selector;
pub mod store;
pub mod team_directory;

pub use assignment::{AssignmentError, AssignmentPolicy, AssignmentService, SelfReview};
pub use memory::{MemoryBackend, MemoryTeamDirectory, MemoryUnitOfWork};
pub use pull_request_store::{PgAssignmentBackend, PgUnitOfWork};
pub use selector::{INITIAL_REVIEWERS, ReviewerSelector, select_initial, select_replacement};
pub use store::{
    AssignmentBackend, PullRequestStore, ReviewHistoryLedger, TeamMembershipProvider, UnitOfWork,
};
pub use team_directory::{DirectoryError, TeamDirectory, TeamDirectoryService};
