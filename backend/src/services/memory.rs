//! In-memory assignment backend and team directory
//!
//! Mirrors the transactional behaviour of the Postgres backend closely enough
//! to exercise the assignment engine without a database:
//! - `lock` takes a per-PR async mutex held until the unit of work ends;
//!   the mutex is dropped from the lock table once nobody holds or awaits it
//! - writes are staged and applied atomically on `commit`
//! - dropping an uncommitted unit of work discards its writes

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OwnedMutexGuard;

use crate::models::{
    AddTeamRequest, NewPullRequest, PrStatus, PullRequest, PullRequestShort, Team, TeamId,
    TeamMember, User,
};
use crate::services::assignment::AssignmentError;
use crate::services::store::{
    AssignmentBackend, PullRequestStore, ReviewHistoryLedger, TeamMembershipProvider, UnitOfWork,
};
use crate::services::team_directory::{DirectoryError, TeamDirectory, validate_add_team};

#[derive(Debug, Default)]
struct MemoryState {
    pull_requests: HashMap<String, PullRequest>,
    history: HashMap<String, i64>,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<MemoryState>,
    row_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    failing_users: Mutex<HashSet<String>>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn row_locks(&self) -> MutexGuard<'_, HashMap<String, Arc<tokio::sync::Mutex<()>>>> {
        self.row_locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn acquire_row_lock(self: &Arc<Self>, pr_id: &str) -> RowLock {
        let mutex = self
            .row_locks()
            .entry(pr_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();

        // A cancelled waiter drops `acquire` first, then `held` cleans up
        let mut held = RowLock {
            shared: self.clone(),
            pr_id: pr_id.to_string(),
            guard: None,
        };
        let acquire = mutex.lock_owned();
        held.guard = Some(acquire.await);
        held
    }

    fn release_row_lock(&self, pr_id: &str) {
        let mut locks = self.row_locks();
        // The table's own reference is the last one: no holder, no waiter
        if locks.get(pr_id).is_some_and(|m| Arc::strong_count(m) == 1) {
            locks.remove(pr_id);
        }
    }

    fn is_failing(&self, user_id: &str) -> bool {
        self.failing_users
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(user_id)
    }
}

/// Exclusive row lock on one pull request, released on drop
#[derive(Debug)]
pub struct RowLock {
    shared: Arc<Shared>,
    pr_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for RowLock {
    fn drop(&mut self) {
        self.guard.take();
        self.shared.release_row_lock(&self.pr_id);
    }
}

/// In-memory [`AssignmentBackend`]
///
/// Units of work read team membership from the directory the backend was
/// built with.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    shared: Arc<Shared>,
    directory: MemoryTeamDirectory,
}

impl MemoryBackend {
    /// Backend with an empty team directory of its own
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend reading membership from `directory`; both share team state
    pub fn with_directory(directory: &MemoryTeamDirectory) -> Self {
        Self {
            shared: Arc::default(),
            directory: directory.clone(),
        }
    }

    /// Make every ledger increment for `user_id` fail, to exercise rollback
    pub fn fail_increment_for(&self, user_id: &str) {
        self.shared
            .failing_users
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id.to_string());
    }

    /// Take the row lock of a pull request as if another transaction held it
    pub async fn hold_row_lock(&self, pr_id: &str) -> RowLock {
        self.shared.acquire_row_lock(pr_id).await
    }

    /// Committed ledger value for a user
    pub fn history_of(&self, user_id: &str) -> Option<i64> {
        self.shared.state().history.get(user_id).copied()
    }
}

#[async_trait]
impl AssignmentBackend for MemoryBackend {
    type Work = MemoryUnitOfWork;

    async fn begin(&self) -> Result<Self::Work, AssignmentError> {
        Ok(MemoryUnitOfWork {
            shared: self.shared.clone(),
            directory: self.directory.clone(),
            held: Vec::new(),
            staged: Vec::new(),
        })
    }

    async fn get(&self, pr_id: &str) -> Result<Option<PullRequest>, AssignmentError> {
        Ok(self.shared.state().pull_requests.get(pr_id).cloned())
    }

    async fn reviews_for(&self, user_id: &str) -> Result<Vec<PullRequestShort>, AssignmentError> {
        let state = self.shared.state();
        let mut reviews: Vec<&PullRequest> = state
            .pull_requests
            .values()
            .filter(|pr| pr.has_reviewer(user_id))
            .collect();
        // Oldest first, ties broken by ID
        reviews.sort_by(|a, b| (a.created_at, &a.pr_id).cmp(&(b.created_at, &b.pr_id)));
        Ok(reviews.into_iter().map(PullRequestShort::from).collect())
    }

    async fn review_count(&self, user_id: &str) -> Result<Option<i64>, AssignmentError> {
        Ok(self.history_of(user_id))
    }
}

#[derive(Debug)]
enum StagedWrite {
    Insert(PullRequest),
    Replace {
        pr_id: String,
        outgoing: String,
        incoming: String,
    },
    Merge {
        pr_id: String,
        merged_at: DateTime<Utc>,
    },
    Increment(String),
}

/// Unit of work over [`MemoryBackend`]
///
/// Locking the same pull request twice within one unit of work deadlocks,
/// as it would with nested `SELECT ... FOR UPDATE` on separate connections.
#[derive(Debug)]
pub struct MemoryUnitOfWork {
    shared: Arc<Shared>,
    directory: MemoryTeamDirectory,
    held: Vec<RowLock>,
    staged: Vec<StagedWrite>,
}

impl MemoryUnitOfWork {
    fn staged_insert(&self, pr_id: &str) -> bool {
        self.staged
            .iter()
            .any(|w| matches!(w, StagedWrite::Insert(pr) if pr.pr_id == pr_id))
    }

    fn staged_increments(&self, user_id: &str) -> i64 {
        self.staged
            .iter()
            .filter(|w| matches!(w, StagedWrite::Increment(u) if u == user_id))
            .count() as i64
    }
}

#[async_trait]
impl PullRequestStore for MemoryUnitOfWork {
    async fn exists(&mut self, pr_id: &str) -> Result<bool, AssignmentError> {
        let committed = self.shared.state().pull_requests.contains_key(pr_id);
        Ok(committed || self.staged_insert(pr_id))
    }

    async fn insert(
        &mut self,
        pr: &NewPullRequest,
        reviewers: &[String],
    ) -> Result<DateTime<Utc>, AssignmentError> {
        if self.exists(&pr.pr_id).await? {
            return Err(AssignmentError::AlreadyExists(pr.pr_id.clone()));
        }

        let created_at = Utc::now();
        self.staged.push(StagedWrite::Insert(PullRequest {
            pr_id: pr.pr_id.clone(),
            name: pr.name.clone(),
            author_id: pr.author_id.clone(),
            status: PrStatus::Open,
            assigned_reviewers: reviewers.to_vec(),
            created_at,
            merged_at: None,
        }));
        Ok(created_at)
    }

    async fn lock(&mut self, pr_id: &str) -> Result<Option<PullRequest>, AssignmentError> {
        let row_lock = self.shared.acquire_row_lock(pr_id).await;
        self.held.push(row_lock);
        Ok(self.shared.state().pull_requests.get(pr_id).cloned())
    }

    async fn replace_reviewer(
        &mut self,
        pr_id: &str,
        outgoing: &str,
        incoming: &str,
    ) -> Result<(), AssignmentError> {
        self.staged.push(StagedWrite::Replace {
            pr_id: pr_id.to_string(),
            outgoing: outgoing.to_string(),
            incoming: incoming.to_string(),
        });
        Ok(())
    }

    async fn mark_merged(&mut self, pr_id: &str) -> Result<DateTime<Utc>, AssignmentError> {
        let merged_at = Utc::now();
        self.staged.push(StagedWrite::Merge {
            pr_id: pr_id.to_string(),
            merged_at,
        });
        Ok(merged_at)
    }
}

#[async_trait]
impl ReviewHistoryLedger for MemoryUnitOfWork {
    async fn increment_or_init(&mut self, user_id: &str) -> Result<i64, AssignmentError> {
        if self.shared.is_failing(user_id) {
            return Err(AssignmentError::Internal(format!(
                "ledger write failed for {user_id}"
            )));
        }

        let committed = self.shared.state().history.get(user_id).copied().unwrap_or(0);
        let count = committed + self.staged_increments(user_id) + 1;
        self.staged.push(StagedWrite::Increment(user_id.to_string()));
        Ok(count)
    }
}

#[async_trait]
impl TeamMembershipProvider for MemoryUnitOfWork {
    async fn team_of(&mut self, user_id: &str) -> Result<Option<TeamId>, AssignmentError> {
        Ok(self.directory.read().users.get(user_id).map(|(team_id, _)| *team_id))
    }

    async fn members_of(&mut self, team_id: TeamId) -> Result<Vec<TeamMember>, AssignmentError> {
        Ok(self.directory.read().members(team_id))
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(self) -> Result<(), AssignmentError> {
        let MemoryUnitOfWork {
            shared,
            held,
            staged,
            ..
        } = self;

        {
            let mut state = shared.state();
            validate(&state, &staged)?;

            for write in staged {
                match write {
                    StagedWrite::Insert(pr) => {
                        state.pull_requests.insert(pr.pr_id.clone(), pr);
                    }
                    StagedWrite::Replace {
                        pr_id,
                        outgoing,
                        incoming,
                    } => {
                        if let Some(pr) = state.pull_requests.get_mut(&pr_id) {
                            for reviewer in pr.assigned_reviewers.iter_mut() {
                                if *reviewer == outgoing {
                                    *reviewer = incoming.clone();
                                }
                            }
                        }
                    }
                    StagedWrite::Merge { pr_id, merged_at } => {
                        if let Some(pr) = state.pull_requests.get_mut(&pr_id) {
                            pr.status = PrStatus::Merged;
                            pr.merged_at = Some(merged_at);
                        }
                    }
                    StagedWrite::Increment(user_id) => {
                        *state.history.entry(user_id).or_insert(0) += 1;
                    }
                }
            }
        }

        // Row locks are released only after the writes are visible
        drop(held);
        Ok(())
    }
}

/// Reject the whole commit before applying anything
fn validate(state: &MemoryState, staged: &[StagedWrite]) -> Result<(), AssignmentError> {
    for write in staged {
        match write {
            StagedWrite::Insert(pr) if state.pull_requests.contains_key(&pr.pr_id) => {
                return Err(AssignmentError::AlreadyExists(pr.pr_id.clone()));
            }
            StagedWrite::Replace {
                pr_id,
                outgoing,
                incoming,
            } => {
                let pr = state
                    .pull_requests
                    .get(pr_id)
                    .ok_or_else(|| AssignmentError::PrNotFound(pr_id.clone()))?;
                if !pr.has_reviewer(outgoing) || pr.has_reviewer(incoming) {
                    return Err(AssignmentError::Internal(format!(
                        "reviewer link {outgoing} -> {incoming} no longer applies to {pr_id}"
                    )));
                }
            }
            StagedWrite::Merge { pr_id, .. } if !state.pull_requests.contains_key(pr_id) => {
                return Err(AssignmentError::PrNotFound(pr_id.clone()));
            }
            _ => {}
        }
    }
    Ok(())
}

#[derive(Debug, Default)]
struct DirectoryState {
    next_team_id: TeamId,
    teams: BTreeMap<String, TeamId>,
    users: BTreeMap<String, (TeamId, TeamMember)>,
}

impl DirectoryState {
    fn insert_team(&mut self, team_name: &str, members: Vec<TeamMember>) -> TeamId {
        self.next_team_id += 1;
        let team_id = self.next_team_id;
        self.teams.insert(team_name.to_string(), team_id);
        for member in members {
            self.users.insert(member.user_id.clone(), (team_id, member));
        }
        team_id
    }

    fn team(&self, team_name: &str) -> Result<Team, DirectoryError> {
        let team_id = *self
            .teams
            .get(team_name)
            .ok_or_else(|| DirectoryError::TeamNotFound(team_name.to_string()))?;

        Ok(Team {
            team_name: team_name.to_string(),
            members: self.members(team_id),
        })
    }

    fn members(&self, team_id: TeamId) -> Vec<TeamMember> {
        self.users
            .values()
            .filter(|(member_team, _)| *member_team == team_id)
            .map(|(_, member)| member.clone())
            .collect()
    }
}

/// In-memory [`TeamDirectory`]; clones share the same teams
#[derive(Debug, Clone, Default)]
pub struct MemoryTeamDirectory {
    state: Arc<RwLock<DirectoryState>>,
}

impl MemoryTeamDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a team without validation; listed users move to it
    pub fn with_team(self, team_name: &str, members: Vec<TeamMember>) -> Self {
        self.write().insert_team(team_name, members);
        self
    }

    fn read(&self) -> RwLockReadGuard<'_, DirectoryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, DirectoryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TeamDirectory for MemoryTeamDirectory {
    async fn add_team(&self, request: AddTeamRequest) -> Result<Team, DirectoryError> {
        validate_add_team(&request)?;

        let mut state = self.write();
        if state.teams.contains_key(&request.team_name) {
            return Err(DirectoryError::TeamExists(request.team_name));
        }
        state.insert_team(&request.team_name, request.members);
        state.team(&request.team_name)
    }

    async fn get_team(&self, team_name: &str) -> Result<Team, DirectoryError> {
        self.read().team(team_name)
    }

    async fn deactivate_team(&self, team_name: &str) -> Result<Team, DirectoryError> {
        let mut state = self.write();
        let team_id = *state
            .teams
            .get(team_name)
            .ok_or_else(|| DirectoryError::TeamNotFound(team_name.to_string()))?;

        for (member_team, member) in state.users.values_mut() {
            if *member_team == team_id {
                member.is_active = false;
            }
        }
        state.team(team_name)
    }

    async fn set_user_active(&self, user_id: &str, is_active: bool) -> Result<User, DirectoryError> {
        let mut state = self.write();
        let (team_id, member) = state
            .users
            .get_mut(user_id)
            .ok_or_else(|| DirectoryError::UserNotFound(user_id.to_string()))?;
        member.is_active = is_active;

        let team_id = *team_id;
        let member = member.clone();
        let team_name = state
            .teams
            .iter()
            .find(|(_, id)| **id == team_id)
            .map(|(name, _)| name.clone())
            .unwrap_or_default();

        Ok(User {
            user_id: member.user_id,
            username: member.username,
            team_name,
            is_active: member.is_active,
        })
    }
}
