//! In-memory stand-ins for the external seams, shared by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::deploy::command::{CommandError, CommandOutput, CommandRunner, CommandSpec};
use crate::session::{DeploymentUpdate, NewSession, SessionRecord};
use crate::status::SessionStatus;
use crate::store::{SessionStore, StoreError};
use crate::types::DbId;

const ACTIVE_NAMESPACE_CONSTRAINT: &str = "uq_dev_sessions_active_isolation_key";

/// Replays queued results in order and records every invocation. An empty
/// queue answers with a silent success.
#[derive(Default)]
pub struct ScriptedRunner {
    responses: Mutex<VecDeque<Result<CommandOutput, CommandError>>>,
    calls: Mutex<Vec<(CommandSpec, Duration)>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_stdout(&self, stdout: &str) {
        self.push(Ok(CommandOutput {
            stdout: stdout.to_string(),
            ..CommandOutput::default()
        }));
    }

    pub fn push_exit(&self, exit_code: i32, stderr: &str) {
        self.push(Ok(CommandOutput {
            stderr: stderr.to_string(),
            exit_code,
            ..CommandOutput::default()
        }));
    }

    pub fn push_timeout(&self, output: &str) {
        self.push(Err(CommandError::Timeout {
            program: "scripted".to_string(),
            elapsed_ms: 1,
            output: output.to_string(),
        }));
    }

    pub fn calls(&self) -> Vec<(CommandSpec, Duration)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn push(&self, response: Result<CommandOutput, CommandError>) {
        self.responses.lock().unwrap().push_back(response);
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(
        &self,
        spec: &CommandSpec,
        timeout: Duration,
    ) -> Result<CommandOutput, CommandError> {
        self.calls.lock().unwrap().push((spec.clone(), timeout));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(CommandOutput::default()))
    }
}

/// Session store backed by a vector, enforcing the active-project
/// uniqueness rule the database enforces.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<SessionRecord>>,
    racing_insert: Mutex<Option<NewSession>>,
    inserts: AtomicUsize,
    status_updates: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make another writer win the next insert: `winner` is stored first.
    pub fn race_next_insert(&self, winner: NewSession) {
        *self.racing_insert.lock().unwrap() = Some(winner);
    }

    pub fn insert_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn status_updates(&self) -> usize {
        self.status_updates.load(Ordering::SeqCst)
    }

    pub fn active_count(&self) -> usize {
        self.rows.lock().unwrap().iter().filter(|r| r.is_active).count()
    }

    fn store_row(rows: &mut Vec<SessionRecord>, session: &NewSession) -> SessionRecord {
        let now = Utc::now();
        let record = SessionRecord {
            id: rows.len() as DbId + 1,
            project_uuid: session.project_uuid.clone(),
            owner_user_id: session.owner_user_id,
            owner_project_id: session.owner_project_id,
            token: session.token.clone(),
            isolation_key: session.isolation_key.clone(),
            workload_name: session.workload_name.clone(),
            status: session.status,
            endpoints: session.endpoints.clone(),
            user_agent: session.user_agent.clone(),
            client_ip: session.client_ip.clone(),
            expires_at: session.expires_at,
            is_active: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        rows.push(record.clone());
        record
    }

    fn with_active<T>(&self, id: DbId, f: impl FnOnce(&mut SessionRecord) -> T) -> Option<T> {
        let mut rows = self.rows.lock().unwrap();
        rows.iter_mut().find(|r| r.id == id && r.is_active).map(f)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn find_active_by_project_uuid(
        &self,
        project_uuid: &str,
    ) -> Result<Option<SessionRecord>, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|r| r.is_active && r.project_uuid == project_uuid)
            .cloned())
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.with_active(id, |r| r.clone()))
    }

    async fn find_by_id_include_deleted(
        &self,
        id: DbId,
    ) -> Result<Option<SessionRecord>, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|r| r.id == id).cloned())
    }

    async fn insert(&self, session: &NewSession) -> Result<SessionRecord, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(winner) = self.racing_insert.lock().unwrap().take() {
            Self::store_row(&mut rows, &winner);
        }
        if rows
            .iter()
            .any(|r| r.is_active && r.isolation_key == session.isolation_key)
        {
            return Err(StoreError::UniqueViolation {
                constraint: ACTIVE_NAMESPACE_CONSTRAINT.to_string(),
            });
        }
        self.inserts.fetch_add(1, Ordering::SeqCst);
        Ok(Self::store_row(&mut rows, session))
    }

    async fn update_deployment(
        &self,
        id: DbId,
        update: &DeploymentUpdate,
    ) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.with_active(id, |r| {
            r.owner_user_id = update.owner_user_id;
            r.owner_project_id = update.owner_project_id;
            r.status = update.status;
            r.endpoints = update.endpoints.clone();
            r.updated_at = Utc::now();
            r.clone()
        }))
    }

    async fn update_status(
        &self,
        id: DbId,
        status: SessionStatus,
    ) -> Result<Option<SessionRecord>, StoreError> {
        self.status_updates.fetch_add(1, Ordering::SeqCst);
        Ok(self.with_active(id, |r| {
            r.status = status;
            r.updated_at = Utc::now();
            r.clone()
        }))
    }

    async fn soft_delete(&self, id: DbId) -> Result<bool, StoreError> {
        Ok(self
            .with_active(id, |r| {
                r.is_active = false;
                r.deleted_at = Some(Utc::now());
            })
            .is_some())
    }
}
