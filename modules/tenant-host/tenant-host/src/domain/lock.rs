//! Coordination lock: a time-bounded, single-writer claim on one task.
//!
//! A lock is `Held` while `now < expires_at` and `Free` otherwise; expiry is
//! evaluated whenever a lock is read, and nothing sweeps stale rows.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tenant_host_sdk::{AuditEvent, LockRecord, TenantId};

use super::clock::Clock;
use super::error::DomainError;
use super::ports::AuditRecorder;
use super::repo::LockRepository;
use crate::config::LockConfig;

const MAX_ID_LEN: usize = 128;
const MAX_ACQUIRE_ATTEMPTS: usize = 3;

pub struct LockService {
    repo: Arc<dyn LockRepository>,
    clock: Arc<dyn Clock>,
    audit: Arc<dyn AuditRecorder>,
    config: LockConfig,
}

impl LockService {
    #[must_use]
    pub fn new(
        repo: Arc<dyn LockRepository>,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn AuditRecorder>,
        config: LockConfig,
    ) -> Self {
        Self {
            repo,
            clock,
            audit,
            config,
        }
    }

    fn now(&self) -> DateTime<Utc> {
        // stored with millisecond precision
        let now = self.clock.now();
        DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
    }

    fn effective_ttl(&self, ttl: Option<Duration>) -> Result<chrono::Duration, DomainError> {
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        if ttl.is_zero() {
            return Err(DomainError::validation("ttl", "must be greater than zero"));
        }
        let ttl = ttl.min(self.config.max_ttl);
        chrono::Duration::from_std(ttl).map_err(|e| DomainError::validation("ttl", e.to_string()))
    }

    /// Take `task_id` for `session_id`.
    ///
    /// Succeeds when the task is free, expired, or already held by the same
    /// session (which refreshes the expiry).
    ///
    /// # Errors
    /// `LockHeld` with the current holder, or `Validation` for bad ids or TTL.
    pub async fn acquire(
        &self,
        tenant: &TenantId,
        task_id: &str,
        session_id: &str,
        ttl: Option<Duration>,
    ) -> Result<LockRecord, DomainError> {
        validate_id("task_id", task_id)?;
        validate_id("session_id", session_id)?;
        let ttl = self.effective_ttl(ttl)?;

        for _ in 0..MAX_ACQUIRE_ATTEMPTS {
            let now = self.now();
            let candidate = LockRecord {
                task_id: task_id.to_owned(),
                session_id: session_id.to_owned(),
                locked_at: now,
                expires_at: now + ttl,
            };

            if self.repo.try_acquire(tenant, &candidate).await? {
                tracing::info!(
                    tenant = %tenant,
                    task_id,
                    session_id,
                    expires_at = %candidate.expires_at,
                    "lock acquired"
                );
                self.audit.record(
                    AuditEvent::new(tenant.clone(), "lock.acquired")
                        .with("task_id", task_id)
                        .with("session_id", session_id)
                        .with("expires_at", candidate.expires_at.to_rfc3339()),
                );
                return Ok(candidate);
            }

            // the holder may have released or expired between the two statements
            if let Some(holder) = self.repo.find_active(tenant, task_id, now).await? {
                tracing::debug!(
                    tenant = %tenant,
                    task_id,
                    session_id,
                    holder = %holder.session_id,
                    "lock held by another session"
                );
                return Err(DomainError::LockHeld { holder });
            }
        }

        Err(DomainError::Internal(format!(
            "lock on task {task_id} kept changing hands; giving up after {MAX_ACQUIRE_ATTEMPTS} attempts"
        )))
    }

    /// Release `task_id` if `session_id` holds it; otherwise a no-op.
    ///
    /// # Errors
    /// Storage failures only.
    pub async fn release(
        &self,
        tenant: &TenantId,
        task_id: &str,
        session_id: &str,
    ) -> Result<bool, DomainError> {
        validate_id("task_id", task_id)?;
        validate_id("session_id", session_id)?;

        let released = self
            .repo
            .release(tenant, task_id, session_id, self.now())
            .await?;
        if released {
            tracing::info!(tenant = %tenant, task_id, session_id, "lock released");
            self.audit.record(
                AuditEvent::new(tenant.clone(), "lock.released")
                    .with("task_id", task_id)
                    .with("session_id", session_id),
            );
        }
        Ok(released)
    }

    /// The unexpired lock on `task_id`, or the most recent unexpired lock of
    /// the tenant when no task is named.
    ///
    /// # Errors
    /// Storage failures only.
    pub async fn active_lock(
        &self,
        tenant: &TenantId,
        task_id: Option<&str>,
    ) -> Result<Option<LockRecord>, DomainError> {
        let now = self.now();
        match task_id {
            Some(task_id) => {
                validate_id("task_id", task_id)?;
                self.repo.find_active(tenant, task_id, now).await
            }
            None => self.repo.latest_active(tenant, now).await,
        }
    }
}

fn validate_id(field: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(field, "must not be empty"));
    }
    if value.len() > MAX_ID_LEN {
        return Err(DomainError::validation(
            field,
            format!("exceeds maximum length of {MAX_ID_LEN}"),
        ));
    }
    if value.chars().any(char::is_control) {
        return Err(DomainError::validation(field, "must not contain control characters"));
    }
    Ok(())
}

