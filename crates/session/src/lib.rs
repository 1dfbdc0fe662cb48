//! Per-subject conversation state for refinement queries.
//!
//! Replaces framework-managed "conversation memory" with plain data: each
//! subject owns a bounded history of `{constraint, result}` turns, and a
//! follow-up merges its constraint over the immediately preceding turn
//! only. Nothing survives a process restart.

use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use workout_query::Constraint;

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No prior session for subject {0:?}")]
    NoPriorSession(String),
}

/// One completed exchange: the effective constraint that was queried and
/// the names of the records it returned.
#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub constraint: Constraint,
    pub result_names: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Upper bound on turns kept per subject; the oldest turn is evicted
    /// past it.
    pub max_turns: usize,
    /// A session untouched for this long counts as absent.
    pub idle_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_turns: 8,
            idle_timeout: Duration::from_secs(30 * 60),
        }
    }
}

impl SessionConfig {
    /// Reads `WORKOUT_SESSION_MAX_TURNS` / `WORKOUT_SESSION_IDLE_SECS`,
    /// keeping the defaults for unset or unparseable values.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(max_turns) = env_number("WORKOUT_SESSION_MAX_TURNS") {
            if max_turns > 0 {
                config.max_turns = max_turns as usize;
            }
        }
        if let Some(idle_secs) = env_number("WORKOUT_SESSION_IDLE_SECS") {
            if idle_secs > 0 {
                config.idle_timeout = Duration::from_secs(idle_secs);
            }
        }
        config
    }
}

fn env_number(key: &str) -> Option<u64> {
    std::env::var(key).ok()?.trim().parse().ok()
}

#[derive(Debug)]
struct SessionState {
    turns: VecDeque<Turn>,
    last_touched: Instant,
}

impl SessionState {
    fn fresh() -> Self {
        Self {
            turns: VecDeque::new(),
            last_touched: Instant::now(),
        }
    }
}

/// Keyed store of per-subject sessions.
///
/// The outer map lock is held only to clone an entry's `Arc`; each entry's
/// own mutex serializes operations per subject, so distinct subjects never
/// contend with each other.
#[derive(Debug)]
pub struct SessionStore {
    config: SessionConfig,
    subjects: std::sync::Mutex<HashMap<String, Arc<Mutex<SessionState>>>>,
}

impl SessionStore {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            subjects: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Opens or refines the session for `subject_id` and returns the
    /// effective constraint to query with.
    ///
    /// `is_follow_up = false` discards any prior history and records
    /// `constraint` as the sole turn. `is_follow_up = true` merges
    /// `constraint` over the previous turn's constraint (present fields
    /// override, absent fields inherit) and appends the merged turn,
    /// evicting the oldest once past the configured bound. A follow-up
    /// without a live session fails with [`SessionError::NoPriorSession`].
    pub async fn start_or_continue(
        &self,
        subject_id: &str,
        constraint: Constraint,
        is_follow_up: bool,
    ) -> Result<Constraint> {
        let entry = self.entry(subject_id);
        let mut state = entry.lock().await;

        let expired = state.last_touched.elapsed() > self.config.idle_timeout;
        if expired && !state.turns.is_empty() {
            log::debug!("session for {subject_id:?} expired after idle timeout");
            state.turns.clear();
        }

        let effective = if is_follow_up {
            let prior = state
                .turns
                .back()
                .ok_or_else(|| SessionError::NoPriorSession(subject_id.to_string()))?;
            constraint.merged_over(&prior.constraint)
        } else {
            state.turns.clear();
            constraint
        };

        state.turns.push_back(Turn {
            constraint: effective.clone(),
            result_names: Vec::new(),
        });
        while state.turns.len() > self.config.max_turns {
            state.turns.pop_front();
        }
        state.last_touched = Instant::now();
        Ok(effective)
    }

    /// Attaches the query outcome to the subject's latest turn.
    pub async fn record_result(&self, subject_id: &str, result_names: Vec<String>) {
        let entry = self.entry(subject_id);
        let mut state = entry.lock().await;
        if let Some(turn) = state.turns.back_mut() {
            turn.result_names = result_names;
        }
        state.last_touched = Instant::now();
    }

    /// Current history length for a subject. Zero when never seen.
    pub async fn turn_count(&self, subject_id: &str) -> usize {
        let entry = {
            let subjects = self.subjects.lock().expect("session map poisoned");
            subjects.get(subject_id).cloned()
        };
        match entry {
            Some(entry) => entry.lock().await.turns.len(),
            None => 0,
        }
    }

    fn entry(&self, subject_id: &str) -> Arc<Mutex<SessionState>> {
        let mut subjects = self.subjects.lock().expect("session map poisoned");
        subjects
            .entry(subject_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(SessionState::fresh())))
            .clone()
    }
}
