//! Tool dispatcher.
//!
//! Owns the shared dataset cache and session store, validates decoded
//! requests against the fixed tool registry, and turns every outcome,
//! success or failure, into exactly one well-formed response. Handler
//! errors never escape as transport faults.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use workout_dataset::{DatasetCache, DatasetError, Level};
use workout_protocol::{
    ErrorCode, ToolError, ToolRequest, ToolResponse, TOOL_DOWNLOAD_DATASET,
    TOOL_GET_EXERCISE_BY_NAME, TOOL_NAMES, TOOL_SEARCH_EXERCISES,
};
use workout_query::{Constraint, MAX_LIMIT};
use workout_session::{SessionError, SessionStore};

/// Lifecycle of one request inside the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Received,
    Validated,
    Executing,
    Completed,
    Failed,
}

fn trace_phase(id: &str, phase: Phase) {
    log::trace!("request {id}: {phase:?}");
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchExercisesArgs {
    subject_id: String,
    #[serde(default)]
    age: Option<u32>,
    #[serde(default)]
    goal: Option<String>,
    #[serde(default)]
    intensity: Option<String>,
    #[serde(default)]
    mood: Option<String>,
    #[serde(default)]
    restrictions: Vec<String>,
    #[serde(default)]
    max_duration_minutes: Option<u32>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    is_follow_up: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GetExerciseByNameArgs {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DownloadDatasetArgs {
    #[serde(default)]
    force: bool,
}

pub struct WorkoutService {
    cache: Arc<DatasetCache>,
    sessions: Arc<SessionStore>,
}

impl WorkoutService {
    pub fn new(cache: Arc<DatasetCache>, sessions: Arc<SessionStore>) -> Self {
        Self { cache, sessions }
    }

    /// Routes one decoded request to its handler and always produces a
    /// response carrying the request's id.
    pub async fn handle(&self, request: ToolRequest) -> ToolResponse {
        let ToolRequest {
            id,
            tool,
            arguments,
        } = request;
        trace_phase(&id, Phase::Received);

        // Callers may omit `arguments` entirely; treat that as `{}`.
        let arguments = if arguments.is_null() {
            json!({})
        } else {
            arguments
        };

        let outcome = match tool.as_str() {
            TOOL_SEARCH_EXERCISES => self.search_exercises(&id, arguments).await,
            TOOL_GET_EXERCISE_BY_NAME => self.get_exercise_by_name(&id, arguments).await,
            TOOL_DOWNLOAD_DATASET => self.download_dataset(&id, arguments).await,
            other => Err(ToolError::new(
                ErrorCode::InvalidArgument,
                format!("unknown tool {other:?}; expected one of {TOOL_NAMES:?}"),
            )),
        };

        match outcome {
            Ok(result) => {
                trace_phase(&id, Phase::Completed);
                ToolResponse::success(id, result)
            }
            Err(error) => {
                trace_phase(&id, Phase::Failed);
                log::debug!("request {id} failed: {error}");
                ToolResponse {
                    id,
                    result: None,
                    error: Some(error),
                }
            }
        }
    }

    async fn search_exercises(&self, id: &str, arguments: Value) -> Result<Value, ToolError> {
        let args: SearchExercisesArgs = parse_args(arguments)?;
        if args.subject_id.trim().is_empty() {
            return Err(ToolError::new(
                ErrorCode::InvalidArgument,
                "subject_id must not be empty",
            ));
        }
        let limit = match args.limit {
            Some(0) => {
                return Err(ToolError::new(
                    ErrorCode::InvalidArgument,
                    format!("limit must be between 1 and {MAX_LIMIT}"),
                ))
            }
            other => other,
        };
        let intensity = args
            .intensity
            .as_deref()
            .map(|raw| {
                Level::parse(raw).ok_or_else(|| {
                    ToolError::new(
                        ErrorCode::InvalidArgument,
                        format!("intensity must be one of low|moderate|high, got {raw:?}"),
                    )
                })
            })
            .transpose()?;
        trace_phase(id, Phase::Validated);

        let constraint = Constraint {
            age: args.age,
            goal: args.goal,
            intensity,
            mood: args.mood,
            restrictions: args.restrictions,
            max_duration_minutes: args.max_duration_minutes,
        };

        trace_phase(id, Phase::Executing);
        let effective = self
            .sessions
            .start_or_continue(&args.subject_id, constraint, args.is_follow_up)
            .await
            .map_err(session_error)?;
        let dataset = self.cache.ensure_loaded().await.map_err(dataset_error)?;
        let ranked = workout_query::search(&dataset, &effective, limit);

        let mut names = Vec::with_capacity(ranked.hits.len());
        let mut exercises = Vec::with_capacity(ranked.hits.len());
        for (exercise, score) in ranked.exercises(&dataset) {
            names.push(exercise.name.clone());
            let mut entry = serde_json::to_value(exercise).map_err(internal_error)?;
            // Round before serializing: raw f32-to-f64 widening leaks
            // noise digits into the payload.
            entry["score"] = json!((f64::from(score) * 1e4).round() / 1e4);
            exercises.push(entry);
        }
        self.sessions.record_result(&args.subject_id, names).await;

        Ok(json!({
            "exercises": exercises,
            "count": exercises.len(),
            "effective_constraint": serde_json::to_value(&effective).map_err(internal_error)?,
            "source": "snapshot",
            "dataset_revision": dataset.revision(),
        }))
    }

    async fn get_exercise_by_name(&self, id: &str, arguments: Value) -> Result<Value, ToolError> {
        let args: GetExerciseByNameArgs = parse_args(arguments)?;
        if args.name.trim().is_empty() {
            return Err(ToolError::new(
                ErrorCode::InvalidArgument,
                "name must not be empty",
            ));
        }
        trace_phase(id, Phase::Validated);

        trace_phase(id, Phase::Executing);
        let dataset = self.cache.ensure_loaded().await.map_err(dataset_error)?;
        let exercise = workout_query::find_by_name(&dataset, &args.name)
            .map_err(|err| ToolError::new(ErrorCode::NotFound, err.to_string()))?;
        serde_json::to_value(exercise).map_err(internal_error)
    }

    async fn download_dataset(&self, id: &str, arguments: Value) -> Result<Value, ToolError> {
        let args: DownloadDatasetArgs = parse_args(arguments)?;
        trace_phase(id, Phase::Validated);

        trace_phase(id, Phase::Executing);
        let report = self
            .cache
            .refresh(args.force)
            .await
            .map_err(dataset_error)?;
        serde_json::to_value(&report).map_err(internal_error)
    }
}

fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments)
        .map_err(|err| ToolError::new(ErrorCode::InvalidArgument, err.to_string()))
}

fn session_error(err: SessionError) -> ToolError {
    match err {
        SessionError::NoPriorSession(subject) => ToolError::new(
            ErrorCode::NoPriorSession,
            format!("no prior session for subject {subject:?}; send is_follow_up=false first"),
        ),
    }
}

fn dataset_error(err: DatasetError) -> ToolError {
    match err {
        DatasetError::Unavailable(message) => {
            ToolError::new(ErrorCode::DatasetUnavailable, message)
        }
        DatasetError::Malformed(message) => ToolError::new(
            ErrorCode::DatasetUnavailable,
            format!("snapshot unusable: {message}"),
        ),
        // IO and serialization detail stays in the diagnostic log; the
        // channel gets a message free of local paths.
        err => {
            log::error!("dataset failure: {err}");
            ToolError::new(ErrorCode::Internal, "internal dataset failure")
        }
    }
}

fn internal_error(err: serde_json::Error) -> ToolError {
    log::error!("serialization failure: {err}");
    ToolError::new(ErrorCode::Internal, "internal serialization failure")
}
