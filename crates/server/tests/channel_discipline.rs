//! The control channel carries exactly one well-formed response per
//! request and nothing else.

use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use workout_dataset::snapshot::{self, SnapshotMeta};
use workout_dataset::{DatasetCache, DatasetConfig};
use workout_mcp::{serve, FrameError, Transport, WorkoutService};
use workout_session::{SessionConfig, SessionStore};

const SAMPLE: &str = "\
name,muscle_group,equipment,level,duration_minutes,contraindications
Push-Up,Chest,Body Only,moderate,10,wrist injury;shoulder injury
Barbell Squat,Quadriceps,Barbell,high,20,knee injury
Walking,Cardio,None,low,30,
";

struct Harness {
    requests: DuplexStream,
    responses: BufReader<DuplexStream>,
    server: tokio::task::JoinHandle<std::result::Result<(), FrameError>>,
    _dir: tempfile::TempDir,
}

fn spawn_server() -> Result<Harness> {
    let dir = tempfile::tempdir().context("tempdir")?;
    let meta = SnapshotMeta::new("rev-itest", "http://127.0.0.1:9/exercises.csv");
    snapshot::persist(dir.path(), SAMPLE, &meta).context("seed snapshot")?;

    let cache = Arc::new(DatasetCache::new(DatasetConfig::new(
        "http://127.0.0.1:9/exercises.csv",
        dir.path(),
    )));
    let sessions = Arc::new(SessionStore::new(SessionConfig::default()));
    let service = WorkoutService::new(cache, sessions);

    let (requests, server_in) = duplex(64 * 1024);
    let (server_out, responses) = duplex(64 * 1024);
    let (read, _) = tokio::io::split(server_in);
    let (_, write) = tokio::io::split(server_out);
    let server = tokio::spawn(serve(service, Transport::new(read, write)));

    Ok(Harness {
        requests,
        responses: BufReader::new(responses),
        server,
        _dir: dir,
    })
}

async fn next_line(responses: &mut BufReader<DuplexStream>) -> Result<String> {
    let mut line = String::new();
    let n = tokio::time::timeout(Duration::from_secs(5), responses.read_line(&mut line))
        .await
        .context("timeout waiting for response")??;
    anyhow::ensure!(n > 0, "channel closed before a response arrived");
    Ok(line)
}

#[tokio::test]
async fn one_well_formed_response_per_request_and_nothing_else() -> Result<()> {
    let mut harness = spawn_server()?;

    let requests = vec![
        json!({"id": "q1", "tool": "download_dataset", "arguments": {}}),
        json!({"id": "q2", "tool": "get_exercise_by_name", "arguments": {"name": "walking"}}),
        json!({"id": "q3", "tool": "get_exercise_by_name", "arguments": {"name": "Nonexistent-123"}}),
        json!({"id": "q4", "tool": "search_exercises", "arguments": {"subject_id": "u1"}}),
        json!({"id": "q5", "tool": "no_such_tool", "arguments": {}}),
    ];
    for request in &requests {
        harness
            .requests
            .write_all(format!("{request}\n").as_bytes())
            .await?;
        // A write to process stdout mid-stream must not reach the control
        // channel; the transport owns its own handle.
        println!("unsolicited dependency output");
    }

    for request in &requests {
        let line = next_line(&mut harness.responses).await?;
        let response: Value =
            serde_json::from_str(&line).context("every channel line is one JSON response")?;
        assert_eq!(response["id"], request["id"]);
        let has_result = response.get("result").is_some();
        let has_error = response.get("error").is_some();
        assert!(
            has_result ^ has_error,
            "response must carry exactly one of result/error: {response}"
        );
    }

    // Errors stayed structured: q3 and q5 failed without killing the loop.
    drop(harness.requests);
    let mut rest = String::new();
    harness.responses.read_line(&mut rest).await?;
    assert!(rest.is_empty(), "unexpected extra channel bytes: {rest:?}");

    harness.server.await?.map_err(anyhow::Error::from)?;
    Ok(())
}

#[tokio::test]
async fn malformed_input_is_channel_fatal_and_emits_nothing() -> Result<()> {
    let mut harness = spawn_server()?;

    harness.requests.write_all(b"this is not json\n").await?;

    let err = tokio::time::timeout(Duration::from_secs(5), harness.server)
        .await
        .context("server did not stop on malformed input")??
        .expect_err("malformed input must be fatal");
    assert!(matches!(err, FrameError::Malformed(_)), "got {err:?}");

    // Nothing, not even an error response, was written for the broken frame.
    drop(harness.requests);
    let mut rest = String::new();
    harness.responses.read_line(&mut rest).await?;
    assert!(rest.is_empty(), "channel must stay silent: {rest:?}");
    Ok(())
}

#[tokio::test]
async fn pipelined_requests_keep_their_ids() -> Result<()> {
    let mut harness = spawn_server()?;

    // All requests in one write: the loop answers in order, each response
    // still correlated by its own id.
    let batch = "\
{\"id\":\"a\",\"tool\":\"get_exercise_by_name\",\"arguments\":{\"name\":\"Push-Up\"}}\n\
{\"id\":\"b\",\"tool\":\"get_exercise_by_name\",\"arguments\":{\"name\":\"Walking\"}}\n\
{\"id\":\"c\",\"tool\":\"download_dataset\"}\n";
    harness.requests.write_all(batch.as_bytes()).await?;

    for expected in ["a", "b", "c"] {
        let line = next_line(&mut harness.responses).await?;
        let response: Value = serde_json::from_str(&line)?;
        assert_eq!(response["id"], expected);
        assert!(response.get("result").is_some());
    }
    Ok(())
}
