//! Transfer orchestration.
//!
//! One [`Session`] runs end to end: control handshake, stream drain,
//! per-frame persistence, terminal accounting. The state machine is
//! explicit so partial completion, timeouts and per-frame soft errors are
//! first-class outcomes rather than ad hoc early exits. Terminal states
//! are final; a session never retries or reconnects.

use crate::control::ControlClient;
use crate::error::Outcome;
use crate::protocol::{self, GenerateRequest, InitializeRequest, StreamEvent};
use crate::sink::{FrameSink, TransferSummary};
use crate::stream::{FrameSocket, MessageSource};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Give the backend a moment to settle after each control call before the
/// next step leans on it.
const POST_INITIALIZE_DELAY: Duration = Duration::from_secs(1);
const POST_GENERATE_DELAY: Duration = Duration::from_secs(2);

/// Where the session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Initializing,
    GenerationRequested,
    Streaming,
    Completed,
    Failed,
    TimedOut,
}

/// Progress notifications for whoever is watching; the CLI renders these.
#[derive(Debug, Clone)]
pub enum Progress {
    /// Server-side status text
    Status(String),
    /// Frame counter moved. `total` is the best currently-known estimate.
    Frames { received: u64, total: Option<u64> },
}

pub type ProgressCallback = Box<dyn Fn(&Progress) + Send + Sync>;

/// Parameters for the generation request.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub duration_seconds: u64,
    pub step_seconds: u64,
    /// ISO 8601; the server picks its own start when absent
    pub start_time: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Satellite dataset for `/api/initialize`; `None` skips
    /// initialization entirely.
    pub satellites: Option<serde_json::Value>,
    /// Generation parameters; `None` skips the generation request
    /// (receive-only mode).
    pub generation: Option<GenerationParams>,
    /// Bound on each wait for an inbound stream message
    pub read_timeout: Duration,
    /// Bound on opening the websocket
    pub connect_timeout: Duration,
}

/// Final accounting for one session.
#[derive(Debug)]
pub struct SessionReport {
    pub outcome: Outcome,
    pub frames_received: u64,
    pub frames_expected: Option<u64>,
    /// Messages that failed to parse at all
    pub decode_failures: u64,
    /// Frames that parsed but could not be decoded or written
    pub persistence_failures: u64,
    /// From the initialize response, display-only
    pub satellite_count: Option<u64>,
    /// Where the summary record landed, if writing it succeeded
    pub summary_path: Option<PathBuf>,
}

pub struct Session {
    control: ControlClient,
    sink: FrameSink,
    options: SessionOptions,
    state: SessionState,
    frames_received: u64,
    frames_expected: Option<u64>,
    decode_failures: u64,
    persistence_failures: u64,
    last_status: Option<String>,
    progress: Option<ProgressCallback>,
}

impl Session {
    pub fn new(control: ControlClient, sink: FrameSink, options: SessionOptions) -> Self {
        Self {
            control,
            sink,
            options,
            state: SessionState::Idle,
            frames_received: 0,
            frames_expected: None,
            decode_failures: 0,
            persistence_failures: 0,
            last_status: None,
            progress: None,
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Most recent server status text, if any arrived.
    pub fn last_status(&self) -> Option<&str> {
        self.last_status.as_deref()
    }

    fn emit(&self, progress: Progress) {
        if let Some(callback) = &self.progress {
            callback(&progress);
        }
    }

    /// Drive the session to a terminal state. The summary record is
    /// written on every terminal path, control-phase failures included.
    pub async fn run(mut self, cancel: CancellationToken) -> SessionReport {
        let mut satellite_count = None;

        if let Some(satellites) = self.options.satellites.clone() {
            self.state = SessionState::Initializing;
            let request = InitializeRequest::new(satellites);
            match self.control.initialize(&request).await {
                Ok(response) => {
                    crate::info_log!(
                        "backend initialized, {} satellites",
                        response.satellite_count
                    );
                    satellite_count = Some(response.satellite_count);
                    self.emit(Progress::Status(format!(
                        "backend initialized, {} satellites",
                        response.satellite_count
                    )));
                    sleep(POST_INITIALIZE_DELAY).await;
                }
                Err(e) => {
                    crate::error_log!("initialize failed: {}", e);
                    return self.finish(Outcome::Failed(e.to_string()), satellite_count).await;
                }
            }
        }

        self.state = SessionState::GenerationRequested;
        if let Some(params) = self.options.generation.clone() {
            let request = GenerateRequest {
                duration_seconds: params.duration_seconds,
                step_seconds: params.step_seconds,
                start_time: params.start_time,
            };
            match self.control.start_generation(&request).await {
                Ok(response) => {
                    crate::info_log!("generation started, {} frames expected", response.total_frames);
                    self.frames_expected = Some(response.total_frames);
                    self.emit(Progress::Status(format!(
                        "generation started, {} frames expected",
                        response.total_frames
                    )));
                    sleep(POST_GENERATE_DELAY).await;
                }
                Err(e) => {
                    crate::error_log!("generation request failed: {}", e);
                    return self.finish(Outcome::Failed(e.to_string()), satellite_count).await;
                }
            }
        }

        let mut socket =
            match FrameSocket::connect(self.control.host(), self.options.connect_timeout).await {
                Ok(socket) => socket,
                Err(e) => {
                    crate::error_log!("stream open failed: {}", e);
                    return self.finish(Outcome::Failed(e.to_string()), satellite_count).await;
                }
            };

        self.state = SessionState::Streaming;
        let outcome = self.drain(&mut socket, &cancel).await;
        self.finish(outcome, satellite_count).await
    }

    /// Streaming read loop. Per-message errors (decode, persistence) are
    /// soft: they are counted and the loop continues, so one bad frame
    /// never voids the transfer. Only a read timeout, a transport failure,
    /// premature close, or cancellation end it.
    async fn drain<S: MessageSource>(
        &mut self,
        source: &mut S,
        cancel: &CancellationToken,
    ) -> Outcome {
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => {
                    crate::info_log!("cancelled after {} frames", self.frames_received);
                    return Outcome::Failed("cancelled".to_string());
                }
                next = tokio::time::timeout(self.options.read_timeout, source.next_text()) => next,
            };

            let raw = match next {
                Err(_) => {
                    crate::info_log!(
                        "read timed out after {} frames",
                        self.frames_received
                    );
                    return Outcome::TimedOut;
                }
                Ok(Err(e)) => return e.outcome(),
                Ok(Ok(None)) => {
                    return Outcome::Failed("stream closed before completion".to_string())
                }
                Ok(Ok(Some(raw))) => raw,
            };

            match protocol::decode(&raw) {
                StreamEvent::Status(status) => {
                    crate::debug_log!("server status: {}", status);
                    self.emit(Progress::Status(status.clone()));
                    self.last_status = Some(status);
                }
                StreamEvent::Frame(frame) => {
                    match self.sink.write_frame(&frame.filename, &frame.bytes).await {
                        Ok(_) => {
                            self.frames_received += 1;
                            self.emit(Progress::Frames {
                                received: self.frames_received,
                                total: self.frames_expected.or(Some(frame.total)),
                            });
                        }
                        Err(e) => {
                            crate::error_log!("frame {} not persisted: {}", frame.index, e);
                            self.persistence_failures += 1;
                        }
                    }
                }
                StreamEvent::Complete { total_frames } => {
                    // the server's closing count is fresher than the
                    // control-phase estimate
                    self.frames_expected = Some(total_frames);
                    return Outcome::Completed;
                }
                StreamEvent::Malformed { index, reason } => match index {
                    Some(index) => {
                        crate::error_log!("frame {} undecodable: {}", index, reason);
                        self.persistence_failures += 1;
                    }
                    None => {
                        crate::error_log!("malformed message: {}", reason);
                        self.decode_failures += 1;
                    }
                },
            }
        }
    }

    /// Enter the terminal state, persist the summary, and account for the
    /// session. The summary write is the one guaranteed side effect; if
    /// even that fails, the failure is logged and reported through the
    /// missing `summary_path`.
    async fn finish(mut self, outcome: Outcome, satellite_count: Option<u64>) -> SessionReport {
        self.state = match &outcome {
            Outcome::Completed => SessionState::Completed,
            Outcome::TimedOut => SessionState::TimedOut,
            Outcome::Failed(_) => SessionState::Failed,
        };

        let summary = TransferSummary {
            outcome: outcome.clone(),
            frames_received: self.frames_received,
            frames_expected: self.frames_expected,
        };

        let summary_path = match self.sink.write_summary(&summary).await {
            Ok(path) => Some(path),
            Err(e) => {
                crate::error_log!("summary write failed: {}", e);
                None
            }
        };

        crate::info_log!(
            "session {}: {}/{} frames, {} decode failures, {} persistence failures",
            outcome.label(),
            self.frames_received,
            self.frames_expected
                .map(|n| n.to_string())
                .unwrap_or_else(|| "?".to_string()),
            self.decode_failures,
            self.persistence_failures
        );

        SessionReport {
            outcome,
            frames_received: self.frames_received,
            frames_expected: self.frames_expected,
            decode_failures: self.decode_failures,
            persistence_failures: self.persistence_failures,
            satellite_count,
            summary_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StreamError;
    use async_trait::async_trait;
    use base64::Engine;
    use std::collections::VecDeque;
    use tempfile::TempDir;

    enum Step {
        Text(String),
        Close,
        Error(StreamError),
    }

    /// Scripted stand-in for the websocket: plays its steps, then hangs
    /// so the read timeout fires.
    struct ScriptedSource {
        steps: VecDeque<Step>,
    }

    impl ScriptedSource {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: steps.into(),
            }
        }
    }

    #[async_trait]
    impl MessageSource for ScriptedSource {
        async fn next_text(&mut self) -> Result<Option<String>, StreamError> {
            match self.steps.pop_front() {
                Some(Step::Text(text)) => Ok(Some(text)),
                Some(Step::Close) => Ok(None),
                Some(Step::Error(e)) => Err(e),
                None => std::future::pending().await,
            }
        }
    }

    fn frame_msg(index: u64, filename: &str) -> Step {
        let data = base64::engine::general_purpose::STANDARD.encode(format!("frame-{index}"));
        Step::Text(format!(
            r#"{{"type":"frame","index":{index},"total":10,"filename":"{filename}","timestamp":"t","data":"{data}"}}"#
        ))
    }

    fn complete_msg(total: u64) -> Step {
        Step::Text(format!(r#"{{"type":"complete","total_frames":{total}}}"#))
    }

    fn test_session(temp: &TempDir) -> Session {
        let control = ControlClient::new("localhost:9").unwrap();
        let sink = FrameSink::new(temp.path()).unwrap();
        Session::new(
            control,
            sink,
            SessionOptions {
                satellites: None,
                generation: None,
                read_timeout: Duration::from_millis(50),
                connect_timeout: Duration::from_millis(50),
            },
        )
    }

    #[tokio::test]
    async fn test_complete_count_overrides_control_estimate() {
        let temp = TempDir::new().unwrap();
        let mut session = test_session(&temp);
        session.frames_expected = Some(5); // control phase said 5

        let mut source = ScriptedSource::new(vec![
            frame_msg(0, "f0.png"),
            frame_msg(1, "f1.png"),
            frame_msg(2, "f2.png"),
            complete_msg(3), // the stream's own count wins
        ]);
        let outcome = session.drain(&mut source, &CancellationToken::new()).await;
        let report = session.finish(outcome, None).await;

        assert_eq!(report.outcome, Outcome::Completed);
        assert_eq!(report.frames_received, 3);
        assert_eq!(report.frames_expected, Some(3));

        let summary = std::fs::read_to_string(report.summary_path.unwrap()).unwrap();
        assert!(summary.contains("Frames Received: 3"));
        assert!(summary.contains("Total Expected: 3"));
    }

    #[tokio::test]
    async fn test_malformed_message_does_not_stop_the_stream() {
        let temp = TempDir::new().unwrap();
        let session_temp_path = temp.path().to_path_buf();
        let mut session = test_session(&temp);

        let mut source = ScriptedSource::new(vec![
            frame_msg(0, "f0.png"),
            Step::Text(r#"{"type":"status"}"#.to_string()), // missing data field
            frame_msg(1, "f1.png"),
            complete_msg(2),
        ]);
        let outcome = session.drain(&mut source, &CancellationToken::new()).await;

        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(session.frames_received, 2);
        assert_eq!(session.decode_failures, 1);
        assert!(session_temp_path.join("f0.png").exists());
        assert!(session_temp_path.join("f1.png").exists());
    }

    #[tokio::test]
    async fn test_read_timeout_is_a_terminal_outcome_with_partial_frames() {
        let temp = TempDir::new().unwrap();
        let mut session = test_session(&temp);
        session.frames_expected = Some(10);

        let steps = (0..7).map(|i| frame_msg(i, &format!("f{i}.png"))).collect();
        let mut source = ScriptedSource::new(steps);
        let outcome = session.drain(&mut source, &CancellationToken::new()).await;
        let report = session.finish(outcome, None).await;

        assert_eq!(report.outcome, Outcome::TimedOut);
        assert_eq!(report.frames_received, 7);
        assert_eq!(report.frames_expected, Some(10));
        let summary = std::fs::read_to_string(report.summary_path.unwrap()).unwrap();
        assert!(summary.contains("Outcome: timed out"));
        assert!(summary.contains("Frames Received: 7"));
    }

    #[tokio::test]
    async fn test_traversal_name_is_counted_not_written() {
        let temp = TempDir::new().unwrap();
        let mut session = test_session(&temp);

        let mut source = ScriptedSource::new(vec![
            frame_msg(0, "../../etc/passwd"),
            frame_msg(1, "good.png"),
            complete_msg(2),
        ]);
        let outcome = session.drain(&mut source, &CancellationToken::new()).await;

        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(session.frames_received, 1);
        assert_eq!(session.persistence_failures, 1);
        // only the safe frame landed in the output root
        let names: Vec<_> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec!["good.png"]);
    }

    #[tokio::test]
    async fn test_undecodable_payload_counts_as_persistence_failure() {
        let temp = TempDir::new().unwrap();
        let mut session = test_session(&temp);

        let mut source = ScriptedSource::new(vec![
            Step::Text(
                r#"{"type":"frame","index":4,"total":10,"filename":"f.png","timestamp":"t","data":"%%%"}"#
                    .to_string(),
            ),
            complete_msg(1),
        ]);
        let outcome = session.drain(&mut source, &CancellationToken::new()).await;

        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(session.frames_received, 0);
        assert_eq!(session.persistence_failures, 1);
        assert_eq!(session.decode_failures, 0);
    }

    #[tokio::test]
    async fn test_transport_error_fails_the_session() {
        let temp = TempDir::new().unwrap();
        let mut session = test_session(&temp);

        let mut source = ScriptedSource::new(vec![
            frame_msg(0, "f0.png"),
            Step::Error(StreamError::Transport {
                reason: "connection reset".to_string(),
            }),
        ]);
        let outcome = session.drain(&mut source, &CancellationToken::new()).await;

        assert!(matches!(outcome, Outcome::Failed(_)));
        assert_eq!(session.frames_received, 1);
    }

    #[tokio::test]
    async fn test_clean_close_without_complete_fails_the_session() {
        let temp = TempDir::new().unwrap();
        let mut session = test_session(&temp);

        let mut source = ScriptedSource::new(vec![frame_msg(0, "f0.png"), Step::Close]);
        let outcome = session.drain(&mut source, &CancellationToken::new()).await;

        assert_eq!(
            outcome,
            Outcome::Failed("stream closed before completion".to_string())
        );
    }

    #[tokio::test]
    async fn test_cancellation_ends_the_stream_and_keeps_counts() {
        let temp = TempDir::new().unwrap();
        let mut session = test_session(&temp);

        let cancel = CancellationToken::new();
        cancel.cancel();
        // source would hang forever; cancellation must win the select
        let mut source = ScriptedSource::new(vec![]);
        let outcome = session.drain(&mut source, &cancel).await;
        let report = session.finish(outcome, None).await;

        assert_eq!(report.outcome, Outcome::Failed("cancelled".to_string()));
        assert!(report.summary_path.is_some());
    }

    #[tokio::test]
    async fn test_initialize_failure_prevents_streaming() {
        let temp = TempDir::new().unwrap();
        // nothing listens on port 9; the control call fails fast
        let control = ControlClient::new("127.0.0.1:9").unwrap();
        let sink = FrameSink::new(temp.path()).unwrap();
        let session = Session::new(
            control,
            sink,
            SessionOptions {
                satellites: Some(serde_json::json!([{"id": 1}])),
                generation: Some(GenerationParams {
                    duration_seconds: 60,
                    step_seconds: 10,
                    start_time: None,
                }),
                read_timeout: Duration::from_millis(50),
                connect_timeout: Duration::from_millis(50),
            },
        );

        let report = session.run(CancellationToken::new()).await;

        assert!(matches!(report.outcome, Outcome::Failed(_)));
        assert_eq!(report.frames_received, 0);
        assert_eq!(report.frames_expected, None); // generation never ran
        let summary = std::fs::read_to_string(report.summary_path.unwrap()).unwrap();
        assert!(summary.contains("Frames Received: 0"));
    }
}
