//! Process-backed executors.
//!
//! A [`ProcessExecutor`] owns one long-lived sandboxed worker process that
//! runs a small driver program for its language. Code is sent to the driver
//! over the JSON-lines [`protocol`](crate::protocol); output and the final
//! outcome come back as events.
//!
//! While an execution is in flight the worker is moved out of the shared
//! state, so `terminate()` can run synchronously: it bumps the generation,
//! cancels the in-flight token and kills the worker's process group. The
//! execution then notices the cancellation (or the closed pipes) and drops
//! the worker instead of putting it back.
//!
//! A timed-out or crashed worker is destroyed and a replacement is started in
//! the background, so the next `initialize()` usually finds it ready.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use snipbox_sandbox::{IsolatedProcess, KillHandle, Plan};
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::process::ChildStdin;
use tokio::sync::mpsc;
use tokio_util::codec::{BytesCodec, FramedRead, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;

use crate::capture::{OutputCapture, Stream};
use crate::error::{Error, Result};
use crate::executor::{AdapterState, CodeExecutor};
use crate::options::ExecutionOptions;
use crate::protocol::{Event, RequestId, decode_event, encode_request};
use crate::result::{ErrorInfo, ExecutionResult};
use crate::timeout::{Deadline, Raced, race_against_deadline};

/// How long to wait for an exit status after the protocol stream closes.
const EXIT_STATUS_GRACE: Duration = Duration::from_millis(200);

/// Longest protocol line accepted from a driver. Drivers split output into
/// events far below this, so a longer line means a broken worker.
pub const MAX_EVENT_LINE: usize = 1024 * 1024;

/// Messages buffered between the reader tasks and the execution; a full
/// backlog stalls the worker on its pipes instead of growing host memory.
const MESSAGE_BACKLOG: usize = 64;

/// Startup stderr kept for the initialization error message.
const STARTUP_STDERR_LIMIT: usize = 4096;

/// A language that runs as a driver inside a sandboxed worker.
pub trait Runtime: Send + Sync + 'static {
    fn language(&self) -> &'static str;

    fn file_extensions(&self) -> &'static [&'static str];

    /// Locate the interpreter and describe the worker to start.
    ///
    /// May block (runs probe scripts); called on the blocking pool.
    fn plan(&self) -> Result<Plan>;
}

/// Message from a worker's reader tasks.
#[derive(Debug)]
enum WorkerMessage {
    Event(Event),
    /// Text written to the worker's raw stderr.
    Stderr(String),
}

enum RunOutcome {
    Done(Option<ErrorInfo>),
    Exited(String),
}

/// A running driver process.
struct Worker {
    process: IsolatedProcess,
    stdin: ChildStdin,
    messages: mpsc::Receiver<WorkerMessage>,
    next_id: RequestId,
}

impl Worker {
    fn spawn(plan: Plan) -> std::result::Result<Self, String> {
        let mut process = IsolatedProcess::spawn(plan).map_err(|e| e.to_string())?;
        let (Some(stdin), Some(stdout), Some(stderr)) =
            (process.take_stdin(), process.take_stdout(), process.take_stderr())
        else {
            return Err("worker stdio is not piped".into());
        };

        let (tx, messages) = mpsc::channel(MESSAGE_BACKLOG);
        tokio::spawn(read_events(stdout, tx.clone(), process.kill_handle()));
        tokio::spawn(read_stderr(stderr, tx));

        Ok(Self {
            process,
            stdin,
            messages,
            next_id: 1,
        })
    }

    fn kill_handle(&self) -> KillHandle {
        self.process.kill_handle()
    }

    /// Wait for the driver's `ready` event; returns the runtime version.
    async fn wait_ready(&mut self) -> std::result::Result<String, String> {
        let mut startup_stderr = String::new();
        loop {
            match self.messages.recv().await {
                Some(WorkerMessage::Event(Event::Ready { version })) => return Ok(version),
                Some(WorkerMessage::Stderr(text)) => {
                    if startup_stderr.len() < STARTUP_STDERR_LIMIT {
                        startup_stderr.push_str(&text);
                    }
                }
                Some(WorkerMessage::Event(_)) => {}
                None => {
                    let status = self.exit_detail().await;
                    let stderr = startup_stderr.trim();
                    return Err(if stderr.is_empty() {
                        format!("worker exited before ready ({status})")
                    } else {
                        format!("worker exited before ready ({status}): {stderr}")
                    });
                }
            }
        }
    }

    /// Send `code` and collect events until its `done`.
    async fn run(&mut self, code: &str, capture: &mut OutputCapture) -> RunOutcome {
        let id = self.next_id;
        self.next_id += 1;

        let line = match encode_request(id, code) {
            Ok(line) => line,
            Err(e) => return RunOutcome::Exited(format!("cannot encode request: {e}")),
        };
        if let Err(e) = self.send(&line).await {
            return RunOutcome::Exited(format!("cannot write to worker: {e}"));
        }

        loop {
            match self.messages.recv().await {
                Some(WorkerMessage::Event(Event::Done { id: done, error })) if done == id => {
                    self.drain_stderr(capture);
                    return RunOutcome::Done(error.map(ErrorInfo::from));
                }
                Some(WorkerMessage::Event(event)) => match event.output() {
                    Some((event_id, stream, text)) if event_id == id => capture.write(stream, text),
                    _ => tracing::trace!(?event, expected = id, "discarding stale worker event"),
                },
                Some(WorkerMessage::Stderr(text)) => capture.write(Stream::Stderr, &text),
                None => return RunOutcome::Exited(self.exit_detail().await),
            }
        }
    }

    async fn send(&mut self, line: &str) -> std::io::Result<()> {
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await
    }

    /// Raw stderr and protocol events travel on different pipes; pick up
    /// whatever raw stderr already arrived before `done`.
    fn drain_stderr(&mut self, capture: &mut OutputCapture) {
        while let Ok(message) = self.messages.try_recv() {
            if let WorkerMessage::Stderr(text) = message {
                capture.write(Stream::Stderr, &text);
            }
        }
    }

    async fn exit_detail(&mut self) -> String {
        match tokio::time::timeout(EXIT_STATUS_GRACE, self.process.wait()).await {
            Ok(Ok(status)) => status.to_string(),
            Ok(Err(e)) => format!("wait failed: {e}"),
            Err(_) => "protocol stream closed".to_string(),
        }
    }
}

async fn read_events<R: AsyncRead + Unpin>(
    stdout: R,
    tx: mpsc::Sender<WorkerMessage>,
    kill: KillHandle,
) {
    let mut lines = FramedRead::new(stdout, LinesCodec::new_with_max_length(MAX_EVENT_LINE));
    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(line) => line,
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                tracing::warn!(limit = MAX_EVENT_LINE, "oversized worker event; killing worker");
                kill.kill();
                return;
            }
            Err(LinesCodecError::Io(_)) => return,
        };
        if line.trim().is_empty() {
            continue;
        }
        match decode_event(&line) {
            Ok(event) => {
                if tx.send(WorkerMessage::Event(event)).await.is_err() {
                    return;
                }
            }
            Err(e) => tracing::warn!(error = %e, line = %line, "malformed worker event"),
        }
    }
}

/// Forward raw stderr in read-sized chunks; no line is ever buffered whole.
async fn read_stderr<R: AsyncRead + Unpin>(stderr: R, tx: mpsc::Sender<WorkerMessage>) {
    let mut chunks = FramedRead::new(stderr, BytesCodec::new());
    let mut pending = Vec::new();
    while let Some(Ok(chunk)) = chunks.next().await {
        pending.extend_from_slice(&chunk);
        if let Some(text) = take_text(&mut pending)
            && tx.send(WorkerMessage::Stderr(text)).await.is_err()
        {
            return;
        }
    }
    if !pending.is_empty() {
        let text = String::from_utf8_lossy(&pending).into_owned();
        tx.send(WorkerMessage::Stderr(text)).await.ok();
    }
}

/// Decode the longest prefix of `pending` that does not end inside a UTF-8
/// sequence; invalid bytes become U+FFFD.
fn take_text(pending: &mut Vec<u8>) -> Option<String> {
    let complete = match std::str::from_utf8(pending) {
        Ok(_) => pending.len(),
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        Err(_) => pending.len(),
    };
    if complete == 0 {
        return None;
    }
    let text = String::from_utf8_lossy(&pending[..complete]).into_owned();
    pending.drain(..complete);
    Some(text)
}

struct Inner {
    state: AdapterState,
    /// Bumped by every `terminate()`; work started under an older
    /// generation never writes back.
    generation: u64,
    worker: Option<Worker>,
    /// Kill switch of the current worker, kept while the worker itself is
    /// checked out by an execution.
    kill: Option<KillHandle>,
    cancel: CancellationToken,
    init_attempts: u64,
    last_init: Option<Result<()>>,
}

struct Shared<R> {
    runtime: Arc<R>,
    defaults: ExecutionOptions,
    init_timeout: Duration,
    inner: Mutex<Inner>,
    init_lock: tokio::sync::Mutex<()>,
}

/// [`CodeExecutor`] backed by a sandboxed worker process.
pub struct ProcessExecutor<R: Runtime> {
    shared: Arc<Shared<R>>,
}

impl<R: Runtime> ProcessExecutor<R> {
    pub fn new(runtime: R, defaults: ExecutionOptions, init_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                runtime: Arc::new(runtime),
                defaults,
                init_timeout,
                inner: Mutex::new(Inner {
                    state: AdapterState::Uninitialized,
                    generation: 0,
                    worker: None,
                    kill: None,
                    cancel: CancellationToken::new(),
                    init_attempts: 0,
                    last_init: None,
                }),
                init_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn runtime(&self) -> &R {
        &self.shared.runtime
    }

    pub fn defaults(&self) -> ExecutionOptions {
        self.shared.defaults
    }

    /// Worker process id, when one is running and not checked out.
    pub fn worker_pid(&self) -> Option<u32> {
        self.shared.lock().worker.as_ref().and_then(|w| w.process.id())
    }
}

impl<R: Runtime> Shared<R> {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn language(&self) -> &'static str {
        self.runtime.language()
    }

    async fn initialize(&self) -> Result<()> {
        let observed = {
            let inner = self.lock();
            if inner.state == AdapterState::Ready {
                return Ok(());
            }
            inner.init_attempts
        };

        let _serialized = self.init_lock.lock().await;

        let (generation, cancel) = {
            let mut inner = self.lock();
            match inner.state {
                AdapterState::Ready | AdapterState::Executing => return Ok(()),
                _ => {}
            }
            if inner.init_attempts != observed
                && let Some(Err(e)) = &inner.last_init
            {
                return Err(e.clone());
            }
            inner.state = AdapterState::Initializing;
            inner.init_attempts += 1;
            (inner.generation, inner.cancel.clone())
        };

        let started = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::init(self.language(), "terminated during initialization")),
            started = self.start_worker() => started,
        };

        let mut inner = self.lock();
        if inner.generation != generation {
            // terminate() already reset the state; the new worker is dropped.
            let err = Error::init(self.language(), "terminated during initialization");
            inner.last_init = Some(Err(err.clone()));
            return Err(err);
        }

        let outcome = match started {
            Ok(worker) => {
                inner.kill = Some(worker.kill_handle());
                inner.worker = Some(worker);
                inner.state = AdapterState::Ready;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(language = self.language(), error = %e, "runtime initialization failed");
                inner.state = AdapterState::Uninitialized;
                Err(e)
            }
        };
        inner.last_init = Some(outcome.clone());
        outcome
    }

    async fn start_worker(&self) -> Result<Worker> {
        let language = self.language();
        let deadline = Deadline::after(self.init_timeout);

        let runtime = self.runtime.clone();
        let plan = tokio::task::spawn_blocking(move || runtime.plan())
            .await
            .map_err(|e| Error::init(language, e))??;

        let mut worker = Worker::spawn(plan).map_err(|e| Error::init(language, e))?;
        let kill = worker.kill_handle();

        match deadline.race(worker.wait_ready(), || kill.kill()).await {
            Raced::Completed(Ok(version)) => {
                tracing::info!(
                    language,
                    version = %version,
                    pid = ?worker.process.id(),
                    elapsed_ms = deadline.elapsed().as_millis() as u64,
                    "runtime worker ready"
                );
                Ok(worker)
            }
            Raced::Completed(Err(message)) => Err(Error::init(language, message)),
            Raced::TimedOut => Err(Error::init(
                language,
                format!(
                    "worker not ready after {} ms",
                    deadline.timeout().as_millis()
                ),
            )),
        }
    }

    async fn execute(
        self: &Arc<Self>,
        code: &str,
        options: Option<ExecutionOptions>,
    ) -> Result<ExecutionResult> {
        let options = options.unwrap_or(self.defaults);
        options.validate()?;

        let (mut worker, generation, cancel) = {
            let mut inner = self.lock();
            match inner.state {
                AdapterState::Ready => {}
                AdapterState::Executing => return Err(Error::Busy(self.language().into())),
                _ => return Err(Error::NotInitialized(self.language().into())),
            }
            let Some(worker) = inner.worker.take() else {
                inner.state = AdapterState::Uninitialized;
                return Err(Error::NotInitialized(self.language().into()));
            };
            inner.state = AdapterState::Executing;
            (worker, inner.generation, inner.cancel.clone())
        };

        tracing::debug!(
            language = self.language(),
            request = worker.next_id,
            timeout_ms = options.timeout.as_millis() as u64,
            "executing"
        );

        let kill = worker.kill_handle();
        let mut capture = OutputCapture::from_options(&options);
        let run = async {
            tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                outcome = worker.run(code, &mut capture) => Some(outcome),
            }
        };
        let raced = race_against_deadline(run, options.timeout, || kill.kill()).await;
        let output = capture.into_snapshot();

        let result = match raced {
            Raced::Completed(Some(RunOutcome::Done(error))) => {
                self.check_in(worker, generation);
                return Ok(ExecutionResult::completed(output, error));
            }
            Raced::Completed(Some(RunOutcome::Exited(detail))) => {
                tracing::warn!(language = self.language(), detail = %detail, "runtime worker exited during execution");
                ExecutionResult::failed(output, ErrorInfo::worker_exited(detail))
            }
            Raced::Completed(None) => {
                tracing::debug!(language = self.language(), "execution terminated");
                ExecutionResult::failed(output, ErrorInfo::terminated())
            }
            Raced::TimedOut => {
                tracing::warn!(
                    language = self.language(),
                    timeout_ms = options.timeout.as_millis() as u64,
                    "execution timed out; worker killed"
                );
                ExecutionResult::timed_out(output, options.timeout)
            }
        };

        drop(worker);
        self.discard(generation);
        Ok(result)
    }

    /// Return a healthy worker after an execution.
    fn check_in(&self, worker: Worker, generation: u64) {
        let mut inner = self.lock();
        if inner.generation == generation && inner.state == AdapterState::Executing {
            inner.worker = Some(worker);
            inner.state = AdapterState::Ready;
        }
    }

    /// Forget a destroyed worker and start a replacement in the background.
    fn discard(self: &Arc<Self>, generation: u64) {
        {
            let mut inner = self.lock();
            if inner.generation != generation || inner.state != AdapterState::Executing {
                return;
            }
            inner.kill = None;
            inner.state = AdapterState::Uninitialized;
        }

        let shared = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = shared.initialize().await {
                tracing::warn!(language = shared.language(), error = %e, "failed to replace runtime worker");
            }
        });
    }

    fn terminate(&self) {
        let worker = {
            let mut inner = self.lock();
            inner.state = AdapterState::Terminated;
            inner.generation += 1;
            inner.cancel.cancel();
            inner.cancel = CancellationToken::new();
            if let Some(kill) = inner.kill.take() {
                kill.kill();
            }
            let worker = inner.worker.take();
            inner.state = AdapterState::Uninitialized;
            worker
        };
        if worker.is_some() {
            tracing::debug!(language = self.language(), "runtime worker terminated");
        }
    }
}

#[async_trait]
impl<R: Runtime> CodeExecutor for ProcessExecutor<R> {
    fn language(&self) -> &str {
        self.shared.language()
    }

    fn file_extensions(&self) -> &[&str] {
        self.shared.runtime.file_extensions()
    }

    fn state(&self) -> AdapterState {
        self.shared.lock().state
    }

    async fn initialize(&self) -> Result<()> {
        self.shared.initialize().await
    }

    async fn execute(&self, code: &str, options: Option<ExecutionOptions>) -> Result<ExecutionResult> {
        self.shared.execute(code, options).await
    }

    fn terminate(&self) {
        self.shared.terminate();
    }
}

impl<R: Runtime> Drop for ProcessExecutor<R> {
    fn drop(&mut self) {
        self.shared.terminate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::DEFAULT_EXECUTION_OPTIONS;

    /// A shell "driver" speaking just enough of the protocol.
    struct ShellRuntime {
        script: &'static str,
    }

    impl Runtime for ShellRuntime {
        fn language(&self) -> &'static str {
            "shell"
        }

        fn file_extensions(&self) -> &'static [&'static str] {
            &["sh"]
        }

        fn plan(&self) -> Result<Plan> {
            Ok(Plan::new(["/bin/sh", "-c", self.script]))
        }
    }

    fn executor(script: &'static str) -> ProcessExecutor<ShellRuntime> {
        ProcessExecutor::new(
            ShellRuntime { script },
            ExecutionOptions::default(),
            Duration::from_secs(5),
        )
    }

    const ECHO_DRIVER: &str = r#"
echo '{"type":"ready","version":"sh"}'
while read -r line; do
  id=$(printf '%s' "$line" | sed 's/.*"id":\([0-9]*\).*/\1/')
  printf '{"type":"stdout","id":%s,"text":"ran %s\\n"}\n' "$id" "$id"
  printf '{"type":"stdout","id":999,"text":"stale\\n"}\n'
  echo "raw stderr" >&2
  printf '{"type":"done","id":%s,"error":null}\n' "$id"
done
"#;

    const HANGING_DRIVER: &str = r#"
echo '{"type":"ready","version":"sh"}'
while read -r line; do
  sleep 30
done
"#;

    /// Slow to start, then hangs on every request.
    const SLOW_HANGING_DRIVER: &str = r#"
sleep 0.5
echo '{"type":"ready","version":"sh"}'
while read -r line; do
  sleep 30
done
"#;

    const FAILING_DRIVER: &str = "echo 'no interpreter here' >&2; exit 3";

    /// Answers every request with one protocol line longer than the limit.
    const OVERSIZED_DRIVER: &str = r#"
echo '{"type":"ready","version":"sh"}'
while read -r line; do
  yes x | head -c 2400000 | tr -d '\n'
  echo
done
"#;

    /// Floods raw stderr with one 5 MB line before finishing.
    const STDERR_FLOOD_DRIVER: &str = r#"
echo '{"type":"ready","version":"sh"}'
while read -r line; do
  id=$(printf '%s' "$line" | sed 's/.*"id":\([0-9]*\).*/\1/')
  yes y | head -c 10000000 | tr -d '\n' >&2
  printf '{"type":"done","id":%s,"error":null}\n' "$id"
done
"#;

    #[tokio::test]
    async fn execute_before_initialize_is_not_initialized() {
        let exec = executor(ECHO_DRIVER);
        let err = exec.execute("x", None).await.unwrap_err();
        assert!(matches!(err, Error::NotInitialized(_)));
    }

    #[tokio::test]
    async fn initialize_and_execute() {
        let exec = executor(ECHO_DRIVER);
        exec.initialize().await.unwrap();
        assert!(exec.is_ready());
        let pid = exec.worker_pid();

        // Second initialize is a no-op: same worker.
        exec.initialize().await.unwrap();
        assert_eq!(exec.worker_pid(), pid);

        let result = exec.execute("anything", None).await.unwrap();
        assert!(result.success, "{result:?}");
        assert_eq!(result.stdout, "ran 1\n");
        assert!(!result.stdout.contains("stale"));
        assert!(exec.is_ready());

        let result = exec.execute("again", None).await.unwrap();
        assert_eq!(result.stdout, "ran 2\n");
    }

    #[tokio::test]
    async fn initialization_failure_returns_to_uninitialized() {
        let exec = executor(FAILING_DRIVER);
        let err = exec.initialize().await.unwrap_err();
        match err {
            Error::Initialization { language, message } => {
                assert_eq!(language, "shell");
                assert!(message.contains("no interpreter here"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(exec.state(), AdapterState::Uninitialized);
    }

    #[tokio::test]
    async fn timeout_kills_and_replaces_worker() {
        let exec = executor(HANGING_DRIVER);
        exec.initialize().await.unwrap();

        let opts = ExecutionOptions::default().with_timeout_ms(200);
        let start = std::time::Instant::now();
        let result = exec.execute("loop", Some(opts)).await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(result.timed_out);
        assert!(!result.success);
        assert!(result.error.unwrap().message.contains("timeout"));

        exec.initialize().await.unwrap();
        assert!(exec.is_ready());
    }

    #[tokio::test]
    async fn execute_during_replacement_is_not_initialized() {
        let exec = executor(SLOW_HANGING_DRIVER);
        exec.initialize().await.unwrap();

        let opts = ExecutionOptions::default().with_timeout_ms(100);
        let result = exec.execute("loop", Some(opts)).await.unwrap();
        assert!(result.timed_out);

        assert!(matches!(
            exec.state(),
            AdapterState::Uninitialized | AdapterState::Initializing
        ));
        let err = exec.execute("again", Some(opts)).await.unwrap_err();
        assert!(matches!(err, Error::NotInitialized(_)));

        exec.initialize().await.unwrap();
        assert!(exec.is_ready());
        let result = exec.execute("again", Some(opts)).await.unwrap();
        assert!(result.timed_out);
    }

    #[tokio::test]
    async fn busy_while_executing() {
        let exec = Arc::new(executor(HANGING_DRIVER));
        exec.initialize().await.unwrap();

        let running = {
            let exec = exec.clone();
            tokio::spawn(async move {
                exec.execute("loop", Some(ExecutionOptions::default().with_timeout_ms(500)))
                    .await
            })
        };
        while exec.state() != AdapterState::Executing {
            tokio::task::yield_now().await;
        }

        let err = exec.execute("second", None).await.unwrap_err();
        assert!(matches!(err, Error::Busy(_)));
        assert!(running.await.unwrap().unwrap().timed_out);
    }

    #[tokio::test]
    async fn terminate_interrupts_execution() {
        let exec = Arc::new(executor(HANGING_DRIVER));
        exec.initialize().await.unwrap();

        let running = {
            let exec = exec.clone();
            tokio::spawn(async move { exec.execute("loop", None).await })
        };
        while exec.state() != AdapterState::Executing {
            tokio::task::yield_now().await;
        }

        exec.terminate();
        let result = tokio::time::timeout(Duration::from_secs(2), running)
            .await
            .expect("terminate should end the execution promptly")
            .unwrap()
            .unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().is_kind(ErrorInfo::TERMINATED));

        assert_eq!(exec.state(), AdapterState::Uninitialized);
        let err = exec.execute("x", None).await.unwrap_err();
        assert!(matches!(err, Error::NotInitialized(_)));
    }

    #[tokio::test]
    async fn terminate_is_idempotent() {
        let exec = executor(ECHO_DRIVER);
        exec.terminate();
        exec.terminate();
        assert_eq!(exec.state(), AdapterState::Uninitialized);

        exec.initialize().await.unwrap();
        exec.terminate();
        exec.terminate();
        assert!(exec.worker_pid().is_none());
    }

    #[tokio::test]
    async fn concurrent_initialize_starts_one_worker() {
        let exec = Arc::new(executor(ECHO_DRIVER));
        let (a, b) = tokio::join!(exec.initialize(), exec.initialize());
        a.unwrap();
        b.unwrap();
        assert!(exec.is_ready());
        assert_eq!(exec.shared.lock().init_attempts, 1);
    }

    #[tokio::test]
    async fn invalid_options_rejected() {
        let exec = executor(ECHO_DRIVER);
        exec.initialize().await.unwrap();
        let err = exec
            .execute("x", Some(ExecutionOptions::default().with_max_output_lines(0)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidOptions(_)));
        assert!(exec.is_ready());
    }

    #[tokio::test]
    async fn oversized_event_line_ends_worker() {
        let exec = executor(OVERSIZED_DRIVER);
        exec.initialize().await.unwrap();

        let result = exec.execute("x", None).await.unwrap();
        assert!(!result.success);
        assert!(!result.timed_out);
        assert!(result.error.unwrap().is_kind(ErrorInfo::WORKER_EXITED));
    }

    #[tokio::test]
    async fn raw_stderr_flood_is_capped() {
        let exec = executor(STDERR_FLOOD_DRIVER);
        exec.initialize().await.unwrap();

        let result = exec.execute("x", None).await.unwrap();
        assert!(result.success, "{:?}", result.error);
        assert!(result.truncated);
        assert_eq!(result.stderr.len(), DEFAULT_EXECUTION_OPTIONS.max_output_bytes);
        assert!(result.stderr.bytes().all(|b| b == b'y'));
        assert!(exec.is_ready());
    }

    #[test]
    fn take_text_waits_for_complete_characters() {
        let bytes = "añb".as_bytes();
        let mut pending = bytes[..2].to_vec();
        assert_eq!(take_text(&mut pending).as_deref(), Some("a"));
        assert_eq!(pending, &bytes[1..2]);

        assert_eq!(take_text(&mut pending), None);
        pending.extend_from_slice(&bytes[2..]);
        assert_eq!(take_text(&mut pending).as_deref(), Some("ñb"));
        assert!(pending.is_empty());

        let mut invalid = vec![b'a', 0xff, b'b'];
        assert_eq!(take_text(&mut invalid).as_deref(), Some("a\u{fffd}b"));
    }
}
