//! The sandbox facade: the single entry point for callers.

use std::sync::Arc;
use std::time::Instant;

use crate::error::Result;
use crate::options::ExecutionOptions;
use crate::registry::{ExecutorHandle, ExecutorRegistry};
use crate::result::ExecutionResult;

/// Runs code in any registered language.
///
/// ```ignore
/// let sandbox = Sandbox::global();
/// let result = sandbox.execute("python", "print('Hello')", None).await?;
/// assert_eq!(result.stdout, "Hello\n");
/// ```
#[derive(Debug, Clone)]
pub struct Sandbox {
    registry: Arc<ExecutorRegistry>,
}

impl Sandbox {
    pub fn new(registry: Arc<ExecutorRegistry>) -> Self {
        Self { registry }
    }

    /// Sandbox over the process-wide registry.
    pub fn global() -> Self {
        Self::new(ExecutorRegistry::global())
    }

    pub fn registry(&self) -> &ExecutorRegistry {
        &self.registry
    }

    /// Execute `code` in `language` (an id, alias or file extension).
    ///
    /// Runtime errors and timeouts are reported inside the result. `Err` means
    /// the language is unknown, the options are invalid, or the runtime could
    /// not be initialized.
    pub async fn execute(
        &self,
        language: &str,
        code: &str,
        options: Option<ExecutionOptions>,
    ) -> Result<ExecutionResult> {
        if code.trim().is_empty() {
            self.registry.language_id(language)?;
            return Ok(ExecutionResult::empty());
        }

        if let Some(options) = &options {
            options.validate()?;
        }
        let executor = self.registry.resolve(language).await?;

        if !executor.is_ready() {
            executor.initialize().await?;
        }

        let start = Instant::now();
        let result = executor.execute(code, options).await?;
        Ok(result.with_execution_time(start.elapsed()))
    }

    /// Initialize `language` ahead of its first execution.
    pub async fn prewarm(&self, language: &str) -> Result<()> {
        self.registry.resolve(language).await?.initialize().await
    }

    /// Cancel whatever `language` is running and release its worker.
    ///
    /// A language that was never used has nothing to terminate.
    pub fn terminate(&self, language: &str) -> Result<()> {
        if let Some(executor) = self.registry.loaded(language)? {
            tracing::debug!(language = executor.language(), "terminating executor");
            executor.terminate();
        }
        Ok(())
    }

    /// The executor behind `language`, constructing it if needed.
    pub async fn adapter(&self, language: &str) -> Result<ExecutorHandle> {
        self.registry.resolve(language).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::capture::CaptureSnapshot;
    use crate::error::Error;
    use crate::executor::{AdapterState, CodeExecutor};
    use crate::registry::LanguageSpec;

    /// Records calls; "executes" by echoing the code after a short delay.
    struct Recorder {
        state: Mutex<AdapterState>,
        inits: AtomicUsize,
        terminations: AtomicUsize,
        seen: Mutex<Vec<ExecutionOptions>>,
        fail_init: bool,
    }

    impl Recorder {
        fn new(fail_init: bool) -> Arc<Self> {
            Arc::new(Self {
                state: Mutex::new(AdapterState::Uninitialized),
                inits: AtomicUsize::new(0),
                terminations: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
                fail_init,
            })
        }
    }

    #[async_trait]
    impl CodeExecutor for Recorder {
        fn language(&self) -> &str {
            "echo"
        }
        fn file_extensions(&self) -> &[&str] {
            &["echo"]
        }
        fn state(&self) -> AdapterState {
            *self.state.lock().unwrap()
        }
        async fn initialize(&self) -> Result<()> {
            self.inits.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail_init {
                return Err(Error::init("echo", "no runtime"));
            }
            *self.state.lock().unwrap() = AdapterState::Ready;
            Ok(())
        }
        async fn execute(&self, code: &str, options: Option<ExecutionOptions>) -> Result<ExecutionResult> {
            if !self.is_ready() {
                return Err(Error::NotInitialized("echo".into()));
            }
            self.seen.lock().unwrap().extend(options);
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(ExecutionResult::completed(
                CaptureSnapshot {
                    stdout: format!("{code}\n"),
                    ..Default::default()
                },
                None,
            ))
        }
        fn terminate(&self) {
            self.terminations.fetch_add(1, Ordering::SeqCst);
            *self.state.lock().unwrap() = AdapterState::Uninitialized;
        }
    }

    fn sandbox_with(recorder: Arc<Recorder>) -> Sandbox {
        let registry = ExecutorRegistry::builder()
            .register(LanguageSpec::new("echo").extensions(["echo"]), move || {
                let recorder = recorder.clone();
                async move { Ok(recorder as ExecutorHandle) }
            })
            .build()
            .unwrap();
        Sandbox::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn initializes_then_executes() {
        let recorder = Recorder::new(false);
        let sandbox = sandbox_with(recorder.clone());

        let result = sandbox.execute("echo", "hi", None).await.unwrap();
        assert!(result.success);
        assert_eq!(result.stdout, "hi\n");
        assert!(result.execution_time >= Duration::from_millis(10));

        sandbox.execute(".ECHO", "again", None).await.unwrap();
        assert_eq!(recorder.inits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn passes_options_through() {
        let recorder = Recorder::new(false);
        let sandbox = sandbox_with(recorder.clone());

        sandbox.execute("echo", "x", None).await.unwrap();
        let custom = ExecutionOptions::default().with_timeout_ms(200);
        sandbox.execute("echo", "y", Some(custom)).await.unwrap();

        let seen = recorder.seen.lock().unwrap().clone();
        // `None` is left for the executor to fill from its own defaults.
        assert_eq!(seen, vec![custom]);
    }

    #[tokio::test]
    async fn empty_code_is_trivial_success() {
        let recorder = Recorder::new(false);
        let sandbox = sandbox_with(recorder.clone());

        for code in ["", "   \n\t"] {
            let result = sandbox.execute("echo", code, None).await.unwrap();
            assert!(result.success);
            assert_eq!(result.stdout, "");
            assert_eq!(result.stderr, "");
            assert_eq!(result.execution_time, Duration::ZERO);
        }
        assert_eq!(recorder.inits.load(Ordering::SeqCst), 0);
        assert!(sandbox.registry().loaded("echo").unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_code_still_checks_language() {
        let sandbox = sandbox_with(Recorder::new(false));
        let err = sandbox.execute("cobol", "", None).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedLanguage(_)));
    }

    #[tokio::test]
    async fn invalid_options_rejected() {
        let sandbox = sandbox_with(Recorder::new(false));
        let opts = ExecutionOptions::default().with_timeout(Duration::ZERO);
        let err = sandbox.execute("echo", "x", Some(opts)).await.unwrap_err();
        assert!(matches!(err, Error::InvalidOptions(_)));
    }

    #[tokio::test]
    async fn initialization_error_surfaces_unchanged() {
        let sandbox = sandbox_with(Recorder::new(true));
        let err = sandbox.execute("echo", "x", None).await.unwrap_err();
        match err {
            Error::Initialization { language, message } => {
                assert_eq!(language, "echo");
                assert_eq!(message, "no runtime");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn terminate_unused_language_is_noop() {
        let recorder = Recorder::new(false);
        let sandbox = sandbox_with(recorder.clone());
        sandbox.terminate("echo").unwrap();
        assert_eq!(recorder.terminations.load(Ordering::SeqCst), 0);
        assert!(sandbox.terminate("cobol").is_err());
    }

    #[tokio::test]
    async fn terminate_then_execute_reinitializes() {
        let recorder = Recorder::new(false);
        let sandbox = sandbox_with(recorder.clone());

        sandbox.prewarm("echo").await.unwrap();
        sandbox.terminate("echo").unwrap();
        assert_eq!(recorder.terminations.load(Ordering::SeqCst), 1);

        let adapter = sandbox.adapter("echo").await.unwrap();
        let err = adapter.execute("x", None).await.unwrap_err();
        assert!(matches!(err, Error::NotInitialized(_)));

        assert!(sandbox.execute("echo", "x", None).await.unwrap().success);
        assert_eq!(recorder.inits.load(Ordering::SeqCst), 2);
    }
}
