//! Language → executor registry.
//!
//! Executors are expensive to initialize, so the registry keeps at most one
//! instance per language for its whole lifetime. Instances are constructed
//! lazily on first [`resolve`](ExecutorRegistry::resolve); concurrent callers
//! for the same language wait on the single in-flight construction.
//!
//! Identifiers are matched case-insensitively against the language id, its
//! aliases and its file extensions (with or without the leading dot):
//! `"python"`, `"PY"`, `".py"` and `"python3"` all resolve to Python.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, LazyLock};

use tokio::sync::OnceCell;

use crate::config::SandboxConfig;
use crate::error::{Error, Result};
use crate::executor::CodeExecutor;
use crate::javascript::{self, JavaScriptExecutor};
use crate::python::{self, PythonExecutor};

/// Shared handle to a constructed executor.
pub type ExecutorHandle = Arc<dyn CodeExecutor>;

type FactoryFuture = Pin<Box<dyn Future<Output = Result<ExecutorHandle>> + Send>>;
type Factory = Arc<dyn Fn() -> FactoryFuture + Send + Sync>;

static GLOBAL: LazyLock<Arc<ExecutorRegistry>> = LazyLock::new(|| {
    let config = SandboxConfig::from_env().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "ignoring invalid sandbox configuration");
        SandboxConfig::default()
    });
    Arc::new(ExecutorRegistry::with_defaults(config))
});

/// Names under which a language can be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageSpec {
    pub id: String,
    pub aliases: Vec<String>,
    pub extensions: Vec<String>,
}

impl LanguageSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            aliases: Vec::new(),
            extensions: Vec::new(),
        }
    }

    pub fn aliases<S: Into<String>>(mut self, aliases: impl IntoIterator<Item = S>) -> Self {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    pub fn extensions<S: Into<String>>(mut self, extensions: impl IntoIterator<Item = S>) -> Self {
        self.extensions.extend(extensions.into_iter().map(Into::into));
        self
    }

    fn keys(&self) -> impl Iterator<Item = String> + '_ {
        std::iter::once(&self.id)
            .chain(&self.aliases)
            .chain(&self.extensions)
            .map(|name| normalize(name))
    }
}

fn normalize(identifier: &str) -> String {
    let trimmed = identifier.trim();
    trimmed.strip_prefix('.').unwrap_or(trimmed).to_ascii_lowercase()
}

struct Entry {
    spec: LanguageSpec,
    factory: Factory,
    slot: OnceCell<ExecutorHandle>,
}

pub struct ExecutorRegistry {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field(
                "languages",
                &self.entries.iter().map(|e| &e.spec.id).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ExecutorRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Registry with the built-in Python and JavaScript executors.
    pub fn with_defaults(config: SandboxConfig) -> Self {
        let config = Arc::new(config);
        let python_config = config.clone();
        let javascript_config = config;

        let builder = Self::builder()
            .register(
                LanguageSpec::new(python::LANGUAGE)
                    .aliases(python::ALIASES.iter().copied())
                    .extensions(python::EXTENSIONS.iter().copied()),
                move || {
                    let config = python_config.clone();
                    async move {
                        Ok(Arc::new(PythonExecutor::from_config(&config)) as ExecutorHandle)
                    }
                },
            )
            .register(
                LanguageSpec::new(javascript::LANGUAGE)
                    .aliases(javascript::ALIASES.iter().copied())
                    .extensions(javascript::EXTENSIONS.iter().copied()),
                move || {
                    let config = javascript_config.clone();
                    async move {
                        Ok(Arc::new(JavaScriptExecutor::from_config(&config)) as ExecutorHandle)
                    }
                },
            );

        // The built-in names are disjoint.
        builder.build_unchecked()
    }

    /// Process-wide registry configured from the environment.
    pub fn global() -> Arc<ExecutorRegistry> {
        GLOBAL.clone()
    }

    pub fn languages(&self) -> impl Iterator<Item = &LanguageSpec> {
        self.entries.iter().map(|e| &e.spec)
    }

    pub fn supports(&self, identifier: &str) -> bool {
        self.index.contains_key(&normalize(identifier))
    }

    /// Canonical language id for `identifier`.
    pub fn language_id(&self, identifier: &str) -> Result<&str> {
        self.entry(identifier).map(|e| e.spec.id.as_str())
    }

    /// The executor for `identifier`, constructing it on first use.
    ///
    /// A failed construction leaves the slot empty so a later call retries.
    pub async fn resolve(&self, identifier: &str) -> Result<ExecutorHandle> {
        let entry = self.entry(identifier)?;
        entry
            .slot
            .get_or_try_init(|| {
                tracing::debug!(language = %entry.spec.id, "constructing executor");
                (entry.factory)()
            })
            .await
            .cloned()
    }

    /// The executor for `identifier` if it has already been constructed.
    pub fn loaded(&self, identifier: &str) -> Result<Option<ExecutorHandle>> {
        Ok(self.entry(identifier)?.slot.get().cloned())
    }

    /// Terminate every constructed executor.
    pub fn terminate_all(&self) {
        for executor in self.entries.iter().filter_map(|e| e.slot.get()) {
            executor.terminate();
        }
    }

    fn entry(&self, identifier: &str) -> Result<&Entry> {
        self.index
            .get(&normalize(identifier))
            .map(|&i| &self.entries[i])
            .ok_or_else(|| Error::UnsupportedLanguage(identifier.to_string()))
    }
}

#[derive(Default)]
pub struct RegistryBuilder {
    entries: Vec<Entry>,
}

impl RegistryBuilder {
    pub fn register<F, Fut>(mut self, spec: LanguageSpec, factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ExecutorHandle>> + Send + 'static,
    {
        self.entries.push(Entry {
            spec,
            factory: Arc::new(move || Box::pin(factory()) as FactoryFuture),
            slot: OnceCell::new(),
        });
        self
    }

    /// Build the registry, rejecting names claimed by two languages.
    pub fn build(self) -> Result<ExecutorRegistry> {
        let mut index: HashMap<String, usize> = HashMap::new();
        for (i, entry) in self.entries.iter().enumerate() {
            for key in entry.spec.keys() {
                if key.is_empty() {
                    return Err(Error::InvalidConfig(format!(
                        "empty identifier for language {}",
                        entry.spec.id
                    )));
                }
                if let Some(&other) = index.get(&key)
                    && other != i
                {
                    return Err(Error::InvalidConfig(format!(
                        "identifier {key:?} claimed by both {} and {}",
                        self.entries[other].spec.id, entry.spec.id
                    )));
                }
                index.insert(key, i);
            }
        }
        Ok(ExecutorRegistry {
            entries: self.entries,
            index,
        })
    }

    fn build_unchecked(self) -> ExecutorRegistry {
        let index = self
            .entries
            .iter()
            .enumerate()
            .flat_map(|(i, entry)| entry.spec.keys().map(move |key| (key, i)))
            .collect();
        ExecutorRegistry {
            entries: self.entries,
            index,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::executor::AdapterState;
    use crate::options::ExecutionOptions;
    use crate::result::ExecutionResult;

    struct Fake(&'static str);

    #[async_trait]
    impl CodeExecutor for Fake {
        fn language(&self) -> &str {
            self.0
        }
        fn file_extensions(&self) -> &[&str] {
            &[]
        }
        fn state(&self) -> AdapterState {
            AdapterState::Uninitialized
        }
        async fn initialize(&self) -> Result<()> {
            Ok(())
        }
        async fn execute(&self, _: &str, _: Option<ExecutionOptions>) -> Result<ExecutionResult> {
            Ok(ExecutionResult::empty())
        }
        fn terminate(&self) {}
    }

    fn counting_registry(count: Arc<AtomicUsize>) -> ExecutorRegistry {
        ExecutorRegistry::builder()
            .register(
                LanguageSpec::new("fake").aliases(["fk"]).extensions(["fk1"]),
                move || {
                    let count = count.clone();
                    async move {
                        count.fetch_add(1, Ordering::SeqCst);
                        tokio::task::yield_now().await;
                        Ok(Arc::new(Fake("fake")) as ExecutorHandle)
                    }
                },
            )
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn resolves_by_id_alias_and_extension() {
        let registry = counting_registry(Arc::new(AtomicUsize::new(0)));
        for name in ["fake", "FAKE", " fk ", ".fk1", "FK1"] {
            let exec = registry.resolve(name).await.unwrap();
            assert_eq!(exec.language(), "fake", "{name}");
        }
    }

    #[tokio::test]
    async fn unknown_language() {
        let registry = counting_registry(Arc::new(AtomicUsize::new(0)));
        let err = registry.resolve("cobol").await.err().unwrap();
        assert!(matches!(err, Error::UnsupportedLanguage(ref l) if l == "cobol"));
        assert!(!registry.supports("cobol"));
    }

    #[tokio::test]
    async fn constructs_once_under_concurrency() {
        let count = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(count.clone());

        let (a, b, c) = tokio::join!(
            registry.resolve("fake"),
            registry.resolve("fk"),
            registry.resolve(".fk1"),
        );
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&b, &c));
    }

    #[tokio::test]
    async fn failed_construction_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let registry = ExecutorRegistry::builder()
            .register(LanguageSpec::new("flaky"), move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(Error::init("flaky", "first attempt fails"))
                    } else {
                        Ok(Arc::new(Fake("flaky")) as ExecutorHandle)
                    }
                }
            })
            .build()
            .unwrap();

        assert!(registry.resolve("flaky").await.is_err());
        assert!(registry.loaded("flaky").unwrap().is_none());
        assert!(registry.resolve("flaky").await.is_ok());
        assert!(registry.loaded("flaky").unwrap().is_some());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn duplicate_identifiers_rejected() {
        let factory = || async { Ok(Arc::new(Fake("x")) as ExecutorHandle) };
        let err = ExecutorRegistry::builder()
            .register(LanguageSpec::new("a").extensions(["x"]), factory)
            .register(LanguageSpec::new("b").aliases([".X"]), factory)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn defaults_cover_builtin_names() {
        let registry = ExecutorRegistry::with_defaults(SandboxConfig::default());
        for (name, id) in [
            ("python", "python"),
            ("PY", "python"),
            ("python3", "python"),
            (".py", "python"),
            ("javascript", "javascript"),
            ("js", "javascript"),
            ("node", "javascript"),
            (".mjs", "javascript"),
        ] {
            assert_eq!(registry.language_id(name).unwrap(), id, "{name}");
        }
        assert_eq!(registry.languages().count(), 2);
    }

    #[tokio::test]
    async fn loaded_does_not_construct() {
        let count = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(count.clone());
        assert!(registry.loaded("fake").unwrap().is_none());
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(registry.loaded("nope").is_err());
    }
}
