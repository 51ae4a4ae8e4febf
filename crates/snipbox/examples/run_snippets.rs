//! Run a few snippets through the global sandbox.
//!
//! ```text
//! cargo run -p snipbox --example run_snippets
//! RUST_LOG=snipbox=trace cargo run -p snipbox --example run_snippets
//! ```

use std::time::Duration;

use snipbox::{ExecutionOptions, ExecutionResult, Sandbox};
use tracing_subscriber::EnvFilter;

const SNIPPETS: &[(&str, &str)] = &[
    ("python", "print('Hello')"),
    ("python", "import sys\nprint(sys.version_info[:2])"),
    ("python", "1/0"),
    ("python", "def f(:\n    pass"),
    ("py", "for i in range(3):\n    print('line', i)"),
    ("javascript", "console.log('Hello')"),
    ("js", "Promise.resolve(21).then((n) => console.log(n * 2))"),
    ("js", "undefinedVariable.call()"),
    ("node", "throw 'not an Error'"),
];

fn report(language: &str, code: &str, result: &ExecutionResult) {
    println!("--- {language}: {}", code.replace('\n', "\\n"));
    println!(
        "    success={} timed_out={} truncated={} time={}ms",
        result.success,
        result.timed_out,
        result.truncated,
        result.execution_time_ms()
    );
    if !result.stdout.is_empty() {
        print!("    stdout: {}", result.stdout);
    }
    if let Some(error) = &result.error {
        println!(
            "    error: {} ({}) at {:?}:{:?}",
            error.message,
            error.kind.as_deref().unwrap_or("-"),
            error.line,
            error.column
        );
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,snipbox=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let sandbox = Sandbox::global();

    for &(language, code) in SNIPPETS {
        match sandbox.execute(language, code, None).await {
            Ok(result) => report(language, code, &result),
            Err(e) => println!("--- {language}: {e}"),
        }
    }

    let options = ExecutionOptions::default().with_timeout(Duration::from_millis(200));
    for (language, code) in [("python", "while True:\n    pass"), ("javascript", "while (true) {}")] {
        match sandbox.execute(language, code, Some(options)).await {
            Ok(result) => report(language, code, &result),
            Err(e) => println!("--- {language}: {e}"),
        }
    }

    sandbox.registry().terminate_all();
}
