//! Shared fixtures for unit tests.

use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::command::{CommandOutput, MockCommandRunner};
use crate::error::AnalyzerError;

/// Recorded `program arg arg ...` lines, in call order.
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// A mock runner answering by command-line prefix.
///
/// The first `(prefix, output)` pair whose prefix starts the rendered
/// command line wins; unmatched commands succeed with empty output.
pub fn scripted_runner(responses: Vec<(&'static str, CommandOutput)>) -> (MockCommandRunner, CallLog) {
    scripted_runner_with(responses, |_, _| {})
}

/// Like [`scripted_runner`], with a hook that runs before answering (used to
/// simulate side effects such as a tool writing files).
pub fn scripted_runner_with<F>(
    responses: Vec<(&'static str, CommandOutput)>,
    hook: F,
) -> (MockCommandRunner, CallLog)
where
    F: Fn(&Path, &str) + Send + 'static,
{
    build(responses, None, hook)
}

/// Like [`scripted_runner`], but commands starting with `timeout_prefix`
/// fail with [`AnalyzerError::CommandTimeout`].
pub fn scripted_runner_timing_out(
    responses: Vec<(&'static str, CommandOutput)>,
    timeout_prefix: &'static str,
) -> (MockCommandRunner, CallLog) {
    build(responses, Some(timeout_prefix), |_, _| {})
}

fn build<F>(
    responses: Vec<(&'static str, CommandOutput)>,
    timeout_prefix: Option<&'static str>,
    hook: F,
) -> (MockCommandRunner, CallLog)
where
    F: Fn(&Path, &str) + Send + 'static,
{
    let calls: CallLog = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&calls);
    let mut mock = MockCommandRunner::new();
    mock.expect_execute().returning(move |dir, program, args| {
        let line = std::iter::once(program.to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        recorded.lock().unwrap().push(line.clone());
        hook(dir, &line);
        if timeout_prefix.is_some_and(|prefix| line.starts_with(prefix)) {
            return Err(AnalyzerError::CommandTimeout { command: line, secs: 1 });
        }
        let output = responses
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix))
            .map(|(_, out)| out.clone())
            .unwrap_or_else(|| CommandOutput::ok(""));
        Ok(output)
    });
    (mock, calls)
}

pub fn calls(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

pub fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}
