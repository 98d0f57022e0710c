use crate::document::Commit;
use crate::config::parse_bool;
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::{IsTerminal, Write};

const DEFAULT_LOG_PATH: &str = "/tmp/fencepost-debug.log";
const DEBUG_ENV: &str = "FENCEPOST_DEBUG";
const LOG_PATH_ENV: &str = "FENCEPOST_LOG_PATH";

pub fn debug_enabled() -> bool {
    std::env::var(DEBUG_ENV)
        .ok()
        .as_deref()
        .and_then(parse_bool)
        .unwrap_or(false)
}

pub fn emit_debug_payload(request_url: &str, payload: &Value) {
    if !debug_enabled() {
        return;
    }
    let formatted_payload = serde_json::to_string_pretty(payload)
        .unwrap_or_else(|_| "<payload serialization error>".to_string());
    emit_log_message(&format!(
        "FENCEPOST DEBUG payload_request url={request_url}\npayload:\n{formatted_payload}\n"
    ));
}

pub fn emit_sse_parse_error(
    event_type: Option<&str>,
    json_data: &str,
    parse_error: &serde_json::Error,
) {
    emit_log_message(&format!(
        "FENCEPOST ERROR sse_parse_failed error={parse_error}\nevent_type={}\ndata:\n{json_data}\n",
        event_type.unwrap_or("<none>")
    ));
}

pub fn emit_session_event(event: &str, generation: u64) {
    if debug_enabled() {
        emit_log_message(&format!(
            "FENCEPOST DEBUG session_{event} generation={generation}"
        ));
    }
}

pub fn emit_commit(commit: &Commit) {
    if debug_enabled() {
        emit_log_message(&commit_line(commit));
    }
}

pub fn emit_transport_error(generation: u64, error: &str) {
    emit_log_message(&format!(
        "FENCEPOST ERROR transport_failed generation={generation} error={error}"
    ));
}

pub fn emit_warning(context: &str, error: &anyhow::Error) {
    emit_log_message(&format!("FENCEPOST WARN {context} error={error:#}"));
}

fn commit_line(commit: &Commit) -> String {
    format!(
        "FENCEPOST DEBUG commit sequence={} generation={} entry_file={} chars={}",
        commit.sequence,
        commit.generation,
        commit.event.entry_file,
        commit.event.content.chars().count()
    )
}

fn emit_log_message(message: &str) {
    if let Some(path) = resolve_log_path() {
        if append_log_file(&path, message).is_ok() {
            return;
        }
    }

    eprintln!("{message}");
}

fn resolve_log_path() -> Option<String> {
    std::env::var(LOG_PATH_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            if std::io::stderr().is_terminal() {
                Some(DEFAULT_LOG_PATH.to_string())
            } else {
                None
            }
        })
}

fn append_log_file(path: &str, message: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(message.as_bytes())?;
    if !message.ends_with('\n') {
        file.write_all(b"\n")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{CommitEvent, PlaygroundDocument, TabKind};

    #[test]
    fn test_debug_enabled_accepts_true_variants() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        std::env::set_var(DEBUG_ENV, "1");
        assert!(debug_enabled());
        std::env::set_var(DEBUG_ENV, "TRUE");
        assert!(debug_enabled());
        std::env::set_var(DEBUG_ENV, "nope");
        assert!(!debug_enabled());
        std::env::remove_var(DEBUG_ENV);
        assert!(!debug_enabled());
    }

    #[test]
    fn test_resolve_log_path_uses_env_override() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        std::env::set_var(LOG_PATH_ENV, "/tmp/fencepost-test.log");
        assert_eq!(resolve_log_path().as_deref(), Some("/tmp/fencepost-test.log"));
        std::env::remove_var(LOG_PATH_ENV);
    }

    #[test]
    fn test_log_lines_are_appended_to_file() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("fencepost.log");
        let path = path.to_str().expect("utf8 path");

        append_log_file(path, "FENCEPOST WARN first").expect("first append");
        append_log_file(path, "FENCEPOST WARN second\n").expect("second append");

        let written = std::fs::read_to_string(path).expect("log file");
        assert_eq!(written, "FENCEPOST WARN first\nFENCEPOST WARN second\n");
    }

    #[test]
    fn test_commit_line_reports_size_not_content() {
        let event = CommitEvent::for_tab(TabKind::Javascript, "secret();\n");
        let commit = Commit {
            sequence: 2,
            generation: 5,
            document: PlaygroundDocument::populated(TabKind::Javascript, &event),
            event,
        };
        let line = commit_line(&commit);
        assert_eq!(
            line,
            "FENCEPOST DEBUG commit sequence=2 generation=5 entry_file=index.js chars=10"
        );
    }
}
