use crate::document::{Commit, PlaygroundDocument};
use anyhow::{anyhow, bail, Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Downstream consumer of committed blocks (editor, compiler, file, ...).
///
/// A failed `deliver` leaves the session's commit state untouched, so the same
/// commit is offered again on the next tick.
pub trait CommitSink: Send {
    fn deliver(&mut self, commit: &Commit) -> Result<()>;

    /// Live view of the candidate block, offered on every valid change without
    /// debouncing. Sinks without a live view ignore it.
    fn preview(&mut self, _document: &PlaygroundDocument) -> Result<()> {
        Ok(())
    }
}

impl<T: CommitSink + ?Sized> CommitSink for Box<T> {
    fn deliver(&mut self, commit: &Commit) -> Result<()> {
        (**self).deliver(commit)
    }

    fn preview(&mut self, document: &PlaygroundDocument) -> Result<()> {
        (**self).preview(document)
    }
}

/// Rewrites a JSON file with the latest editor document on every commit.
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CommitSink for JsonFileSink {
    fn deliver(&mut self, commit: &Commit) -> Result<()> {
        replace_json(&self.path, &commit.document)
    }
}

/// Wraps another sink and mirrors every preview into a JSON file, the live
/// editor view between commits.
pub struct PreviewFileSink<S> {
    inner: S,
    path: PathBuf,
}

impl<S: CommitSink> PreviewFileSink<S> {
    pub fn new(inner: S, path: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            path: path.into(),
        }
    }
}

impl<S: CommitSink> CommitSink for PreviewFileSink<S> {
    fn deliver(&mut self, commit: &Commit) -> Result<()> {
        self.inner.deliver(commit)
    }

    fn preview(&mut self, document: &PlaygroundDocument) -> Result<()> {
        replace_json(&self.path, document)?;
        self.inner.preview(document)
    }
}

// Readers never observe a half-written file.
fn replace_json(path: &Path, document: &PlaygroundDocument) -> Result<()> {
    let body = serde_json::to_vec_pretty(document)?;
    let staging = path.with_extension("json.tmp");
    std::fs::write(&staging, body)
        .with_context(|| format!("failed to write {}", staging.display()))?;
    std::fs::rename(&staging, path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

/// Writes one JSON document per line.
pub struct WriterSink<W> {
    writer: W,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> CommitSink for WriterSink<W> {
    fn deliver(&mut self, commit: &Commit) -> Result<()> {
        serde_json::to_writer(&mut self.writer, &commit.document)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Keeps every delivered commit in memory. Clones share the same record.
#[derive(Clone, Default)]
pub struct RecordingSink {
    commits: Arc<Mutex<Vec<Commit>>>,
    previews: Arc<Mutex<Vec<PlaygroundDocument>>>,
    reject_next: Arc<AtomicUsize>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commits(&self) -> Vec<Commit> {
        match self.commits.lock() {
            Ok(commits) => commits.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn previews(&self) -> Vec<PlaygroundDocument> {
        match self.previews.lock() {
            Ok(previews) => previews.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn contents(&self) -> Vec<String> {
        self.commits()
            .into_iter()
            .map(|commit| commit.event.content)
            .collect()
    }

    /// Makes the next `count` deliveries fail.
    pub fn reject_next(&self, count: usize) {
        self.reject_next.store(count, Ordering::SeqCst);
    }
}

impl CommitSink for RecordingSink {
    fn deliver(&mut self, commit: &Commit) -> Result<()> {
        let rejected = self
            .reject_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if rejected {
            bail!("recording sink rejected commit {}", commit.sequence);
        }
        self.commits
            .lock()
            .map_err(|_| anyhow!("recording sink lock poisoned"))?
            .push(commit.clone());
        Ok(())
    }

    fn preview(&mut self, document: &PlaygroundDocument) -> Result<()> {
        self.previews
            .lock()
            .map_err(|_| anyhow!("recording sink lock poisoned"))?
            .push(document.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{CommitEvent, TabKind};
    use tempfile::TempDir;

    fn commit(sequence: u64, content: &str) -> Commit {
        let event = CommitEvent::for_tab(TabKind::Javascript, content);
        Commit {
            sequence,
            generation: 1,
            document: PlaygroundDocument::populated(TabKind::Javascript, &event),
            event,
        }
    }

    #[test]
    fn test_json_file_sink_replaces_document() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("editor.json");
        let mut sink = JsonFileSink::new(&path);

        sink.deliver(&commit(1, "one();\n")).expect("first write");
        sink.deliver(&commit(2, "two();\n")).expect("second write");

        let written: PlaygroundDocument =
            serde_json::from_slice(&std::fs::read(&path).expect("read back")).expect("valid json");
        assert_eq!(written.tabs.javascript.data, "two();\n");
        assert!(
            !path.with_extension("json.tmp").exists(),
            "staging file must be renamed away"
        );
    }

    #[test]
    fn test_json_file_sink_reports_missing_directory() {
        let dir = TempDir::new().expect("tempdir");
        let mut sink = JsonFileSink::new(dir.path().join("missing").join("editor.json"));
        let err = sink
            .deliver(&commit(1, "one();\n"))
            .expect_err("missing parent directory must fail");
        assert!(err.to_string().contains("failed to write"));
    }

    #[test]
    fn test_writer_sink_emits_one_line_per_commit() {
        let mut sink = WriterSink::new(Vec::new());
        sink.deliver(&commit(1, "a();\n")).expect("first");
        sink.deliver(&commit(2, "b();\n")).expect("second");

        let output = String::from_utf8(sink.into_inner()).expect("utf8");
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains(r#""data":"b();\n""#));
    }

    #[test]
    fn test_recording_sink_rejects_then_accepts() {
        let sink = RecordingSink::new();
        let mut delivering = sink.clone();
        sink.reject_next(1);

        assert!(delivering.deliver(&commit(1, "a();\n")).is_err());
        delivering.deliver(&commit(1, "a();\n")).expect("second attempt");
        assert_eq!(sink.contents(), vec!["a();\n".to_string()]);
    }

    #[test]
    fn test_preview_file_sink_mirrors_previews_and_forwards_commits() {
        let dir = TempDir::new().expect("tempdir");
        let live = dir.path().join("live.json");
        let recording = RecordingSink::new();
        let mut sink = PreviewFileSink::new(recording.clone(), &live);

        let preview = commit(1, "draft();\n").document;
        sink.preview(&preview).expect("preview written");
        let written: PlaygroundDocument =
            serde_json::from_slice(&std::fs::read(&live).expect("read back")).expect("valid json");
        assert_eq!(written.tabs.javascript.data, "draft();\n");
        assert_eq!(recording.previews().len(), 1);
        assert!(recording.commits().is_empty(), "a preview is not a commit");

        sink.deliver(&commit(1, "final();\n")).expect("commit forwarded");
        assert_eq!(recording.contents(), vec!["final();\n".to_string()]);
    }

    #[test]
    fn test_default_preview_is_ignored() {
        let mut sink = WriterSink::new(Vec::new());
        sink.preview(&commit(1, "draft();\n").document)
            .expect("no-op preview");
        assert!(sink.into_inner().is_empty());
    }
}
