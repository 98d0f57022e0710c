use crate::commit::{CommitState, DebouncePolicy, Debouncer};
use crate::document::{Commit, CommitEvent, PlaygroundDocument, TabKind};
use crate::fence::{detect_fence, ExtractedBlock};
use crate::logging;
use crate::sink::CommitSink;
use crate::types::{Message, Role};
use anyhow::{bail, Context, Result};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Streaming,
}

/// Identity of one started session. Timer ticks carry the generation they were
/// scheduled for; a tick from any other generation is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Owns one chat session: the transcript, the candidate block and what has
/// already been handed to the sink.
pub struct SessionController<S> {
    sink: S,
    language: TabKind,
    debouncer: Debouncer,
    state: SessionState,
    generation: u64,
    commit_state: CommitState,
    previewed: Option<ExtractedBlock>,
    transcript: Vec<Message>,
    commits: u64,
    last_error: Option<String>,
}

impl<S: CommitSink> SessionController<S> {
    pub fn new(sink: S, language: TabKind, policy: DebouncePolicy) -> Self {
        Self {
            sink,
            language,
            debouncer: Debouncer::new(policy),
            state: SessionState::Idle,
            generation: 0,
            commit_state: CommitState::new(),
            previewed: None,
            transcript: Vec::new(),
            commits: 0,
            last_error: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn policy(&self) -> DebouncePolicy {
        self.debouncer.policy()
    }

    pub fn commit_state(&self) -> &CommitState {
        &self.commit_state
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn commit_count(&self) -> u64 {
        self.commits
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Content of the assistant message currently being extracted from.
    pub fn buffer(&self) -> &str {
        self.transcript
            .iter()
            .rev()
            .find(|message| message.role() == Role::Assistant)
            .map_or("", |message| message.content())
    }

    /// Begins a fresh session, stopping the running one first.
    pub fn start(&mut self) -> Generation {
        if self.state == SessionState::Streaming {
            self.stop();
        }
        self.generation += 1;
        self.commit_state = CommitState::new();
        self.previewed = None;
        self.transcript.clear();
        self.debouncer.reset();
        self.commits = 0;
        self.last_error = None;
        self.state = SessionState::Streaming;
        logging::emit_session_event("start", self.generation);
        Generation(self.generation)
    }

    /// After this returns no tick of the stopped generation can commit.
    pub fn stop(&mut self) {
        if self.state == SessionState::Idle {
            return;
        }
        logging::emit_session_event("stop", self.generation);
        self.generation += 1;
        self.state = SessionState::Idle;
    }

    /// Appends a streamed delta and refreshes the candidate block.
    ///
    /// A changed, valid candidate is previewed right away. Returns a commit only
    /// when the leading edge is enabled and open. Sink failures on either path
    /// are logged and left for the next change or tick.
    pub fn on_delta(&mut self, role: Role, text: &str, now: Instant) -> Result<Option<Commit>> {
        if self.state != SessionState::Streaming {
            bail!("session is not streaming; start() it before sending deltas");
        }

        let message = self.message_for(role);
        message.push_delta(text)?;
        if role != Role::Assistant {
            return Ok(None);
        }
        // A fence-less reply keeps the previous candidate.
        if let Some(block) = detect_fence(message.content()) {
            self.commit_state.set_current(block);
            self.preview_current();
        }

        if !self.debouncer.fires_on_change(now) {
            return Ok(None);
        }
        match self.commit_pending(now) {
            Ok(commit) => Ok(commit),
            Err(error) => {
                logging::emit_warning("leading-edge commit failed", &error);
                Ok(None)
            }
        }
    }

    /// Timer callback for `generation`.
    pub fn tick(&mut self, generation: Generation, now: Instant) -> Result<Option<Commit>> {
        if self.state != SessionState::Streaming || generation.0 != self.generation {
            return Ok(None);
        }
        if !self.debouncer.fires_on_tick() {
            return Ok(None);
        }
        self.commit_pending(now)
    }

    /// Transport finished the current message: freeze it and flush.
    pub fn on_complete(&mut self, now: Instant) -> Result<Option<Commit>> {
        if self.state != SessionState::Streaming {
            return Ok(None);
        }
        if let Some(message) = self.transcript.last_mut() {
            message.complete();
        }
        self.commit_pending(now)
    }

    /// Transport failed mid-stream. The last good commit stays in place.
    pub fn on_error(&mut self, error: &str) {
        if self.state != SessionState::Streaming {
            return;
        }
        if let Some(message) = self.transcript.last_mut() {
            message.complete();
        }
        logging::emit_transport_error(self.generation, error);
        self.last_error = Some(error.to_string());
    }

    /// Builds the editor document for `block` and hands it to the sink.
    pub fn on_commit(&mut self, block: &ExtractedBlock) -> Result<Commit> {
        if self.state != SessionState::Streaming {
            bail!("session is not streaming; commit refused");
        }
        let event = CommitEvent::for_tab(self.language, block.content());
        let commit = Commit {
            sequence: self.commits + 1,
            generation: self.generation,
            document: PlaygroundDocument::populated(self.language, &event),
            event,
        };
        self.sink
            .deliver(&commit)
            .with_context(|| format!("failed to deliver commit {}", commit.sequence))?;
        Ok(commit)
    }

    fn preview_current(&mut self) {
        let current = self.commit_state.current();
        if !current.is_valid() || self.previewed.as_ref() == Some(current) {
            return;
        }
        let block = current.clone();
        let event = CommitEvent::for_tab(self.language, block.content());
        let document = PlaygroundDocument::populated(self.language, &event);
        match self.sink.preview(&document) {
            Ok(()) => self.previewed = Some(block),
            Err(error) => logging::emit_warning("preview failed", &error),
        }
    }

    fn commit_pending(&mut self, now: Instant) -> Result<Option<Commit>> {
        let Some(block) = self.commit_state.pending().cloned() else {
            return Ok(None);
        };
        let commit = self.on_commit(&block)?;
        self.commit_state.mark_committed(block);
        self.commits = commit.sequence;
        self.debouncer.record_fire(now);
        logging::emit_commit(&commit);
        Ok(Some(commit))
    }

    fn message_for(&mut self, role: Role) -> &mut Message {
        let reuse = self
            .transcript
            .last()
            .is_some_and(|message| message.role() == role && !message.is_complete());
        if !reuse {
            if let Some(previous) = self.transcript.last_mut() {
                previous.complete();
            }
            self.transcript.push(Message::new(role));
        }
        let last = self.transcript.len() - 1;
        &mut self.transcript[last]
    }
}
