//! Async host for a [`SessionController`].
//!
//! Deltas, completion, errors and lifecycle requests are queued on an unbounded
//! channel and consumed by one task, interleaved with the commit timer inside a
//! single `select!`. The controller is therefore only ever touched from that
//! task and needs no lock.

use crate::logging;
use crate::session::{Generation, SessionController};
use crate::sink::CommitSink;
use crate::types::{Role, TransportEvent};
use anyhow::{anyhow, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

enum SessionCommand {
    Delta { role: Role, text: String },
    Complete,
    Error(String),
    Restart { ack: oneshot::Sender<Generation> },
    Stop { ack: oneshot::Sender<()> },
}

#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    pub fn send(&self, event: TransportEvent) -> Result<()> {
        match event {
            TransportEvent::Delta { role, text } => self.delta(role, text),
            TransportEvent::Complete => self.complete(),
            TransportEvent::Error(message) => self.fail(message),
        }
    }

    pub fn delta(&self, role: Role, text: impl Into<String>) -> Result<()> {
        self.push(SessionCommand::Delta {
            role,
            text: text.into(),
        })
    }

    pub fn complete(&self) -> Result<()> {
        self.push(SessionCommand::Complete)
    }

    pub fn fail(&self, error: impl Into<String>) -> Result<()> {
        self.push(SessionCommand::Error(error.into()))
    }

    /// Stops the running session and starts a new one. Ticks already scheduled
    /// for the old session can no longer commit once this resolves.
    pub async fn restart(&self) -> Result<Generation> {
        let (ack, done) = oneshot::channel();
        self.push(SessionCommand::Restart { ack })?;
        done.await.map_err(|_| anyhow!("session task exited before restarting"))
    }

    /// No commit is delivered after this resolves. Stopping an already
    /// finished session is a no-op.
    pub async fn stop(&self) -> Result<()> {
        let (ack, done) = oneshot::channel();
        if self.tx.send(SessionCommand::Stop { ack }).is_err() {
            return Ok(());
        }
        let _ = done.await;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn push(&self, command: SessionCommand) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|_| anyhow!("session is no longer running"))
    }
}

/// Starts `controller` on a new task. The task ends on `stop()`, when every
/// handle is dropped, or when `cancel` fires, and hands the controller back.
pub fn spawn<S>(
    controller: SessionController<S>,
    cancel: CancellationToken,
) -> Result<(SessionHandle, JoinHandle<SessionController<S>>)>
where
    S: CommitSink + 'static,
{
    controller.policy().validate()?;
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run(controller, rx, cancel));
    Ok((SessionHandle { tx }, task))
}

async fn run<S: CommitSink>(
    mut controller: SessionController<S>,
    mut rx: mpsc::UnboundedReceiver<SessionCommand>,
    cancel: CancellationToken,
) -> SessionController<S> {
    let mut generation = controller.start();
    let period = controller.policy().interval;
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            command = rx.recv() => {
                let Some(command) = command else {
                    break;
                };
                match command {
                    SessionCommand::Delta { role, text } => {
                        if let Err(error) = controller.on_delta(role, &text, now()) {
                            logging::emit_warning("delta rejected", &error);
                        }
                    }
                    SessionCommand::Complete => {
                        if let Err(error) = controller.on_complete(now()) {
                            logging::emit_warning("completion flush failed", &error);
                        }
                    }
                    SessionCommand::Error(message) => controller.on_error(&message),
                    SessionCommand::Restart { ack } => {
                        generation = controller.start();
                        ticker.reset();
                        let _ = ack.send(generation);
                    }
                    SessionCommand::Stop { ack } => {
                        controller.stop();
                        let _ = ack.send(());
                        break;
                    }
                }
            }
            _ = ticker.tick() => {
                if let Err(error) = controller.tick(generation, now()) {
                    logging::emit_warning("commit tick failed", &error);
                }
            }
        }
    }

    controller.stop();
    controller
}

fn now() -> std::time::Instant {
    Instant::now().into_std()
}
