use anyhow::{bail, Context, Result};
use bytes::Bytes;
use fencepost::api::{pump_stream, ApiClient, ByteStream};
use fencepost::config::Config;
use fencepost::driver;
use fencepost::session::SessionController;
use fencepost::sink::{CommitSink, JsonFileSink, PreviewFileSink, WriterSink};
use fencepost::types::{ApiMessage, Role};
use std::path::Path;
use tokio_util::sync::CancellationToken;

const USAGE: &str = "usage: fencepost chat <prompt...>\n       fencepost replay <sse-capture-file>";
const REPLAY_CHUNK_BYTES: usize = 64;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    let mut args = std::env::args().skip(1);
    let command = args.next().unwrap_or_default();
    let rest: Vec<String> = args.collect();

    let (stream, prompt) = match command.as_str() {
        "chat" => {
            config.validate()?;
            let prompt = rest.join(" ");
            if prompt.trim().is_empty() {
                bail!("missing prompt\n{USAGE}");
            }
            let client = ApiClient::new(&config)?;
            let stream = client
                .create_stream(&[ApiMessage::user(prompt.clone())])
                .await?;
            (stream, Some(prompt))
        }
        "replay" => {
            config.debounce.validate()?;
            let path = rest.first().with_context(|| format!("missing capture file\n{USAGE}"))?;
            (replay_stream(Path::new(path))?, None)
        }
        _ => bail!("{USAGE}"),
    };

    let mut sink: Box<dyn CommitSink> = match &config.output {
        Some(path) => Box::new(JsonFileSink::new(path)),
        None => Box::new(WriterSink::new(std::io::stdout())),
    };
    if let Some(path) = &config.preview_output {
        sink = Box::new(PreviewFileSink::new(sink, path));
    }
    let controller = SessionController::new(sink, config.language, config.debounce);

    let cancel = CancellationToken::new();
    let (session, task) = driver::spawn(controller, cancel.clone())?;
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    if let Some(prompt) = prompt {
        session.delta(Role::User, prompt)?;
    }
    let pumped = pump_stream(stream, &session, &cancel).await;
    session.stop().await?;
    let controller = task.await.context("session task panicked")?;

    eprintln!(
        "fencepost: {} commit(s), {} message(s)",
        controller.commit_count(),
        controller.transcript().len()
    );
    if cancel.is_cancelled() {
        eprintln!("fencepost: interrupted");
        return Ok(());
    }
    pumped
}

/// Replays a captured SSE body in small chunks so frames split mid-line.
fn replay_stream(path: &Path) -> Result<ByteStream> {
    let body = std::fs::read(path)
        .with_context(|| format!("failed to read capture {}", path.display()))?;
    let chunks: Vec<Result<Bytes>> = body
        .chunks(REPLAY_CHUNK_BYTES)
        .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
        .collect();
    Ok(Box::pin(futures::stream::iter(chunks)))
}
