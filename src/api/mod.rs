pub mod client;
pub mod stream;

pub use client::{ApiClient, ByteStream};
pub use stream::StreamParser;

use crate::driver::SessionHandle;
use crate::types::TransportEvent;
use anyhow::{anyhow, Result};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

/// Feeds a streaming response into a running session.
///
/// Transport failures are forwarded to the session and then returned to the
/// caller unchanged; nothing is retried. A stream that ends without a terminal
/// event is still completed. Once `cancel` fires the stream is dropped and the
/// message is left as it is.
pub async fn pump_stream(
    mut stream: ByteStream,
    session: &SessionHandle,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut parser = StreamParser::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            next = stream.next() => next,
        };
        let Some(chunk) = next else {
            break;
        };
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(error) => {
                session.fail(format!("{error:#}"))?;
                return Err(error);
            }
        };
        forward(parser.process(&chunk), session)?;
    }
    forward(parser.finish(), session)?;

    if !parser.is_completed() {
        session.complete()?;
    }
    Ok(())
}

fn forward(events: Vec<TransportEvent>, session: &SessionHandle) -> Result<()> {
    for event in events {
        if let TransportEvent::Error(message) = &event {
            let message = message.clone();
            session.send(event)?;
            return Err(anyhow!(message));
        }
        session.send(event)?;
    }
    Ok(())
}
