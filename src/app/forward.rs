use super::service::Client;
use crate::domain::ClientError;
use serde_json::Value;
use std::future::Future;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

/// Why [`forward_lines`] stopped reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardOutcome {
    EndOfInput,
    Interrupted,
    ClientStopped,
}

/// Sends every non-blank line of `reader` through `client` until the input
/// ends, `shutdown` resolves or the client stops accepting observations.
///
/// Lines that parse as JSON are sent as that value, anything else as a
/// string. Backlogged sends are dropped; the client already warns about them.
pub async fn forward_lines<R, S>(
    reader: R,
    client: &Client,
    verbosity: u32,
    shutdown: S,
) -> io::Result<ForwardOutcome>
where
    R: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
{
    // Polled across iterations so a signal between reads is not lost
    tokio::pin!(shutdown);
    let mut lines = reader.lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    return Ok(ForwardOutcome::EndOfInput);
                };
                if line.trim().is_empty() {
                    continue;
                }
                let payload = serde_json::from_str::<Value>(&line).unwrap_or(Value::String(line));
                match client.send(verbosity, payload) {
                    Ok(()) | Err(ClientError::Backlogged) => {}
                    Err(e) => {
                        warn!(error = %e, "Client stopped accepting observations");
                        return Ok(ForwardOutcome::ClientStopped);
                    }
                }
            }
            () = &mut shutdown => {
                info!("Interrupted, flushing");
                return Ok(ForwardOutcome::Interrupted);
            }
        }
    }
}
