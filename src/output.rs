//! Output relay from child streams.
//!
//! Reads raw chunks from a child's stdout or stderr and forwards them, in
//! arrival order, as events tagged with the instance key. No line assembly
//! happens here: a chunk may split or merge lines.

use strip_ansi_escapes::strip;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;

use crate::events::Event;
use crate::process::InstanceKey;

const CHUNK_SIZE: usize = 8 * 1024;

/// Indicates the source stream of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// Forwards every chunk read from `reader` until EOF or a read error.
pub async fn relay_stream<R>(
    key: InstanceKey,
    incarnation: u64,
    stream: StreamKind,
    mut reader: R,
    tx: mpsc::Sender<Event>,
) where
    R: AsyncRead + Unpin,
{
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        match reader.read(&mut buffer).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let chunk = String::from_utf8_lossy(&buffer[..n]).into_owned();
                let event = Event::InstanceOutput {
                    key: key.clone(),
                    incarnation,
                    stream,
                    chunk,
                };
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Sanitizes text for display, optionally stripping ANSI escape codes.
pub fn sanitize_text(text: &str, strip_ansi: bool) -> String {
    if !strip_ansi {
        return text.to_string();
    }
    let stripped = strip(text.as_bytes());
    String::from_utf8_lossy(&stripped).to_string()
}
