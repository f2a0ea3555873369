//! Line-framed connection over byte streams
//!
//! Each line of input is one serialized [`AppMessage`](crate::io::AppMessage);
//! every message the service sends is written as one line of output. Used by
//! the binary to talk over stdin (or a file) and stdout.
//!
//! # Design
//!
//! Two tokio tasks bridge the byte streams to a [`Connection`]:
//! - the reader frames input with `LinesCodec` and forwards non-blank lines,
//!   then signals `EndOfStream` at EOF
//! - the writer drains the outgoing queue and exits once every sender is gone

use crate::io::channel::{ChannelEvent, ChannelSender, Connection};
use crate::types::AppFlowError;
use futures::{SinkExt, StreamExt};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};

/// Background tasks pumping a framed connection
pub struct FramedTasks {
    pub reader: JoinHandle<()>,
    pub writer: JoinHandle<()>,
}

impl FramedTasks {
    /// Wait until all output has been written
    ///
    /// The reader is aborted; it may still be blocked on input nobody needs.
    pub async fn finish(self) {
        self.reader.abort();
        if let Err(e) = self.writer.await {
            tracing::error!(error = %e, "output task failed");
        }
    }
}

/// Bridge an async reader and writer to a [`Connection`]
///
/// # Arguments
///
/// * `reader` - Source of newline-delimited messages
/// * `writer` - Sink for outgoing messages, one per line
///
/// # Returns
///
/// The service-side connection and the tasks driving it.
pub fn framed_connection<R, W>(reader: R, writer: W) -> (Connection, FramedTasks)
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
    let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel();

    let reader = tokio::spawn(async move {
        let mut lines = FramedRead::new(reader, LinesCodec::new());
        while let Some(line) = lines.next().await {
            match line {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => {
                    if incoming_tx.send(ChannelEvent::Message(line)).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to read input line");
                    break;
                }
            }
        }
        let _ = incoming_tx.send(ChannelEvent::EndOfStream);
    });

    let writer = tokio::spawn(async move {
        let mut sink = FramedWrite::new(writer, LinesCodec::new());
        while let Some(event) = outgoing_rx.recv().await {
            match event {
                ChannelEvent::Message(message) => {
                    if let Err(e) = sink.send(message).await {
                        tracing::error!(error = %e, "failed to write output line");
                        return;
                    }
                }
                ChannelEvent::EndOfStream => {
                    tracing::debug!("service ended its stream");
                    if let Err(e) = SinkExt::<String>::flush(&mut sink).await {
                        tracing::error!(error = %e, "failed to flush output");
                        return;
                    }
                }
            }
        }
        let _ = SinkExt::<String>::flush(&mut sink).await;
    });

    let connection = Connection::new(Arc::new(ChannelSender::new(outgoing_tx)), incoming_rx);
    (connection, FramedTasks { reader, writer })
}

/// Connection over a message file (or stdin when `None`) and stdout
///
/// # Errors
///
/// Returns `Io` if the input file can not be opened.
pub async fn stdio_connection(
    input: Option<&Path>,
) -> Result<(Connection, FramedTasks), AppFlowError> {
    let stdout = tokio::io::stdout();
    match input {
        Some(path) => {
            let file = tokio::fs::File::open(path).await?;
            Ok(framed_connection(file, stdout))
        }
        None => Ok(framed_connection(tokio::io::stdin(), stdout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::channel::MessageChannel;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_lines_become_messages_and_eof_ends_stream() {
        let input: &'static [u8] = b"{\"messageType\":\"request\"}\n\n{\"messageType\":\"forceFinish\"}\n";
        let (out_writer, _out_reader) = tokio::io::duplex(1024);
        let (mut connection, tasks) = framed_connection(input, out_writer);

        assert_eq!(
            connection.next_event().await,
            Some(ChannelEvent::Message("{\"messageType\":\"request\"}".to_string()))
        );
        assert_eq!(
            connection.next_event().await,
            Some(ChannelEvent::Message("{\"messageType\":\"forceFinish\"}".to_string()))
        );
        assert_eq!(connection.next_event().await, Some(ChannelEvent::EndOfStream));

        drop(connection);
        tasks.finish().await;
    }

    #[tokio::test]
    async fn test_outgoing_messages_are_written_as_lines() {
        let input: &'static [u8] = b"";
        let (out_writer, mut out_reader) = tokio::io::duplex(1024);
        let (connection, tasks) = framed_connection(input, out_writer);

        let outgoing = connection.outgoing();
        outgoing.send("first".to_string()).unwrap();
        outgoing.send_end_stream().unwrap();
        outgoing.send("second".to_string()).unwrap();
        drop(outgoing);
        drop(connection);
        tasks.finish().await;

        let mut written = String::new();
        out_reader.read_to_string(&mut written).await.unwrap();
        assert_eq!(written, "first\nsecond\n");
    }

    #[tokio::test]
    async fn test_missing_input_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.jsonl");

        let result = stdio_connection(Some(missing.as_path())).await;

        assert!(matches!(result, Err(AppFlowError::Io { .. })));
    }
}
