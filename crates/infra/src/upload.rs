//! Streaming upload: a caller feeds metadata then chunks through a channel,
//! and the receiving side reads the assembled bytes through an `AsyncRead`
//! without the whole file ever sitting in one buffer at once.

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;

/// One frame of an upload stream. The first frame received must be
/// `Metadata`; everything after it must be `Chunk`.
#[derive(Debug, Clone)]
pub enum UploadFrame {
    Metadata(UploadMetadata),
    Chunk(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct UploadMetadata {
    pub name: String,
    pub disk: String,
    pub path: String,
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload stream closed before a metadata frame arrived")]
    MissingMetadata,
    #[error("metadata frame arrived after chunks had already started")]
    UnexpectedMetadata,
    #[error("upload was cancelled before completion")]
    Cancelled,
    #[error("io error while piping the upload: {0}")]
    Io(#[from] std::io::Error),
}

/// Drains `frames` into `sink` until the channel closes, returning the
/// metadata frame it saw. Closing the sender mid-stream (e.g. on
/// cancellation) surfaces to the reader as an unexpected EOF, which the
/// caller maps to `UploadError::Cancelled`.
async fn pump(mut frames: mpsc::Receiver<UploadFrame>, mut sink: DuplexStream) -> Result<UploadMetadata, UploadError> {
    let metadata = match frames.recv().await {
        Some(UploadFrame::Metadata(m)) => m,
        Some(UploadFrame::Chunk(_)) => return Err(UploadError::MissingMetadata),
        None => return Err(UploadError::MissingMetadata),
    };

    while let Some(frame) = frames.recv().await {
        match frame {
            UploadFrame::Chunk(bytes) => {
                sink.write_all(&bytes).await?;
            }
            UploadFrame::Metadata(_) => return Err(UploadError::UnexpectedMetadata),
        }
    }

    sink.shutdown().await?;
    Ok(metadata)
}

/// Spawns the pump task and hands back a sender for frames plus a reader
/// that yields the assembled bytes as they arrive. `pipe_capacity` bounds
/// how far the writer can run ahead of the reader.
pub fn start_upload(pipe_capacity: usize, frame_buffer: usize) -> (mpsc::Sender<UploadFrame>, tokio::task::JoinHandle<Result<UploadMetadata, UploadError>>, impl tokio::io::AsyncRead + Unpin) {
    let (frame_tx, frame_rx) = mpsc::channel(frame_buffer);
    let (write_half, read_half) = tokio::io::duplex(pipe_capacity);

    let pump_handle = tokio::spawn(pump(frame_rx, write_half));

    (frame_tx, pump_handle, read_half)
}

/// Reads the full upload into memory. Intended for the aggregate's
/// add/replace command handlers, which need the complete byte count before
/// recording an event; true large-file streaming would hand `reader`
/// directly to the object store instead.
pub async fn read_to_end(mut reader: impl tokio::io::AsyncRead + Unpin) -> Result<Vec<u8>, UploadError> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn streams_metadata_then_chunks_end_to_end() {
        let (tx, pump_handle, reader) = start_upload(4096, 16);

        tx.send(UploadFrame::Metadata(UploadMetadata {
            name: "a.png".to_string(),
            disk: "images".to_string(),
            path: "a/original.png".to_string(),
        }))
        .await
        .unwrap();
        tx.send(UploadFrame::Chunk(vec![1, 2, 3])).await.unwrap();
        tx.send(UploadFrame::Chunk(vec![4, 5])).await.unwrap();
        drop(tx);

        let bytes = read_to_end(reader).await.unwrap();
        assert_eq!(bytes, vec![1, 2, 3, 4, 5]);

        let metadata = pump_handle.await.unwrap().unwrap();
        assert_eq!(metadata.path, "a/original.png");
    }

    #[tokio::test]
    async fn closing_the_sender_before_metadata_is_an_error() {
        let (tx, pump_handle, reader) = start_upload(4096, 16);
        drop(tx);

        let _ = read_to_end(reader).await;
        let err = pump_handle.await.unwrap().unwrap_err();
        assert!(matches!(err, UploadError::MissingMetadata));
    }

    #[tokio::test]
    async fn a_chunk_before_metadata_is_rejected() {
        let (tx, pump_handle, reader) = start_upload(4096, 16);
        tx.send(UploadFrame::Chunk(vec![1])).await.unwrap();
        drop(tx);

        let _ = read_to_end(reader).await;
        let err = pump_handle.await.unwrap().unwrap_err();
        assert!(matches!(err, UploadError::MissingMetadata));
    }
}
