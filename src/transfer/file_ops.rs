//! Module `file_ops`
//!
//! Moves bytes over an open data connection: directory listings, downloads
//! and uploads. Files are opened by the caller before the data connection is
//! established, so everything that fails here is a transfer failure.

use log::{error, info};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;

use crate::error::TransferError;

/// Writes each line followed by CRLF, then shuts down the write side.
pub async fn send_lines(stream: &mut TcpStream, lines: &[String]) -> Result<(), TransferError> {
    let mut payload = String::new();
    for line in lines {
        payload.push_str(line);
        payload.push_str("\r\n");
    }

    stream
        .write_all(payload.as_bytes())
        .await
        .map_err(TransferError::TransferFailed)?;
    stream.shutdown().await.map_err(TransferError::TransferFailed)?;
    Ok(())
}

/// Handles downloading a file from the server to the client.
pub async fn send_file(
    stream: &mut TcpStream,
    file: File,
    buffer_size: usize,
) -> Result<u64, TransferError> {
    let mut reader = BufReader::with_capacity(buffer_size, file);
    let bytes = tokio::io::copy_buf(&mut reader, stream)
        .await
        .map_err(TransferError::TransferFailed)?;
    stream.shutdown().await.map_err(TransferError::TransferFailed)?;
    Ok(bytes)
}

/// Handles uploading a file from the client into `temp_path`, then renames
/// it to `file_path`. The temporary file is removed if anything fails.
pub async fn receive_file(
    stream: &mut TcpStream,
    file: File,
    temp_path: &Path,
    file_path: &Path,
    buffer_size: usize,
) -> Result<u64, TransferError> {
    let result = async {
        let mut writer = BufWriter::with_capacity(buffer_size, file);
        let bytes = tokio::io::copy(stream, &mut writer).await?;
        writer.flush().await?;
        writer.into_inner().sync_all().await?;
        tokio::fs::rename(temp_path, file_path).await?;
        Ok::<u64, std::io::Error>(bytes)
    }
    .await;

    match result {
        Ok(bytes) => {
            info!("Stored {} bytes into {}", bytes, file_path.display());
            Ok(bytes)
        }
        Err(e) => {
            error!("Upload to {} failed: {}", file_path.display(), e);
            let _ = tokio::fs::remove_file(temp_path).await;
            Err(TransferError::TransferFailed(e))
        }
    }
}
