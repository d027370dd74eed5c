use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::time::timeout;

use crate::client::Session;
use crate::protocol::responses::{COMMAND_UNRECOGNIZED, READY, SERVICE_UNAVAILABLE};
use crate::protocol::{Command, CommandStatus, ControlChannel, handle_command, parse_command};
use crate::server::ServerContext;

/// Outcome of reading one line from the control connection.
enum ReadOutcome {
    Line(String),
    TooLong,
    Closed,
    IdleTimeout,
}

/// Handles one FTP control connection until QUIT, a transport failure, or
/// idle timeout.
///
/// - Greets with `220`, then reads one command line at a time.
/// - Commands run strictly in order; the session is owned by this task.
/// - Whatever the exit path, the session's data resources are released.
pub async fn handle_client<R, W>(reader: R, writer: W, peer: SocketAddr, ctx: Arc<ServerContext>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut control = ControlChannel::new(writer);
    let mut session = Session::new(peer);

    if let Err(e) = control.reply(READY, "Service ready.").await {
        error!("Failed to greet {}: {}", peer, e);
        return;
    }

    loop {
        let line = match read_command_line(&mut reader, &ctx).await {
            Ok(ReadOutcome::Line(line)) => line,
            Ok(ReadOutcome::TooLong) => {
                warn!("Command from {} exceeds {} bytes", peer, ctx.config.max_command_length);
                if control
                    .reply(COMMAND_UNRECOGNIZED, "Command too long.")
                    .await
                    .is_err()
                {
                    break;
                }
                continue;
            }
            Ok(ReadOutcome::Closed) => {
                info!("Connection closed by client {}", peer);
                break;
            }
            Ok(ReadOutcome::IdleTimeout) => {
                info!("Client {} idle, closing control connection", peer);
                let _ = control
                    .reply(
                        SERVICE_UNAVAILABLE,
                        "Idle timeout, closing control connection.",
                    )
                    .await;
                break;
            }
            Err(e) => {
                error!("Failed to read from {}: {}", peer, e);
                break;
            }
        };

        let command = parse_command(&line);
        if command.is_empty() {
            continue;
        }
        info!("Received from {}: {}", peer, loggable(&command));

        match handle_command(&ctx, &mut session, &mut control, &command).await {
            Ok(CommandStatus::Continue) => {}
            Ok(CommandStatus::CloseConnection) => break,
            Err(e) => {
                error!("Failed to write to {}: {}", peer, e);
                break;
            }
        }
    }

    session.close();
    info!("Client {} disconnected", peer);
}

/// Reads one line, bounded by the idle timeout.
async fn read_command_line<R>(
    reader: &mut BufReader<R>,
    ctx: &ServerContext,
) -> std::io::Result<ReadOutcome>
where
    R: AsyncRead + Unpin,
{
    let limit = ctx.config.max_command_length;
    let mut buf = Vec::new();

    let scan = match ctx.config.idle_timeout() {
        Some(idle) => match timeout(idle, fill_line(reader, &mut buf, limit)).await {
            Ok(result) => result?,
            Err(_) => return Ok(ReadOutcome::IdleTimeout),
        },
        None => fill_line(reader, &mut buf, limit).await?,
    };

    if scan.eof && buf.is_empty() {
        return Ok(ReadOutcome::Closed);
    }

    let trimmed = trim_line_ending(&buf);
    if scan.overflow || trimmed.len() > limit {
        return Ok(ReadOutcome::TooLong);
    }
    Ok(ReadOutcome::Line(String::from_utf8_lossy(trimmed).into_owned()))
}

struct LineScan {
    eof: bool,
    overflow: bool,
}

/// Appends bytes up to and including the next newline. Once `buf` holds more
/// than `limit` bytes the rest of the line is drained without being kept, so
/// the stream stays in sync.
async fn fill_line<R>(
    reader: &mut BufReader<R>,
    buf: &mut Vec<u8>,
    limit: usize,
) -> std::io::Result<LineScan>
where
    R: AsyncRead + Unpin,
{
    let mut overflow = false;
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(LineScan {
                eof: true,
                overflow,
            });
        }

        let (consumed, done) = match available.iter().position(|&b| b == b'\n') {
            Some(i) => (i + 1, true),
            None => (available.len(), false),
        };
        if buf.len() <= limit {
            buf.extend_from_slice(&available[..consumed]);
        } else {
            overflow = true;
        }
        reader.consume(consumed);

        if done {
            return Ok(LineScan {
                eof: false,
                overflow,
            });
        }
    }
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Command rendering for logs; the PASS argument is masked.
fn loggable(command: &Command) -> String {
    if command.name == "PASS" {
        return "PASS ****".to_string();
    }
    if command.args.is_empty() {
        command.name.clone()
    } else {
        format!("{} {}", command.name, command.args.join(" "))
    }
}
