//! FTP Response handling
//!
//! Defines FTP response codes, reply framing, and the writer half of the
//! control connection.

use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Standard FTP response codes
pub const OPENING_DATA: u16 = 150;
pub const OK: u16 = 200;
pub const SYSTEM_STATUS: u16 = 211;
pub const FILE_STATUS: u16 = 213;
pub const HELP: u16 = 214;
pub const SYSTEM_TYPE: u16 = 215;
pub const READY: u16 = 220;
pub const GOODBYE: u16 = 221;
pub const TRANSFER_COMPLETE: u16 = 226;
pub const PASSIVE_MODE: u16 = 227;
pub const LOGIN_SUCCESS: u16 = 230;
pub const FILE_ACTION_OK: u16 = 250;
pub const PATH_CREATED: u16 = 257;
pub const PASSWORD_REQUIRED: u16 = 331;
pub const PENDING_FURTHER_INFO: u16 = 350;
pub const SERVICE_UNAVAILABLE: u16 = 421;
pub const CANT_OPEN_DATA: u16 = 425;
pub const TRANSFER_ABORTED: u16 = 426;
pub const COMMAND_UNRECOGNIZED: u16 = 500;
pub const SYNTAX_ERROR: u16 = 501;
pub const NOT_IMPLEMENTED: u16 = 502;
pub const BAD_SEQUENCE: u16 = 503;
pub const PARAMETER_NOT_IMPLEMENTED: u16 = 504;
pub const NOT_LOGGED_IN: u16 = 530;
pub const FILE_UNAVAILABLE: u16 = 550;

/// Format an FTP response message
pub fn format_response(code: u16, message: &str) -> String {
    format!("{} {}\r\n", code, message)
}

/// Format a multi-line reply: `code-` on every line but the last, `code ` on
/// the last one.
pub fn format_multiline(code: u16, lines: &[String]) -> String {
    match lines.split_last() {
        Some((last, rest)) => {
            let mut reply = String::new();
            for line in rest {
                reply.push_str(&format!("{}-{}\r\n", code, line));
            }
            reply.push_str(&format_response(code, last));
            reply
        }
        None => format_response(code, ""),
    }
}

/// Writer half of a control connection. Every reply is flushed immediately.
pub struct ControlChannel<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> ControlChannel<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub async fn reply(&mut self, code: u16, message: &str) -> std::io::Result<()> {
        self.send(&format_response(code, message)).await
    }

    pub async fn reply_multiline(&mut self, code: u16, lines: &[String]) -> std::io::Result<()> {
        self.send(&format_multiline(code, lines)).await
    }

    async fn send(&mut self, raw: &str) -> std::io::Result<()> {
        self.writer.write_all(raw.as_bytes()).await?;
        self.writer.flush().await
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }
}
