//! Command handlers module for the Ferrule FTP server.
//!
//! This module routes each parsed command to its handler, covering
//! authentication, navigation, directory management, and data channel setup
//! and transfers for one session.

use log::{error, info, warn};
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWrite;
use tokio::net::TcpStream;

use crate::auth::{User, validate_username};
use crate::client::Session;
use crate::error::{
    AuthError, FtpServerError, NavigateError, StorageError, TransferError, error_to_ftp_code,
};
use crate::navigate::{change_directory, parent_directory};
use crate::protocol::commands::{Command, CommandStatus, Verb};
use crate::protocol::responses::*;
use crate::server::ServerContext;
use crate::storage::operations::{
    create_directory, delete_file, list_directory, prepare_file_retrieval, prepare_file_storage,
    prepare_rename, prepare_unique_storage, remove_directory, rename_entry,
};
use crate::storage::{ListEntry, StoreTarget, resolve_virtual};
use crate::transfer::{format_pasv_reply, parse_port_argument, receive_file, send_file, send_lines};

const SYNTAX_ERROR_TEXT: &str = "Syntax error in parameters or arguments.";

/// Dispatches a received FTP command to its corresponding handler.
///
/// Verbs outside the routing table get `502`; verbs that need a login get
/// `530` on an unauthenticated session, with no side effect.
///
/// # Returns
///
/// * `CommandStatus::CloseConnection` after QUIT, `Continue` otherwise.
/// * `Err` only when writing to the control connection fails.
pub async fn handle_command<W>(
    ctx: &ServerContext,
    session: &mut Session,
    control: &mut ControlChannel<W>,
    command: &Command,
) -> io::Result<CommandStatus>
where
    W: AsyncWrite + Unpin,
{
    let Some(verb) = command.verb() else {
        warn!("Unknown command from {}: {}", session.peer(), command.name);
        control.reply(NOT_IMPLEMENTED, "Command not implemented.").await?;
        return Ok(CommandStatus::Continue);
    };

    if !verb.requires_auth() {
        return handle_public_command(ctx, session, control, command, verb).await;
    }

    let Some(user) = session.user() else {
        control.reply(NOT_LOGGED_IN, "Not logged in.").await?;
        return Ok(CommandStatus::Continue);
    };

    match verb {
        Verb::Pwd => handle_cmd_pwd(session, control).await?,
        Verb::Cwd => handle_cmd_cwd(&user, session, control, command).await?,
        Verb::Cdup => handle_cmd_cdup(&user, session, control).await?,
        Verb::Mkd => handle_cmd_mkd(&user, session, control, command).await?,
        Verb::Rmd => handle_cmd_rmd(&user, session, control, command).await?,
        Verb::Dele => handle_cmd_dele(&user, session, control, command).await?,
        Verb::Rnfr => handle_cmd_rnfr(&user, session, control, command).await?,
        Verb::Rnto => handle_cmd_rnto(&user, session, control, command).await?,
        Verb::Pasv => handle_cmd_pasv(ctx, session, control).await?,
        Verb::Port => handle_cmd_port(session, control, command).await?,
        Verb::List => handle_cmd_list(ctx, &user, session, control, command, false).await?,
        Verb::Nlst => handle_cmd_list(ctx, &user, session, control, command, true).await?,
        Verb::Retr => handle_cmd_retr(ctx, &user, session, control, command).await?,
        Verb::Stor => handle_cmd_stor(ctx, &user, session, control, command).await?,
        Verb::Stou => handle_cmd_stou(ctx, &user, session, control, command).await?,
        Verb::Type => handle_cmd_type(session, control, command).await?,
        Verb::Stat => handle_cmd_stat(&user, session, control, command).await?,
        _ => return handle_public_command(ctx, session, control, command, verb).await,
    }

    Ok(CommandStatus::Continue)
}

/// Commands accepted in any session state.
async fn handle_public_command<W>(
    ctx: &ServerContext,
    session: &mut Session,
    control: &mut ControlChannel<W>,
    command: &Command,
    verb: Verb,
) -> io::Result<CommandStatus>
where
    W: AsyncWrite + Unpin,
{
    match verb {
        Verb::User => handle_cmd_user(ctx, session, control, command).await?,
        Verb::Pass => handle_cmd_pass(ctx, session, control, command).await?,
        Verb::Rein => {
            session.reset();
            info!("Session {} reinitialized", session.peer());
            control.reply(READY, "Service ready for new user.").await?;
        }
        Verb::Quit => {
            session.close();
            info!("Client {} requested to quit", session.peer());
            control.reply(GOODBYE, "Goodbye.").await?;
            return Ok(CommandStatus::CloseConnection);
        }
        Verb::Noop => control.reply(OK, "NOOP ok.").await?,
        Verb::Syst => control.reply(SYSTEM_TYPE, "UNIX Type: L8").await?,
        Verb::Help => handle_cmd_help(control, command).await?,
        _ => control.reply(NOT_LOGGED_IN, "Not logged in.").await?,
    }

    Ok(CommandStatus::Continue)
}

// --------------------
// Authentication
// --------------------

/// Handles the USER command: resets the session, then records the username
/// until PASS arrives.
async fn handle_cmd_user<W>(
    ctx: &ServerContext,
    session: &mut Session,
    control: &mut ControlChannel<W>,
    command: &Command,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let Some(username) = command.arg(0) else {
        return control.reply(SYNTAX_ERROR, SYNTAX_ERROR_TEXT).await;
    };

    session.reset();

    if let Err(e) = validate_username(username, ctx.config.max_username_length) {
        warn!("Rejected username from {}: {}", session.peer(), e);
        let code = error_to_ftp_code(&FtpServerError::from(e));
        return control.reply(code, "Invalid username.").await;
    }

    session.begin_login(username);
    control.reply(PASSWORD_REQUIRED, "User name okay, need password.").await
}

/// Handles the PASS command: verifies the password for the pending username.
///
/// Unknown users and wrong passwords both answer `530`; only a failing
/// credential store answers `550`. Any failure requires a fresh USER.
async fn handle_cmd_pass<W>(
    ctx: &ServerContext,
    session: &mut Session,
    control: &mut ControlChannel<W>,
    command: &Command,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let Some(username) = session.pending_user().map(str::to_string) else {
        return control.reply(BAD_SEQUENCE, "Bad sequence of commands.").await;
    };

    let Some(secret) = command.arg(0) else {
        return control.reply(SYNTAX_ERROR, SYNTAX_ERROR_TEXT).await;
    };

    let user = match ctx.store.lookup(&username) {
        Ok(Some(user)) => user,
        Ok(None) => {
            return reject_login(session, control, AuthError::UserNotFound(username)).await;
        }
        Err(e) => return reject_login(session, control, e).await,
    };

    let store = Arc::clone(&ctx.store);
    let secret = secret.to_string();
    let hash = user.password_hash.clone();
    let verified = tokio::task::spawn_blocking(move || store.verify(&secret, &hash))
        .await
        .unwrap_or_else(|e| {
            error!("Password verification task failed: {}", e);
            false
        });

    if !verified {
        return reject_login(session, control, AuthError::InvalidPassword(username)).await;
    }

    info!("User {} logged in from {}", username, session.peer());
    session.complete_login(user);
    control.reply(LOGIN_SUCCESS, "User logged in, proceed.").await
}

/// Drops back to unauthenticated after a failed PASS. Unknown users and bad
/// passwords share the same reply.
async fn reject_login<W>(
    session: &mut Session,
    control: &mut ControlChannel<W>,
    err: AuthError,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    match &err {
        AuthError::StoreUnavailable(_) => error!("Login from {} failed: {}", session.peer(), err),
        _ => warn!("Login from {} failed: {}", session.peer(), err),
    }
    session.fail_login();
    let code = error_to_ftp_code(&FtpServerError::from(err));
    let text = if code == NOT_LOGGED_IN {
        "Login incorrect."
    } else {
        "Credential store unavailable."
    };
    control.reply(code, text).await
}

// --------------------
// Navigation and directory management
// --------------------

/// Handles the PWD command: prints the virtual working directory.
async fn handle_cmd_pwd<W>(session: &Session, control: &mut ControlChannel<W>) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let message = format!("\"{}\" is current directory.", session.virtual_dir());
    control.reply(PATH_CREATED, &message).await
}

fn navigate_reply_text(err: &NavigateError) -> &'static str {
    match err {
        NavigateError::DirectoryNotFound(_) => "No such file or directory.",
        NavigateError::NotADirectory(_) => "Not a directory.",
        NavigateError::PathTraversal(_) => "Access denied.",
    }
}

/// Handles the CWD command: changes the working directory for the client.
async fn handle_cmd_cwd<W>(
    user: &User,
    session: &mut Session,
    control: &mut ControlChannel<W>,
    command: &Command,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let Some(target) = command.arg(0) else {
        return control.reply(SYNTAX_ERROR, SYNTAX_ERROR_TEXT).await;
    };

    match change_directory(&user.home, session.virtual_dir(), target) {
        Ok(new_dir) => {
            info!("Client {} changed directory to {}", session.peer(), new_dir);
            session.set_virtual_dir(new_dir);
            control
                .reply(FILE_ACTION_OK, "Directory successfully changed.")
                .await
        }
        Err(e) => {
            warn!("CWD {} failed for {}: {}", target, session.peer(), e);
            control.reply(FILE_UNAVAILABLE, navigate_reply_text(&e)).await
        }
    }
}

/// Handles the CDUP command. The root is its own parent.
async fn handle_cmd_cdup<W>(
    user: &User,
    session: &mut Session,
    control: &mut ControlChannel<W>,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let parent = parent_directory(&user.home, session.virtual_dir());
    let message = format!("Directory changed to {}.", parent);
    session.set_virtual_dir(parent);
    control.reply(OK, &message).await
}

/// Handles the MKD command: creates a directory.
async fn handle_cmd_mkd<W>(
    user: &User,
    session: &Session,
    control: &mut ControlChannel<W>,
    command: &Command,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let Some(dir_name) = command.arg(0) else {
        return control.reply(SYNTAX_ERROR, SYNTAX_ERROR_TEXT).await;
    };

    match create_directory(&user.home, session.virtual_dir(), dir_name) {
        Ok(path) => {
            control
                .reply(PATH_CREATED, &format!("\"{}\" directory created.", path))
                .await
        }
        Err(e) => {
            warn!("MKD {} failed for {}: {}", dir_name, session.peer(), e);
            control.reply(FILE_UNAVAILABLE, &e.reply_text()).await
        }
    }
}

/// Handles the RMD command: removes an empty directory.
async fn handle_cmd_rmd<W>(
    user: &User,
    session: &Session,
    control: &mut ControlChannel<W>,
    command: &Command,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let Some(dir_name) = command.arg(0) else {
        return control.reply(SYNTAX_ERROR, SYNTAX_ERROR_TEXT).await;
    };

    match remove_directory(&user.home, session.virtual_dir(), dir_name) {
        Ok(path) => {
            control
                .reply(FILE_ACTION_OK, &format!("Directory \"{}\" removed.", path))
                .await
        }
        Err(e) => {
            warn!("RMD {} failed for {}: {}", dir_name, session.peer(), e);
            control.reply(FILE_UNAVAILABLE, &e.reply_text()).await
        }
    }
}

/// Handles the DELE command: deletes a regular file.
async fn handle_cmd_dele<W>(
    user: &User,
    session: &Session,
    control: &mut ControlChannel<W>,
    command: &Command,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let Some(filename) = command.arg(0) else {
        return control.reply(SYNTAX_ERROR, SYNTAX_ERROR_TEXT).await;
    };

    match delete_file(&user.home, session.virtual_dir(), filename) {
        Ok(path) => {
            control
                .reply(FILE_ACTION_OK, &format!("\"{}\" deleted successfully.", path))
                .await
        }
        Err(e) => {
            warn!("DELE {} failed for {}: {}", filename, session.peer(), e);
            control.reply(FILE_UNAVAILABLE, &e.reply_text()).await
        }
    }
}

/// Handles the RNFR command: remembers the rename source.
async fn handle_cmd_rnfr<W>(
    user: &User,
    session: &mut Session,
    control: &mut ControlChannel<W>,
    command: &Command,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    session.set_rename_from(None);

    let Some(path) = command.arg(0) else {
        return control.reply(SYNTAX_ERROR, SYNTAX_ERROR_TEXT).await;
    };

    match prepare_rename(&user.home, session.virtual_dir(), path) {
        Ok(source) => {
            session.set_rename_from(Some(source));
            control
                .reply(
                    PENDING_FURTHER_INFO,
                    "Requested file action pending further information.",
                )
                .await
        }
        Err(e) => control.reply(FILE_UNAVAILABLE, &e.reply_text()).await,
    }
}

/// Handles the RNTO command. The pending source is consumed either way.
async fn handle_cmd_rnto<W>(
    user: &User,
    session: &mut Session,
    control: &mut ControlChannel<W>,
    command: &Command,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let Some(source) = session.take_rename_from() else {
        return control.reply(BAD_SEQUENCE, "Bad sequence of commands.").await;
    };

    let Some(target) = command.arg(0) else {
        return control.reply(SYNTAX_ERROR, SYNTAX_ERROR_TEXT).await;
    };

    match rename_entry(&user.home, session.virtual_dir(), &source, target) {
        Ok(_) => control.reply(FILE_ACTION_OK, "Rename successful.").await,
        Err(e) => {
            warn!("RNTO {} -> {} failed for {}: {}", source, target, session.peer(), e);
            control.reply(FILE_UNAVAILABLE, &e.reply_text()).await
        }
    }
}

// --------------------
// Data channel negotiation
// --------------------

/// Handles the PASV command: closes any previous data resource and opens a
/// fresh listener from the shared port pool.
async fn handle_cmd_pasv<W>(
    ctx: &ServerContext,
    session: &mut Session,
    control: &mut ControlChannel<W>,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    session.data_channel_mut().close();

    let (bind_ip, advertised) = match (ctx.config.bind_ip(), ctx.config.advertised_ip()) {
        (Ok(bind_ip), Ok(advertised)) => (bind_ip, advertised),
        (Err(e), _) | (_, Err(e)) => {
            error!("Passive mode misconfigured: {}", e);
            return control
                .reply(CANT_OPEN_DATA, "Can't open data connection.")
                .await;
        }
    };

    match ctx.ports.bind(bind_ip).await {
        Ok(listener) => {
            let port = listener.port();
            session.data_channel_mut().set_passive(listener);
            info!("Client {} entered passive mode on port {}", session.peer(), port);
            control
                .reply(PASSIVE_MODE, &format_pasv_reply(advertised, port))
                .await
        }
        Err(e) => {
            warn!("PASV failed for {}: {}", session.peer(), e);
            let code = error_to_ftp_code(&FtpServerError::from(e));
            control.reply(code, "Can't open data connection.").await
        }
    }
}

/// Handles the PORT command: records the client's data address for the next
/// transfer. No connection is made yet. Any earlier negotiation is dropped
/// first, whether or not the argument parses.
async fn handle_cmd_port<W>(
    session: &mut Session,
    control: &mut ControlChannel<W>,
    command: &Command,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    session.data_channel_mut().close();

    if command.args.len() != 1 {
        return control.reply(SYNTAX_ERROR, SYNTAX_ERROR_TEXT).await;
    }

    match parse_port_argument(&command.args[0]) {
        Ok(target) => {
            session.data_channel_mut().set_active(target);
            info!("Client {} set active data target {}", session.peer(), target);
            control.reply(OK, "PORT command successful.").await
        }
        Err(e) => {
            warn!("Bad PORT from {}: {}", session.peer(), e);
            let code = error_to_ftp_code(&FtpServerError::ProtocolError(e.to_string()));
            control.reply(code, SYNTAX_ERROR_TEXT).await
        }
    }
}

// --------------------
// Transfers
// --------------------

/// Replies `425` when no data channel has been negotiated. Returns whether
/// the transfer may go ahead.
async fn require_data_channel<W>(
    session: &Session,
    control: &mut ControlChannel<W>,
) -> io::Result<bool>
where
    W: AsyncWrite + Unpin,
{
    if session.data_channel().is_ready() {
        return Ok(true);
    }
    control.reply(CANT_OPEN_DATA, "Use PORT or PASV first.").await?;
    Ok(false)
}

fn opening_text(session: &Session, what: &str) -> String {
    format!("Opening {} mode data connection for {}.", session.data_mode(), what)
}

/// Sends `150` with `preliminary`, then opens the negotiated data connection.
/// Replies `425` and returns `None` if it cannot be established. The
/// negotiation is consumed either way.
async fn open_data_connection<W>(
    ctx: &ServerContext,
    session: &mut Session,
    control: &mut ControlChannel<W>,
    preliminary: &str,
) -> io::Result<Option<TcpStream>>
where
    W: AsyncWrite + Unpin,
{
    control.reply(OPENING_DATA, preliminary).await?;

    match session.data_channel_mut().open(ctx.config.data_timeout()).await {
        Ok(stream) => Ok(Some(stream)),
        Err(e) => {
            warn!("Data connection for {} failed: {}", session.peer(), e);
            control
                .reply(CANT_OPEN_DATA, "Can't open data connection.")
                .await?;
            Ok(None)
        }
    }
}

/// Final reply of a transfer. The data stream must already be closed.
async fn finish_transfer<W, T>(
    session: &Session,
    control: &mut ControlChannel<W>,
    what: &str,
    result: Result<T, TransferError>,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    match result {
        Ok(_) => {
            info!("Transfer of {} to {} complete", what, session.peer());
            control.reply(TRANSFER_COMPLETE, "Transfer complete.").await
        }
        Err(e) => {
            error!("Transfer of {} to {} aborted: {}", what, session.peer(), e);
            control
                .reply(TRANSFER_ABORTED, "Connection closed; transfer aborted.")
                .await
        }
    }
}

/// Handles LIST and NLST: sends a directory listing over the data channel.
/// Arguments starting with `-` are treated as `ls` flags and ignored.
async fn handle_cmd_list<W>(
    ctx: &ServerContext,
    user: &User,
    session: &mut Session,
    control: &mut ControlChannel<W>,
    command: &Command,
    names_only: bool,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    if !require_data_channel(session, control).await? {
        return Ok(());
    }

    let target = command
        .args
        .iter()
        .find(|arg| !arg.starts_with('-'))
        .map(String::as_str)
        .unwrap_or(".");
    let virtual_path = resolve_virtual(&user.home, session.virtual_dir(), target);

    let entries = match list_directory(&user.home, &virtual_path) {
        Ok(entries) => entries,
        Err(e) => {
            session.data_channel_mut().close();
            warn!("Listing {} failed for {}: {}", virtual_path, session.peer(), e);
            return control.reply(FILE_UNAVAILABLE, &e.reply_text()).await;
        }
    };

    let lines: Vec<String> = if names_only {
        entries.into_iter().map(|entry| entry.name).collect()
    } else {
        entries.iter().map(ListEntry::to_list_line).collect()
    };

    let preliminary = opening_text(session, "directory listing");
    let Some(mut stream) = open_data_connection(ctx, session, control, &preliminary).await? else {
        return Ok(());
    };
    let result = send_lines(&mut stream, &lines).await;
    drop(stream);

    finish_transfer(session, control, &virtual_path, result).await
}

/// Handles the RETR command: streams a regular file to the client.
async fn handle_cmd_retr<W>(
    ctx: &ServerContext,
    user: &User,
    session: &mut Session,
    control: &mut ControlChannel<W>,
    command: &Command,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let Some(filename) = command.arg(0) else {
        return control.reply(SYNTAX_ERROR, SYNTAX_ERROR_TEXT).await;
    };

    if !require_data_channel(session, control).await? {
        return Ok(());
    }

    let opened = match prepare_file_retrieval(&user.home, session.virtual_dir(), filename) {
        Ok(path) => tokio::fs::File::open(&path)
            .await
            .map_err(StorageError::from),
        Err(e) => Err(e),
    };

    let file = match opened {
        Ok(file) => file,
        Err(e) => {
            session.data_channel_mut().close();
            warn!("RETR {} failed for {}: {}", filename, session.peer(), e);
            return control.reply(FILE_UNAVAILABLE, &e.reply_text()).await;
        }
    };

    let preliminary = opening_text(session, filename);
    let Some(mut stream) = open_data_connection(ctx, session, control, &preliminary).await? else {
        return Ok(());
    };
    let result = send_file(&mut stream, file, ctx.config.buffer_size).await;
    drop(stream);

    finish_transfer(session, control, filename, result).await
}

/// Handles the STOR command: receives a new file from the client. Existing
/// entries are never overwritten.
async fn handle_cmd_stor<W>(
    ctx: &ServerContext,
    user: &User,
    session: &mut Session,
    control: &mut ControlChannel<W>,
    command: &Command,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let Some(filename) = command.arg(0) else {
        return control.reply(SYNTAX_ERROR, SYNTAX_ERROR_TEXT).await;
    };

    if !require_data_channel(session, control).await? {
        return Ok(());
    }

    let target = match prepare_file_storage(&user.home, session.virtual_dir(), filename) {
        Ok(target) => target,
        Err(e) => {
            session.data_channel_mut().close();
            warn!("STOR {} failed for {}: {}", filename, session.peer(), e);
            return control.reply(FILE_UNAVAILABLE, &e.reply_text()).await;
        }
    };

    let preliminary = opening_text(session, filename);
    receive_upload(ctx, session, control, &target, &preliminary).await
}

/// Handles the STOU command: like STOR, but the server picks a name in the
/// working directory that is not in use and announces it in the `150` reply.
async fn handle_cmd_stou<W>(
    ctx: &ServerContext,
    user: &User,
    session: &mut Session,
    control: &mut ControlChannel<W>,
    command: &Command,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    if !require_data_channel(session, control).await? {
        return Ok(());
    }

    let target = match prepare_unique_storage(&user.home, session.virtual_dir(), command.arg(0)) {
        Ok(target) => target,
        Err(e) => {
            session.data_channel_mut().close();
            warn!("STOU failed for {}: {}", session.peer(), e);
            return control.reply(FILE_UNAVAILABLE, &e.reply_text()).await;
        }
    };

    let name = target
        .virtual_path
        .rsplit('/')
        .next()
        .unwrap_or(&target.virtual_path);
    let preliminary = format!("FILE: {}", name);
    receive_upload(ctx, session, control, &target, &preliminary).await
}

/// Receives an upload into `target`'s temporary file and renames it into
/// place. The temporary file is removed on every failure path.
async fn receive_upload<W>(
    ctx: &ServerContext,
    session: &mut Session,
    control: &mut ControlChannel<W>,
    target: &StoreTarget,
    preliminary: &str,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let file = match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&target.temp_path)
        .await
    {
        Ok(file) => file,
        Err(e) => {
            session.data_channel_mut().close();
            error!(
                "Failed to create {} for {}: {}",
                target.temp_path.display(),
                session.peer(),
                e
            );
            let e = StorageError::from(e);
            return control.reply(FILE_UNAVAILABLE, &e.reply_text()).await;
        }
    };

    let mut stream = match open_data_connection(ctx, session, control, preliminary).await {
        Ok(Some(stream)) => stream,
        Ok(None) => {
            discard_partial(&target.temp_path).await;
            return Ok(());
        }
        Err(e) => {
            discard_partial(&target.temp_path).await;
            return Err(e);
        }
    };
    let result = receive_file(
        &mut stream,
        file,
        &target.temp_path,
        &target.file_path,
        ctx.config.buffer_size,
    )
    .await;
    drop(stream);

    finish_transfer(session, control, &target.virtual_path, result).await
}

async fn discard_partial(temp_path: &Path) {
    if let Err(e) = tokio::fs::remove_file(temp_path).await {
        warn!("Failed to remove {}: {}", temp_path.display(), e);
    }
}

// --------------------
// Informational
// --------------------

/// Handles the TYPE command. Only ASCII and image types are accepted; the
/// choice is recorded but transfers are always binary.
async fn handle_cmd_type<W>(
    session: &mut Session,
    control: &mut ControlChannel<W>,
    command: &Command,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let Some(code) = command.arg(0) else {
        return control.reply(SYNTAX_ERROR, SYNTAX_ERROR_TEXT).await;
    };

    let code = code.to_ascii_uppercase();
    let format = command.arg(1).map(str::to_ascii_uppercase);

    let accepted = match (code.as_str(), format.as_deref()) {
        ("A", None | Some("N")) => true,
        ("I", None) => true,
        _ => false,
    };

    if !accepted {
        return control
            .reply(
                PARAMETER_NOT_IMPLEMENTED,
                "Command not implemented for that parameter.",
            )
            .await;
    }

    let message = format!("Type set to {}.", code);
    session.set_transfer_type(code);
    control.reply(OK, &message).await
}

/// Handles the STAT command: session status without an argument, a listing
/// of the path over the control connection with one.
async fn handle_cmd_stat<W>(
    user: &User,
    session: &Session,
    control: &mut ControlChannel<W>,
    command: &Command,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let Some(target) = command.arg(0) else {
        let lines = vec![
            "FTP server status:".to_string(),
            format!("Connected to {}", session.peer()),
            format!("Logged in as {}", user.username),
            format!("Working directory: {}", session.virtual_dir()),
            format!("TYPE: {}", session.transfer_type()),
            format!("Data connection: {}", session.data_mode()),
            "End of status.".to_string(),
        ];
        return control.reply_multiline(SYSTEM_STATUS, &lines).await;
    };

    let virtual_path = resolve_virtual(&user.home, session.virtual_dir(), target);
    match list_directory(&user.home, &virtual_path) {
        Ok(entries) => {
            let mut lines = Vec::with_capacity(entries.len() + 2);
            lines.push(format!("Status of {}:", virtual_path));
            lines.extend(entries.iter().map(ListEntry::to_list_line));
            lines.push("End of status.".to_string());
            control.reply_multiline(FILE_STATUS, &lines).await
        }
        Err(e) => control.reply(FILE_UNAVAILABLE, &e.reply_text()).await,
    }
}

/// Handles the HELP command.
async fn handle_cmd_help<W>(control: &mut ControlChannel<W>, command: &Command) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    if let Some(name) = command.arg(0) {
        return match Verb::from_name(&name.to_ascii_uppercase()) {
            Some(verb) => control.reply(HELP, verb.help_text()).await,
            None => {
                control
                    .reply(
                        PARAMETER_NOT_IMPLEMENTED,
                        "Command not implemented for that parameter.",
                    )
                    .await
            }
        };
    }

    let mut lines = vec!["The following commands are recognized:".to_string()];
    for chunk in Verb::ALL.chunks(8) {
        let names: Vec<&str> = chunk.iter().map(|verb| verb.name()).collect();
        lines.push(format!(" {}", names.join(" ")));
    }
    lines.push("Help OK.".to_string());
    control.reply_multiline(HELP, &lines).await
}
