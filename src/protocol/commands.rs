//! Module `command`
//!
//! Defines the FTP command parsing logic and the closed set of verbs the
//! dispatcher routes on.

/// One received command line: an uppercased verb plus raw argument tokens.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
}

impl Command {
    /// Blank lines produce an empty command, which the dispatcher skips.
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// Looks the verb up in the routing table.
    pub fn verb(&self) -> Option<Verb> {
        Verb::from_name(&self.name)
    }
}

/// Parses a raw command line received from a client.
///
/// Surrounding whitespace and line terminators are trimmed, the rest is split
/// on runs of whitespace. The first token (uppercased) is the verb; the others
/// are kept verbatim. Never fails.
pub fn parse_command(raw: &str) -> Command {
    let mut parts = raw.split_whitespace();

    match parts.next() {
        Some(name) => Command {
            name: name.to_ascii_uppercase(),
            args: parts.map(str::to_string).collect(),
        },
        None => Command::default(),
    }
}

/// Represents the outcome status of executing a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Continue,
    CloseConnection,
}

/// Every verb the server understands. Anything else is answered with `502`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    User,
    Pass,
    Rein,
    Quit,
    Pwd,
    Cwd,
    Cdup,
    Mkd,
    Rmd,
    Dele,
    Rnfr,
    Rnto,
    Pasv,
    Port,
    List,
    Nlst,
    Retr,
    Stor,
    Stou,
    Type,
    Stat,
    Noop,
    Syst,
    Help,
}

impl Verb {
    pub const ALL: [Verb; 24] = [
        Verb::User,
        Verb::Pass,
        Verb::Rein,
        Verb::Quit,
        Verb::Pwd,
        Verb::Cwd,
        Verb::Cdup,
        Verb::Mkd,
        Verb::Rmd,
        Verb::Dele,
        Verb::Rnfr,
        Verb::Rnto,
        Verb::Pasv,
        Verb::Port,
        Verb::List,
        Verb::Nlst,
        Verb::Retr,
        Verb::Stor,
        Verb::Stou,
        Verb::Type,
        Verb::Stat,
        Verb::Noop,
        Verb::Syst,
        Verb::Help,
    ];

    pub fn from_name(name: &str) -> Option<Verb> {
        Verb::ALL
            .iter()
            .copied()
            .find(|verb| verb.name().eq_ignore_ascii_case(name))
    }

    pub fn name(self) -> &'static str {
        match self {
            Verb::User => "USER",
            Verb::Pass => "PASS",
            Verb::Rein => "REIN",
            Verb::Quit => "QUIT",
            Verb::Pwd => "PWD",
            Verb::Cwd => "CWD",
            Verb::Cdup => "CDUP",
            Verb::Mkd => "MKD",
            Verb::Rmd => "RMD",
            Verb::Dele => "DELE",
            Verb::Rnfr => "RNFR",
            Verb::Rnto => "RNTO",
            Verb::Pasv => "PASV",
            Verb::Port => "PORT",
            Verb::List => "LIST",
            Verb::Nlst => "NLST",
            Verb::Retr => "RETR",
            Verb::Stor => "STOR",
            Verb::Stou => "STOU",
            Verb::Type => "TYPE",
            Verb::Stat => "STAT",
            Verb::Noop => "NOOP",
            Verb::Syst => "SYST",
            Verb::Help => "HELP",
        }
    }

    /// Whether the verb touches the filesystem or a data channel and so needs
    /// a logged-in session.
    pub fn requires_auth(self) -> bool {
        !matches!(
            self,
            Verb::User | Verb::Pass | Verb::Rein | Verb::Quit | Verb::Noop | Verb::Syst | Verb::Help
        )
    }

    /// Usage line shown by `HELP <verb>`.
    pub fn help_text(self) -> &'static str {
        match self {
            Verb::User => "USER <username>: start a login.",
            Verb::Pass => "PASS <password>: complete a login started with USER.",
            Verb::Rein => "REIN: reset the session to its initial state.",
            Verb::Quit => "QUIT: close the connection.",
            Verb::Pwd => "PWD: print the working directory.",
            Verb::Cwd => "CWD <dir>: change the working directory.",
            Verb::Cdup => "CDUP: change to the parent directory.",
            Verb::Mkd => "MKD <dir>: create a directory.",
            Verb::Rmd => "RMD <dir>: remove an empty directory.",
            Verb::Dele => "DELE <file>: delete a file.",
            Verb::Rnfr => "RNFR <path>: select a file or directory to rename.",
            Verb::Rnto => "RNTO <path>: rename the entry selected by RNFR.",
            Verb::Pasv => "PASV: open a passive data listener.",
            Verb::Port => "PORT <h1,h2,h3,h4,p1,p2>: set the active data address.",
            Verb::List => "LIST [path]: detailed directory listing over the data connection.",
            Verb::Nlst => "NLST [path]: name-only directory listing over the data connection.",
            Verb::Retr => "RETR <file>: download a file.",
            Verb::Stor => "STOR <file>: upload a file.",
            Verb::Stou => "STOU [name]: upload under a server-chosen unique name.",
            Verb::Type => "TYPE <A|I>: set the transfer type.",
            Verb::Stat => "STAT [path]: session status, or the listing of a path.",
            Verb::Noop => "NOOP: do nothing.",
            Verb::Syst => "SYST: report the system type.",
            Verb::Help => "HELP [verb]: list commands or describe one.",
        }
    }
}
