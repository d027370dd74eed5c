//! FTP Transfer modes

use std::fmt;

/// Which kind of data connection the session has negotiated, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataMode {
    None,
    Active,
    Passive,
}

impl fmt::Display for DataMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataMode::None => write!(f, "none"),
            DataMode::Active => write!(f, "active"),
            DataMode::Passive => write!(f, "passive"),
        }
    }
}
