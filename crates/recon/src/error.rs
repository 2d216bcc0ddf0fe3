use std::fmt;

use crate::model::{Bucket, CommitAction};

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (empty field name, bad override, etc.).
    ConfigValidation(String),
    /// Override requested an action the bucket does not allow.
    ActionNotAllowed { bucket: Bucket, action: CommitAction },
    /// No outcome carries the given action key.
    UnknownActionKey(String),
    /// Store lookup or mutation failed.
    Store(String),
    /// The final store save failed. Items applied before it stay applied.
    Save(String),
    /// IO error (snapshot read, etc.).
    Io(String),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::ActionNotAllowed { bucket, action } => {
                write!(f, "action '{action}' is not allowed for {bucket} items")
            }
            Self::UnknownActionKey(key) => write!(f, "no outcome with action key '{key}'"),
            Self::Store(msg) => write!(f, "store error: {msg}"),
            Self::Save(msg) => write!(f, "store save failed: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}
