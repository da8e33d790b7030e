#![forbid(unsafe_code)]

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TierboardError {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid config key '{0}'")]
    InvalidConfigKey(String),

    #[error("invalid config value for '{key}': {msg}")]
    InvalidConfigValue { key: String, msg: String },

    #[error("workspace name must not be empty")]
    EmptyWorkspaceName,

    #[error("a workspace named '{0}' already exists")]
    DuplicateWorkspace(String),

    #[error("workspace not found: {0}")]
    WorkspaceNotFound(String),

    #[error("cannot remove the last workspace")]
    LastWorkspace,

    #[error("user name must not be empty")]
    EmptyUserName,

    #[error("task title must not be empty")]
    EmptyTitle,

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("unknown column '{0}' (expected final, parent, child or grandchild)")]
    InvalidColumn(String),

    #[error("unknown status '{0}' (expected not-started, in-progress or done)")]
    InvalidStatus(String),

    #[error("unknown priority '{0}' (expected low, medium, high or none)")]
    InvalidPriority(String),

    #[error("invalid date '{0}' (expected YYYY-MM-DD)")]
    InvalidDate(String),

    #[error("invalid color '{0}' (expected #RRGGBB)")]
    InvalidColor(String),

    #[error("io error at {path}: {source}")]
    IoPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}
