#![forbid(unsafe_code)]

pub mod file;
pub mod memory;
pub mod session;
pub mod workspace;

use std::fmt;

use crate::board::tree::BoardDocument;
use crate::store::session::Session;
use crate::store::workspace::Workspaces;

/// Whose documents a key addresses.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    Local,
    User(String),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::User(user) => write!(f, "user:{user}"),
        }
    }
}

/// Address of one workspace's board document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StoreKey {
    scope: Scope,
    workspace: String,
}

impl StoreKey {
    #[must_use]
    pub fn new(session: &Session, workspace: impl Into<String>) -> Self {
        Self::scoped(session.scope(), workspace)
    }

    #[must_use]
    pub fn scoped(scope: Scope, workspace: impl Into<String>) -> Self {
        Self {
            scope,
            workspace: workspace.into(),
        }
    }

    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    #[must_use]
    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    /// Same scope, different workspace.
    #[must_use]
    pub fn with_workspace(&self, workspace: impl Into<String>) -> Self {
        Self::scoped(self.scope.clone(), workspace)
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.scope, self.workspace)
    }
}

/// Where board documents and workspace lists live.
pub trait BoardStore: Send + Sync {
    /// `Ok(None)` when nothing was ever saved under `key`.
    fn load(&self, key: &StoreKey) -> anyhow::Result<Option<BoardDocument>>;
    fn save(&self, key: &StoreKey, doc: &BoardDocument) -> anyhow::Result<()>;
    /// Removing a missing document is not an error.
    fn remove(&self, key: &StoreKey) -> anyhow::Result<()>;

    fn load_workspaces(&self, scope: &Scope) -> anyhow::Result<Option<Workspaces>>;
    fn save_workspaces(&self, scope: &Scope, list: &Workspaces) -> anyhow::Result<()>;
}
