#![forbid(unsafe_code)]

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::TierboardError;
use crate::store::Scope;
use crate::store::file::{read_json, write_json};

/// The signed-in identity, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user: Option<String>,
}

impl Session {
    /// A missing file means nobody is signed in.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        Ok(read_json(path)?.unwrap_or_default())
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        write_json(path, self)
    }

    #[must_use]
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn sign_in(&mut self, user: &str) -> Result<(), TierboardError> {
        let user = user.trim();
        if user.is_empty() {
            return Err(TierboardError::EmptyUserName);
        }
        info!(user, "signed in");
        self.user = Some(user.to_owned());
        Ok(())
    }

    /// Returns whether someone was signed in.
    pub fn sign_out(&mut self) -> bool {
        let was = self.user.take();
        if let Some(user) = &was {
            info!(user = %user, "signed out");
        }
        was.is_some()
    }

    #[must_use]
    pub fn scope(&self) -> Scope {
        self.user
            .as_ref()
            .map_or(Scope::Local, |u| Scope::User(u.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_in_scopes_documents() {
        let mut session = Session::default();
        assert_eq!(session.scope(), Scope::Local);
        session.sign_in("  alice ").unwrap();
        assert_eq!(session.user(), Some("alice"));
        assert_eq!(session.scope(), Scope::User("alice".to_owned()));
        assert!(session.sign_out());
        assert!(!session.sign_out());
        assert_eq!(session.scope(), Scope::Local);
    }

    #[test]
    fn empty_user_is_rejected() {
        let mut session = Session::default();
        assert!(matches!(
            session.sign_in("   "),
            Err(TierboardError::EmptyUserName)
        ));
        assert_eq!(session.user(), None);
    }

    #[test]
    fn persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        assert_eq!(Session::load(&path).unwrap(), Session::default());

        let mut session = Session::default();
        session.sign_in("bob").unwrap();
        session.save(&path).unwrap();
        assert_eq!(Session::load(&path).unwrap().user(), Some("bob"));
    }
}
