#![forbid(unsafe_code)]

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest as _, Sha256};

use crate::board::tree::BoardDocument;
use crate::store::workspace::Workspaces;
use crate::store::{BoardStore, Scope, StoreKey};

/// One JSON document per workspace under a data directory:
///
/// ```text
/// <root>/local/workspaces.json
/// <root>/local/boards/<name>-<hash>.json
/// <root>/users/<user>-<hash>/...
/// ```
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn scope_dir(&self, scope: &Scope) -> PathBuf {
        match scope {
            Scope::Local => self.root.join("local"),
            Scope::User(user) => self.root.join("users").join(file_stem(user)),
        }
    }

    #[must_use]
    pub fn board_path(&self, key: &StoreKey) -> PathBuf {
        self.scope_dir(key.scope())
            .join("boards")
            .join(format!("{}.json", file_stem(key.workspace())))
    }

    #[must_use]
    pub fn workspaces_path(&self, scope: &Scope) -> PathBuf {
        self.scope_dir(scope).join("workspaces.json")
    }
}

impl BoardStore for FileStore {
    fn load(&self, key: &StoreKey) -> anyhow::Result<Option<BoardDocument>> {
        read_json(&self.board_path(key))
    }

    fn save(&self, key: &StoreKey, doc: &BoardDocument) -> anyhow::Result<()> {
        write_json(&self.board_path(key), doc)
    }

    fn remove(&self, key: &StoreKey) -> anyhow::Result<()> {
        let path = self.board_path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to remove {}", path.display())),
        }
    }

    fn load_workspaces(&self, scope: &Scope) -> anyhow::Result<Option<Workspaces>> {
        read_json(&self.workspaces_path(scope))
    }

    fn save_workspaces(&self, scope: &Scope, list: &Workspaces) -> anyhow::Result<()> {
        write_json(&self.workspaces_path(scope), list)
    }
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Option<T>> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
    };
    let value = serde_json::from_slice(&data)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(Some(value))
}

/// Writes through a sibling temp file and a rename so readers never see a
/// half-written document.
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_vec_pretty(value)?;
    std::fs::write(&tmp, &data).with_context(|| format!("failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}

/// Sanitized name plus a hash of the raw name, so names that sanitize to
/// the same text still land in different files.
fn file_stem(name: &str) -> String {
    let clean = sanitize_for_filesystem(name);
    let hash = short_hash(name);
    if clean.is_empty() {
        hash
    } else {
        format!("{clean}-{hash}")
    }
}

#[must_use]
pub fn sanitize_for_filesystem(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.trim().chars() {
        if c == '/' || c == '\\' || c == '\0' || c.is_control() {
            out.push('-');
            continue;
        }
        // Windows reserved characters.
        if matches!(c, ':' | '*' | '?' | '"' | '<' | '>' | '|') {
            out.push('-');
            continue;
        }
        out.push(c);
    }
    while out.contains("--") {
        out = out.replace("--", "-");
    }
    out.trim_matches(|c| c == '-' || c == '.').to_owned()
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut s = String::with_capacity(8);
    for b in &digest[..4] {
        let _ = write!(&mut s, "{b:02x}");
    }
    s
}
