use std::{
    collections::{BTreeMap, HashMap},
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{anyhow, Context};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use super::{apply_update, Condition, Mutation, PlayerStore};
use crate::{error::StoreError, models::Player};

const DOCUMENT_VERSION: u32 = 1;

/// One write lock per canonical document path, shared by every handle in the
/// process.
static PATH_LOCKS: Lazy<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn default_version() -> u32 {
    DOCUMENT_VERSION
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PlayersDocument {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    players: BTreeMap<String, Player>,
}

/// Store backed by a single JSON document on disk.
///
/// The document is re-read for every call, so several handles over the same
/// path observe each other's commits. Read-modify-write cycles hold a lock
/// keyed by the canonical path, shared across handles in this process. Writes
/// go through a sibling temporary file and an atomic rename.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Store rooted at `path`; the file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> &Path {
        self.path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    /// Lock shared by every handle whose path resolves to the same file.
    fn write_lock(&self) -> anyhow::Result<Arc<Mutex<()>>> {
        let parent = self.parent_dir();
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
        let dir = fs::canonicalize(parent)
            .with_context(|| format!("failed to resolve {}", parent.display()))?;
        let key = match self.path.file_name() {
            Some(name) => dir.join(name),
            None => return Err(anyhow!("{} is not a file path", self.path.display())),
        };
        Ok(Arc::clone(PATH_LOCKS.lock().entry(key).or_default()))
    }

    fn read_document(&self) -> anyhow::Result<PlayersDocument> {
        if !self.path.exists() {
            return Ok(PlayersDocument {
                version: DOCUMENT_VERSION,
                players: BTreeMap::new(),
            });
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let document: PlayersDocument = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;
        if document.version != DOCUMENT_VERSION {
            return Err(anyhow!(
                "unsupported store version {} in {}",
                document.version,
                self.path.display()
            ));
        }
        Ok(document)
    }

    fn write_document(&self, document: &PlayersDocument) -> anyhow::Result<()> {
        let parent = self.parent_dir();
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;

        let serialised = serde_json::to_vec_pretty(document).context("failed to encode players")?;
        let mut temp = NamedTempFile::new_in(parent)
            .with_context(|| format!("failed to create temp file in {}", parent.display()))?;
        temp.write_all(&serialised)
            .context("failed to write players document")?;
        temp.persist(&self.path)
            .map_err(|err| err.error)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        debug!(path = %self.path.display(), players = document.players.len(), "store written");
        Ok(())
    }
}

impl PlayerStore for FileStore {
    fn get(&self, player_id: &str) -> Result<Option<Player>, StoreError> {
        let document = self.read_document()?;
        Ok(document.players.get(player_id).cloned())
    }

    fn create(&self, player: Player) -> Result<(), StoreError> {
        let lock = self.write_lock()?;
        let _guard = lock.lock();
        let mut document = self.read_document()?;
        if document.players.contains_key(&player.player_id) {
            return Err(StoreError::PlayerExists(player.player_id));
        }
        document.players.insert(player.player_id.clone(), player);
        self.write_document(&document)?;
        Ok(())
    }

    fn update(
        &self,
        player_id: &str,
        conditions: &[Condition],
        mutations: &[Mutation],
    ) -> Result<Player, StoreError> {
        let lock = self.write_lock()?;
        let _guard = lock.lock();
        let mut document = self.read_document()?;
        let current = document
            .players
            .get(player_id)
            .ok_or_else(|| StoreError::PlayerNotFound(player_id.to_string()))?;
        let next = apply_update(current, conditions, mutations)?;
        document.players.insert(player_id.to_string(), next.clone());
        self.write_document(&document)?;
        Ok(next)
    }
}
