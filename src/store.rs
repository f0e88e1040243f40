//! Append-only, file-per-block chain storage.
//!
//! Every block lives in `<root>/<id:09>.json`. Zero padding keeps a plain
//! directory listing in chain order, so no separate index is kept.

use crate::blockchain::Block;
use crate::config::ChainConfig;
use crate::error::StorageError;
use crate::tx::Transaction;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Largest id whose record name still fits in nine digits.
pub const MAX_BLOCK_ID: u32 = 999_999_999;

const RECORD_EXT: &str = "json";
const ID_WIDTH: usize = 9;

/// Durable mapping from block id to block record.
///
/// Writers for distinct ids may run concurrently; callers must serialize
/// writes for the same id.
#[derive(Debug, Clone)]
pub struct ChainStore {
    root: PathBuf,
}

impl ChainStore {
    /// Opens the store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        if !root.is_dir() {
            fs::create_dir_all(&root).map_err(|e| StorageError::io(&root, e))?;
            info!(root = %root.display(), "created chain directory");
        }
        Ok(Self { root })
    }

    pub fn from_config(config: &ChainConfig) -> Result<Self, StorageError> {
        Self::open(config.storage_root_dir.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the record for block `id`.
    pub fn record_path(&self, id: u32) -> PathBuf {
        self.root.join(record_name(id))
    }

    pub fn contains(&self, id: u32) -> bool {
        self.record_path(id).is_file()
    }

    /// Writes `block` to disk and marks it persisted.
    ///
    /// The block must carry its reward and an up-to-date Merkle root. The
    /// record is written to a temporary file, synced, then renamed into place,
    /// so a crash never leaves a partial record under the final name.
    pub fn save<S, P>(&self, block: &mut Block<S, P>) -> Result<(), StorageError>
    where
        S: Transaction + Serialize,
        P: Transaction + Serialize,
    {
        let id = block.id();
        if id > MAX_BLOCK_ID {
            return Err(StorageError::IdOutOfRange { id });
        }
        let root = block
            .data
            .merkle_root(id)
            .map_err(|source| StorageError::Unfinished { id, source })?;
        if root != block.header.merkle_root {
            return Err(StorageError::StaleMerkleRoot { id });
        }
        debug!(id, "saving block on disk");

        let path = self.record_path(id);
        if path.exists() {
            return Err(StorageError::AlreadyExists { id });
        }

        let bytes = serde_json::to_vec_pretty(&*block).map_err(|source| {
            StorageError::Serialization {
                path: path.clone(),
                source,
            }
        })?;

        let tmp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&tmp_path).map_err(|e| StorageError::io(&tmp_path, e))?;
        let written = file.write_all(&bytes).and_then(|_| file.sync_all());
        drop(file);
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(StorageError::io(&tmp_path, e));
        }
        if let Err(e) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(StorageError::io(&path, e));
        }
        block.mark_persisted();
        self.sync_root()
    }

    /// Flushes the directory entry of a freshly renamed record.
    #[cfg(unix)]
    fn sync_root(&self) -> Result<(), StorageError> {
        fs::File::open(&self.root)
            .and_then(|dir| dir.sync_all())
            .map_err(|e| StorageError::io(&self.root, e))
    }

    #[cfg(not(unix))]
    fn sync_root(&self) -> Result<(), StorageError> {
        Ok(())
    }

    /// Reads the block stored under `id`.
    pub fn load<S, P>(&self, id: u32) -> Result<Block<S, P>, StorageError>
    where
        S: DeserializeOwned,
        P: DeserializeOwned,
    {
        let path = self.record_path(id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound { id })
            }
            Err(e) => return Err(StorageError::io(&path, e)),
        };
        let mut block: Block<S, P> = serde_json::from_slice(&bytes)
            .map_err(|source| StorageError::Serialization { path, source })?;
        block.mark_persisted();
        Ok(block)
    }

    /// Reads every stored block, in chain order.
    pub fn load_all<S, P>(&self) -> Result<Vec<Block<S, P>>, StorageError>
    where
        S: DeserializeOwned,
        P: DeserializeOwned,
    {
        self.ids()?.into_iter().map(|id| self.load(id)).collect()
    }

    /// Returns the block with the highest id, if any.
    pub fn latest<S, P>(&self) -> Result<Option<Block<S, P>>, StorageError>
    where
        S: DeserializeOwned,
        P: DeserializeOwned,
    {
        match self.ids()?.last() {
            Some(&id) => self.load(id).map(Some),
            None => Ok(None),
        }
    }

    /// Ids of all stored records, sorted by record name.
    pub fn ids(&self) -> Result<Vec<u32>, StorageError> {
        let entries = fs::read_dir(&self.root).map_err(|e| StorageError::io(&self.root, e))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::io(&self.root, e))?;
            if let Some(name) = entry.file_name().to_str() {
                if parse_record_name(name).is_some() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();

        Ok(names.iter().filter_map(|n| parse_record_name(n)).collect())
    }
}

fn record_name(id: u32) -> String {
    format!("{:0width$}.{}", id, RECORD_EXT, width = ID_WIDTH)
}

fn parse_record_name(name: &str) -> Option<u32> {
    let stem = name.strip_suffix(RECORD_EXT)?.strip_suffix('.')?;
    if stem.len() != ID_WIDTH || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}
