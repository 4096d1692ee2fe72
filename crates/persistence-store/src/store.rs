use crate::{StoreError, StoreResult};
use itinerary_types::{PersistedRecord, RecordKind};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs;
use tracing::{debug, warn};
use ulid::{Generator, Ulid};

pub const MESSAGE_PREFIX: &str = "_message_";
pub const TRACKING_PREFIX: &str = "_tracking_";
const EXTENSION: &str = ".json";

fn prefix(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Message => MESSAGE_PREFIX,
        RecordKind::Tracking => TRACKING_PREFIX,
    }
}

/// Handle to one stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredKey {
    pub kind: RecordKind,
    /// `None` for a prefixed file the store did not name itself.
    pub id: Option<Ulid>,
    file_name: String,
}

impl StoredKey {
    pub fn new(kind: RecordKind, id: Ulid) -> Self {
        Self {
            kind,
            id: Some(id),
            file_name: format!("{}{}{}", prefix(kind), id, EXTENSION),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Classify a file by its record prefix. Files without one are `None`.
    pub fn parse(file_name: &str) -> Option<Self> {
        let (kind, rest) = if let Some(rest) = file_name.strip_prefix(TRACKING_PREFIX) {
            (RecordKind::Tracking, rest)
        } else if let Some(rest) = file_name.strip_prefix(MESSAGE_PREFIX) {
            (RecordKind::Message, rest)
        } else {
            return None;
        };
        let id = rest
            .strip_suffix(EXTENSION)
            .and_then(|id| Ulid::from_string(id).ok());
        Some(Self {
            kind,
            id,
            file_name: file_name.to_string(),
        })
    }
}

impl std::fmt::Display for StoredKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.file_name)
    }
}

/// Directory of pending records.
///
/// Safe to use from concurrent tasks: every record gets its own file, writes
/// land through a temporary file and a rename, and removal ignores files
/// that are already gone.
pub struct PersistenceStore {
    dir: PathBuf,
    ids: Mutex<Generator>,
}

impl PersistenceStore {
    pub async fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            ids: Mutex::new(Generator::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn next_id(&self) -> Ulid {
        let mut generator = self.ids.lock().unwrap_or_else(|e| e.into_inner());
        generator.generate().unwrap_or_else(|_| Ulid::new())
    }

    /// Write one record as its own durable unit.
    pub async fn persist(&self, record: &PersistedRecord) -> StoreResult<StoredKey> {
        let key = StoredKey::new(record.kind(), self.next_id());
        let body = record.to_json()?;

        let final_path = self.dir.join(key.file_name());
        let tmp_path = self.dir.join(format!(".{}.tmp", key.file_name()));
        if let Err(e) = write_then_rename(&tmp_path, &final_path, &body).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        debug!(key = %key, bytes = body.len(), "persisted record");
        Ok(key)
    }

    /// All stored records in creation order. Prefixed files with a name the
    /// store did not generate come first so a replay can read or drop them.
    pub async fn list(&self) -> StoreResult<Vec<StoredKey>> {
        let mut keys = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            match StoredKey::parse(name) {
                Some(key) => {
                    if key.id.is_none() {
                        warn!(file = name, "record file has an unexpected name");
                    }
                    keys.push(key);
                }
                None => debug!(file = name, "ignoring unrecognized file in persist dir"),
            }
        }
        keys.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.file_name.cmp(&b.file_name)));
        Ok(keys)
    }

    pub async fn read(&self, key: &StoredKey) -> StoreResult<PersistedRecord> {
        let body = fs::read(self.dir.join(key.file_name())).await?;
        PersistedRecord::from_json(key.kind, &body).map_err(|e| StoreError::Corrupt {
            key: key.file_name.clone(),
            reason: e.to_string(),
        })
    }

    /// Delete a record. Returns false when it was already gone.
    pub async fn remove(&self, key: &StoredKey) -> StoreResult<bool> {
        match fs::remove_file(self.dir.join(key.file_name())).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(key = %key, "record already removed");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn len(&self) -> StoreResult<usize> {
        Ok(self.list().await?.len())
    }

    pub async fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len().await? == 0)
    }
}

async fn write_then_rename(tmp: &Path, target: &Path, body: &[u8]) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;

    let mut file = fs::File::create(tmp).await?;
    file.write_all(body).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(tmp, target).await
}
