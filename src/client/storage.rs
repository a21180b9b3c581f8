use std::{
    collections::BTreeMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use super::ClientError;

pub const STORAGE_FILE_NAME: &str = "local_storage.json";

/// String key/value store that survives between sessions.
pub trait LocalStorage {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String) -> Result<(), ClientError>;
    fn remove(&mut self, key: &str) -> Result<(), ClientError>;

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// Keeps every key in one JSON object on disk, rewritten on each change.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileStorage {
    pub fn open_dir(dir: &Path) -> Result<Self, ClientError> {
        std::fs::create_dir_all(dir).map_err(|source| ClientError::Storage {
            path: dir.to_path_buf(),
            source,
        })?;
        Self::open(dir.join(STORAGE_FILE_NAME))
    }

    pub fn open(path: PathBuf) -> Result<Self, ClientError> {
        let values = match std::fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(error) if error.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(ClientError::Storage { path, source }),
        };

        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), ClientError> {
        let payload = serde_json::to_string_pretty(&self.values)?;
        std::fs::write(&self.path, payload).map_err(|source| ClientError::Storage {
            path: self.path.clone(),
            source,
        })
    }
}

impl LocalStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), ClientError> {
        self.values.insert(key.to_string(), value);
        self.persist()
    }

    fn remove(&mut self, key: &str) -> Result<(), ClientError> {
        if self.values.remove(key).is_some() {
            self.persist()?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    values: BTreeMap<String, String>,
}

impl LocalStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), ClientError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), ClientError> {
        self.values.remove(key);
        Ok(())
    }
}
