use tracing::warn;

use super::{ClientError, storage::LocalStorage};

pub const HISTORY_KEY: &str = "fb_history";
pub const HISTORY_LIMIT: usize = 5;

/// Recent URLs, most recent first. An unreadable value counts as empty.
pub fn load_history(storage: &dyn LocalStorage) -> Vec<String> {
    let Some(raw) = storage.get(HISTORY_KEY) else {
        return Vec::new();
    };

    match serde_json::from_str::<Vec<String>>(&raw) {
        Ok(entries) => entries,
        Err(error) => {
            warn!("Ignoring unreadable history: {error}");
            Vec::new()
        }
    }
}

/// Prepends `url` unless it is already listed. Returns whether the stored
/// list changed.
pub fn save_to_history(storage: &mut dyn LocalStorage, url: &str) -> Result<bool, ClientError> {
    let mut history = load_history(storage);
    if history.iter().any(|entry| entry == url) {
        return Ok(false);
    }

    history.insert(0, url.to_string());
    history.truncate(HISTORY_LIMIT);
    storage.set(HISTORY_KEY, serde_json::to_string(&history)?)?;
    Ok(true)
}

pub fn clear_history(storage: &mut dyn LocalStorage) -> Result<(), ClientError> {
    storage.remove(HISTORY_KEY)
}
