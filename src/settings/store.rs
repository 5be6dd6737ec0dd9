use crate::settings::SettingsBlob;
use crate::template::registry::{LoadRejection, TemplateRegistry};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("settings storage unavailable at {}: {source}", path.display())]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("settings at {} are unreadable: {message}", path.display())]
    Corrupt { path: PathBuf, message: String },
}

pub trait TemplateStore {
    fn describe(&self) -> String;

    fn load(&self) -> Result<SettingsBlob, StoreError>;

    fn save(&self, blob: &SettingsBlob) -> Result<(), StoreError>;
}

pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unavailable(&self, source: io::Error) -> StoreError {
        StoreError::StorageUnavailable {
            path: self.path.clone(),
            source,
        }
    }
}

impl TemplateStore for JsonFileStore {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<SettingsBlob, StoreError> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(SettingsBlob::default()),
            Err(err) => return Err(self.unavailable(err)),
        };
        serde_json::from_slice(&data).map_err(|err| StoreError::Corrupt {
            path: self.path.clone(),
            message: err.to_string(),
        })
    }

    fn save(&self, blob: &SettingsBlob) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| self.unavailable(err))?;
        }
        let bytes = serde_json::to_vec_pretty(blob).map_err(|err| StoreError::Corrupt {
            path: self.path.clone(),
            message: err.to_string(),
        })?;

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, bytes).map_err(|err| self.unavailable(err))?;
        match fs::rename(&tmp_path, &self.path) {
            Ok(()) => Ok(()),
            Err(rename_err) => {
                if self.path.exists() {
                    fs::remove_file(&self.path).map_err(|err| self.unavailable(err))?;
                    fs::rename(&tmp_path, &self.path).map_err(|err| self.unavailable(err))
                } else {
                    Err(self.unavailable(rename_err))
                }
            }
        }
    }
}

/// Writes are requested with [`PersistenceAdapter::request_save`], which hands
/// out a ticket. Only the newest ticket is honoured by
/// [`PersistenceAdapter::flush`], so a burst of edits costs one write.
pub struct PersistenceAdapter {
    store: Box<dyn TemplateStore>,
    requested: u64,
    saved: u64,
}

impl PersistenceAdapter {
    pub fn new(store: Box<dyn TemplateStore>) -> Self {
        Self {
            store,
            requested: 0,
            saved: 0,
        }
    }

    pub fn load_into(&mut self, registry: &mut TemplateRegistry) -> Vec<LoadRejection> {
        let blob = match self.store.load() {
            Ok(blob) => blob,
            Err(err) => {
                warn!(%err, "continuing without stored templates");
                return Vec::new();
            }
        };

        let count = blob.custom_templates.len();
        let rejections = registry.load_user(blob.custom_templates);
        for rejection in &rejections {
            warn!(
                template = %rejection.identifier,
                error = %rejection.error,
                "stored template ignored"
            );
        }
        info!(
            loaded = count - rejections.len(),
            store = %self.store.describe(),
            "loaded user templates"
        );
        rejections
    }

    pub fn request_save(&mut self) -> u64 {
        self.requested += 1;
        self.requested
    }

    pub fn is_dirty(&self) -> bool {
        self.saved < self.requested
    }

    pub fn flush(&mut self, ticket: u64, registry: &TemplateRegistry) -> bool {
        if ticket != self.requested || !self.is_dirty() {
            debug!(ticket, newest = self.requested, "skipping superseded save");
            return false;
        }

        let blob = SettingsBlob {
            custom_templates: registry.user_definitions(),
        };
        match self.store.save(&blob) {
            Ok(()) => {
                self.saved = ticket;
                debug!(templates = blob.custom_templates.len(), "saved user templates");
                true
            }
            Err(err) => {
                warn!(%err, "user templates kept in memory only");
                false
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::memory::MemoryStore;
    use super::*;
    use crate::template::TemplateDefinition;

    #[test]
    fn missing_file_loads_as_empty_settings() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = JsonFileStore::new(dir.path().join("settings.json"));
        assert_eq!(store.load().expect("load"), SettingsBlob::default());
    }

    #[test]
    fn file_store_round_trips_the_blob_layout() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("settings.json");
        let store = JsonFileStore::new(&path);

        let mut blob = SettingsBlob::default();
        blob.custom_templates.insert(
            "Mood".to_string(),
            TemplateDefinition::new("<i>field-ref(mood)</i>").with_style_rules("i { }"),
        );
        store.save(&blob).expect("save");

        let raw = fs::read_to_string(&path).expect("settings written");
        let value: serde_json::Value = serde_json::from_str(&raw).expect("valid json");
        assert_eq!(
            value["customTemplates"]["Mood"]["markupPattern"],
            "<i>field-ref(mood)</i>"
        );
        assert_eq!(value["customTemplates"]["Mood"]["styleRules"], "i { }");
        assert_eq!(store.load().expect("reload"), blob);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").expect("write fixture");

        let error = JsonFileStore::new(&path).load().expect_err("corrupt settings");
        assert!(matches!(error, StoreError::Corrupt { .. }));
    }

    #[test]
    fn only_the_newest_ticket_writes() {
        let store = MemoryStore::default();
        let saves = store.saves.clone();
        let mut adapter = PersistenceAdapter::new(Box::new(store));
        let mut registry = TemplateRegistry::new();
        registry
            .register("Mood", TemplateDefinition::new("x"))
            .expect("register");

        let first = adapter.request_save();
        let second = adapter.request_save();
        assert!(!adapter.flush(first, &registry));
        assert!(adapter.flush(second, &registry));
        assert!(!adapter.flush(second, &registry));
        assert_eq!(saves.get(), 1);
        assert!(!adapter.is_dirty());
    }

    #[test]
    fn unavailable_storage_is_not_fatal() {
        let store = MemoryStore {
            unavailable: true,
            ..MemoryStore::default()
        };
        let mut adapter = PersistenceAdapter::new(Box::new(store));
        let mut registry = TemplateRegistry::new();

        assert!(adapter.load_into(&mut registry).is_empty());
        registry
            .register("Mood", TemplateDefinition::new("x"))
            .expect("register");
        let ticket = adapter.request_save();
        assert!(!adapter.flush(ticket, &registry));
        assert!(adapter.is_dirty());
        assert!(registry.resolve("Mood").is_ok());
    }

    #[test]
    fn load_into_merges_stored_templates() {
        let store = MemoryStore::default();
        store.blob.borrow_mut().custom_templates.insert(
            "Mood".to_string(),
            TemplateDefinition::new("<i>field-ref(mood)</i>"),
        );
        let mut adapter = PersistenceAdapter::new(Box::new(store));
        let mut registry = TemplateRegistry::new();

        assert!(adapter.load_into(&mut registry).is_empty());
        assert_eq!(registry.count(), 2);
    }
}
