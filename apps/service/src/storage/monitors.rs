use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use super::{DOMAIN_FILE, WEBHOOK_FILE, is_valid_domain_key, read_json, write_json_atomic};
use crate::error::StorageError;
use crate::models::MonitorConfig;
use crate::models::monitor::{DomainRecord, WebhookRecord};

/// Monitor configurations, one directory per domain key
#[derive(Debug, Clone)]
pub struct MonitorStore {
    root: PathBuf,
}

impl MonitorStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn monitor_dir(&self, domain: &str) -> Result<PathBuf, StorageError> {
        if !is_valid_domain_key(domain) {
            return Err(StorageError::MissingMonitor(domain.to_string()));
        }
        Ok(self.root.join(domain))
    }

    pub fn exists(&self, domain: &str) -> bool {
        self.monitor_dir(domain).map(|dir| dir.join(DOMAIN_FILE).is_file()).unwrap_or(false)
    }

    /// Materialize the configuration records of a new monitor
    pub fn create(&self, config: &MonitorConfig) -> Result<PathBuf, StorageError> {
        let dir = self.monitor_dir(config.domain())?;
        if self.exists(config.domain()) {
            return Err(StorageError::AlreadyExists(config.domain().to_string()));
        }

        fs::create_dir_all(&dir).map_err(|err| StorageError::io(&dir, err))?;
        write_json_atomic(&dir.join(DOMAIN_FILE), &config.domain_record())?;
        write_json_atomic(&dir.join(WEBHOOK_FILE), &config.webhook_record())?;

        Ok(dir)
    }

    pub fn load(&self, domain: &str) -> Result<MonitorConfig, StorageError> {
        let dir = self.monitor_dir(domain)?;
        let missing = || StorageError::MissingMonitor(domain.to_string());

        let record: DomainRecord = read_json(&dir.join(DOMAIN_FILE))?.ok_or_else(missing)?;
        let webhook: WebhookRecord = read_json(&dir.join(WEBHOOK_FILE))?.ok_or_else(missing)?;

        Ok(MonitorConfig::from_records(domain, record, webhook))
    }

    /// Domain keys of every configured monitor, sorted
    pub fn list(&self) -> Result<Vec<String>, StorageError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StorageError::io(&self.root, err)),
        };

        let mut domains = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| StorageError::io(&self.root, err))?;
            if !entry.path().join(DOMAIN_FILE).is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                domains.push(name.to_string());
            }
        }

        domains.sort();
        Ok(domains)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config(url: &str) -> MonitorConfig {
        MonitorConfig::new(url, "https://hooks.example.net/abc").unwrap()
    }

    #[test]
    fn test_create_and_load() {
        let dir = tempdir().unwrap();
        let store = MonitorStore::new(dir.path().join("monitors"));

        let monitor_dir = store.create(&config("https://example.com")).unwrap();

        assert!(monitor_dir.join(DOMAIN_FILE).is_file());
        assert!(monitor_dir.join(WEBHOOK_FILE).is_file());
        let loaded = store.load("example.com").unwrap();
        assert_eq!(loaded, config("https://example.com"));
    }

    #[test]
    fn test_persisted_layout() {
        let dir = tempdir().unwrap();
        let store = MonitorStore::new(dir.path());
        store.create(&config("https://example.com")).unwrap();

        let domain: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("example.com").join(DOMAIN_FILE)).unwrap())
                .unwrap();
        let webhook: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("example.com").join(WEBHOOK_FILE)).unwrap())
                .unwrap();

        assert_eq!(domain["domain"], "https://example.com/");
        assert_eq!(webhook["webhook_url"], "https://hooks.example.net/abc");
    }

    #[test]
    fn test_duplicate_create_fails() {
        let dir = tempdir().unwrap();
        let store = MonitorStore::new(dir.path());

        store.create(&config("https://example.com")).unwrap();
        let err = store.create(&config("http://EXAMPLE.com/other")).unwrap_err();

        assert!(matches!(err, StorageError::AlreadyExists(domain) if domain == "example.com"));
    }

    #[test]
    fn test_list_is_sorted_and_skips_stray_dirs() {
        let dir = tempdir().unwrap();
        let store = MonitorStore::new(dir.path());

        store.create(&config("https://zeta.example")).unwrap();
        store.create(&config("https://alpha.example")).unwrap();
        fs::create_dir_all(dir.path().join("not-a-monitor")).unwrap();

        assert_eq!(store.list().unwrap(), vec!["alpha.example", "zeta.example"]);
    }

    #[test]
    fn test_list_without_root_is_empty() {
        let dir = tempdir().unwrap();
        let store = MonitorStore::new(dir.path().join("missing"));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_load_missing_and_invalid() {
        let dir = tempdir().unwrap();
        let store = MonitorStore::new(dir.path());

        assert!(matches!(store.load("example.com"), Err(StorageError::MissingMonitor(_))));
        assert!(matches!(store.load("../etc"), Err(StorageError::MissingMonitor(_))));
    }
}
