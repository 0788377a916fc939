//! Authoritative tenant registry.
//!
//! Readers get an immutable snapshot through [`ArcSwap`]; a reload builds a
//! complete new snapshot and swaps it in one step, so a request never sees a
//! half-loaded registry.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use figment::Figment;
use figment::providers::{Format, Yaml};
use serde::{Deserialize, Serialize};
use tenant_host_sdk::{InvalidTenantId, TenantId, TenantRecord};
use thiserror::Error;

use crate::config::RegistryConfig;

const HOST_PLACEHOLDER: &str = "{host}";

/// One declared tenant as written in configuration, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub upstream_base_url: Option<String>,
    #[serde(default)]
    pub health_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistryFile {
    #[serde(default)]
    tenants: Vec<RegistryEntry>,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    InvalidId(#[from] InvalidTenantId),

    #[error("tenant {0} is declared more than once")]
    Duplicate(TenantId),

    #[error("tenant {tenant}: invalid upstream url {url:?}: {reason}")]
    InvalidUrl {
        tenant: TenantId,
        url: String,
        reason: String,
    },

    #[error("registry file {path} not found")]
    MissingFile { path: PathBuf },

    #[error("registry file {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: Box<figment::Error>,
    },
}

/// Where registry entries come from; re-read on every reload.
#[derive(Debug, Clone, Default)]
pub struct RegistrySource {
    pub inline: Vec<RegistryEntry>,
    pub file: Option<PathBuf>,
    pub discovery_host: Option<String>,
}

impl RegistrySource {
    #[must_use]
    pub fn from_config(cfg: &RegistryConfig, discovery_host: Option<String>) -> Self {
        Self {
            inline: cfg.tenants.clone(),
            file: cfg.file.clone(),
            discovery_host,
        }
    }

    /// Inline entries followed by the file's entries.
    ///
    /// # Errors
    /// The configured file is missing or malformed.
    pub fn entries(&self) -> Result<Vec<RegistryEntry>, RegistryError> {
        let mut entries = self.inline.clone();
        if let Some(path) = &self.file {
            if !path.is_file() {
                return Err(RegistryError::MissingFile { path: path.clone() });
            }
            let file: RegistryFile = Figment::new()
                .merge(Yaml::file(path))
                .extract()
                .map_err(|e| RegistryError::File {
                    path: path.clone(),
                    source: Box::new(e),
                })?;
            entries.extend(file.tenants);
        }
        Ok(entries)
    }
}

/// Immutable, id-ordered view of all registered tenants.
#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    tenants: BTreeMap<TenantId, Arc<TenantRecord>>,
}

impl RegistrySnapshot {
    /// Validate `entries` and build a snapshot.
    ///
    /// # Errors
    /// Invalid ids, duplicate ids, or upstream URLs that are not absolute http(s) URLs.
    pub fn build(
        entries: Vec<RegistryEntry>,
        discovery_host: Option<&str>,
    ) -> Result<Self, RegistryError> {
        let mut tenants = BTreeMap::new();
        for entry in entries {
            let id = TenantId::parse(&entry.id)?;
            let upstream_base_url = entry
                .upstream_base_url
                .map(|raw| normalize_upstream(&id, &raw, discovery_host))
                .transpose()?;
            let record = TenantRecord {
                id: id.clone(),
                name: entry.name,
                permissions: entry.permissions.into_iter().collect::<BTreeSet<_>>(),
                upstream_base_url,
                health_path: entry.health_path,
            };
            if tenants.insert(id.clone(), Arc::new(record)).is_some() {
                return Err(RegistryError::Duplicate(id));
            }
        }
        Ok(Self { tenants })
    }

    #[must_use]
    pub fn get(&self, id: &TenantId) -> Option<Arc<TenantRecord>> {
        self.tenants.get(id).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }
}

fn normalize_upstream(
    tenant: &TenantId,
    raw: &str,
    discovery_host: Option<&str>,
) -> Result<String, RegistryError> {
    let substituted = match discovery_host {
        Some(host) => raw.replace(HOST_PLACEHOLDER, host),
        None => raw.to_owned(),
    };
    let invalid = |reason: String| RegistryError::InvalidUrl {
        tenant: tenant.clone(),
        url: substituted.clone(),
        reason,
    };

    let url = url::Url::parse(&substituted).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {}", url.scheme())));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_owned()));
    }
    Ok(substituted)
}

/// Tenant registry with lock-free reads and atomic reloads.
pub struct Registry {
    snapshot: ArcSwap<RegistrySnapshot>,
    source: RegistrySource,
}

impl Registry {
    /// Load the initial snapshot from `source`.
    ///
    /// # Errors
    /// Any [`RegistryError`] from reading or validating the entries.
    pub fn load(source: RegistrySource) -> Result<Self, RegistryError> {
        let snapshot =
            RegistrySnapshot::build(source.entries()?, source.discovery_host.as_deref())?;
        tracing::info!(tenants = snapshot.len(), "tenant registry loaded");
        Ok(Self {
            snapshot: ArcSwap::from_pointee(snapshot),
            source,
        })
    }

    /// Registry over a fixed set of entries with no backing file.
    ///
    /// # Errors
    /// Any validation error in `entries`.
    pub fn from_entries(entries: Vec<RegistryEntry>) -> Result<Self, RegistryError> {
        Self::load(RegistrySource {
            inline: entries,
            ..RegistrySource::default()
        })
    }

    #[must_use]
    pub fn resolve(&self, id: &TenantId) -> Option<Arc<TenantRecord>> {
        self.snapshot.load().get(id)
    }

    /// All records ordered by id.
    #[must_use]
    pub fn list(&self) -> Vec<Arc<TenantRecord>> {
        self.snapshot.load().tenants.values().cloned().collect()
    }

    /// Re-read the source and swap in the new snapshot.
    ///
    /// On failure the current snapshot stays in place.
    ///
    /// # Errors
    /// Any [`RegistryError`] from reading or validating the entries.
    pub fn reload(&self) -> Result<usize, RegistryError> {
        let entries = self.source.entries()?;
        self.replace(entries)
    }

    /// Swap in a snapshot built from `entries`.
    ///
    /// # Errors
    /// Any validation error in `entries`; the current snapshot is kept.
    pub fn replace(&self, entries: Vec<RegistryEntry>) -> Result<usize, RegistryError> {
        let snapshot = RegistrySnapshot::build(entries, self.source.discovery_host.as_deref())
            .inspect_err(|e| tracing::warn!(error = %e, "registry reload rejected"))?;
        let count = snapshot.len();
        self.snapshot.store(Arc::new(snapshot));
        tracing::info!(tenants = count, "tenant registry reloaded");
        Ok(count)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn entry(id: &str, upstream: Option<&str>) -> RegistryEntry {
        RegistryEntry {
            id: id.to_owned(),
            name: id.to_uppercase(),
            permissions: vec!["files".to_owned(), "files".to_owned(), "sql".to_owned()],
            upstream_base_url: upstream.map(str::to_owned),
            health_path: None,
        }
    }

    #[test]
    fn resolves_registered_tenants_only() {
        let registry =
            Registry::from_entries(vec![entry("notes", None), entry("weather", Some("https://x"))])
                .unwrap();

        let notes = registry.resolve(&TenantId::parse("notes").unwrap()).unwrap();
        assert!(!notes.is_external());
        assert_eq!(notes.permissions.len(), 2);

        let weather = registry.resolve(&TenantId::parse("weather").unwrap()).unwrap();
        assert!(weather.is_external());

        assert!(registry.resolve(&TenantId::parse("ghost").unwrap()).is_none());
    }

    #[test]
    fn list_is_ordered_by_id() {
        let registry =
            Registry::from_entries(vec![entry("zeta", None), entry("alpha", None)]).unwrap();
        let ids: Vec<_> = registry.list().iter().map(|r| r.id.to_string()).collect();
        assert_eq!(ids, ["alpha", "zeta"]);
    }

    #[test]
    fn invalid_entries_are_rejected() {
        assert!(matches!(
            Registry::from_entries(vec![entry("Bad_Id", None)]),
            Err(RegistryError::InvalidId(_))
        ));
        assert!(matches!(
            Registry::from_entries(vec![entry("notes", None), entry("notes", None)]),
            Err(RegistryError::Duplicate(_))
        ));
        assert!(matches!(
            Registry::from_entries(vec![entry("notes", Some("ftp://x"))]),
            Err(RegistryError::InvalidUrl { .. })
        ));
        assert!(matches!(
            Registry::from_entries(vec![entry("notes", Some("not a url"))]),
            Err(RegistryError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn host_placeholder_uses_discovery_host() {
        let registry = Registry::load(RegistrySource {
            inline: vec![entry("weather", Some("http://{host}:9001"))],
            file: None,
            discovery_host: Some("10.0.0.7".to_owned()),
        })
        .unwrap();
        let weather = registry.resolve(&TenantId::parse("weather").unwrap()).unwrap();
        assert_eq!(weather.upstream_base_url.as_deref(), Some("http://10.0.0.7:9001"));
    }

    #[test]
    fn failed_reload_keeps_previous_snapshot() {
        let registry = Registry::from_entries(vec![entry("notes", None)]).unwrap();
        assert!(registry.replace(vec![entry("9bad", None)]).is_err());
        assert!(registry.resolve(&TenantId::parse("notes").unwrap()).is_some());

        assert_eq!(registry.replace(vec![entry("moods", None)]).unwrap(), 1);
        assert!(registry.resolve(&TenantId::parse("notes").unwrap()).is_none());
    }

    #[test]
    fn reload_rereads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.yaml");
        std::fs::write(&path, "tenants:\n  - id: notes\n    name: Notes\n").unwrap();

        let registry = Registry::load(RegistrySource {
            inline: vec![entry("weather", Some("https://x"))],
            file: Some(path.clone()),
            discovery_host: None,
        })
        .unwrap();
        assert_eq!(registry.list().len(), 2);

        std::fs::write(
            &path,
            "tenants:\n  - id: notes\n    name: Notes\n  - id: moods\n    name: Moods\n    health_path: /h\n",
        )
        .unwrap();
        assert_eq!(registry.reload().unwrap(), 3);
        let moods = registry.resolve(&TenantId::parse("moods").unwrap()).unwrap();
        assert_eq!(moods.health_path.as_deref(), Some("/h"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let res = Registry::load(RegistrySource {
            file: Some(PathBuf::from("/definitely/not/here.yaml")),
            ..RegistrySource::default()
        });
        assert!(matches!(res, Err(RegistryError::MissingFile { .. })));
    }
}
