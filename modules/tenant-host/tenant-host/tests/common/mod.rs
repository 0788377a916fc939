#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

//! Shared fixtures for tenant-host integration tests

use std::path::Path;

use tenant_host::domain::registry::RegistryEntry;
use tenant_host::{TenantHostConfig, TenantHostModule, TenantId};

pub fn local(id: &str) -> RegistryEntry {
    RegistryEntry {
        id: id.to_owned(),
        name: id.to_owned(),
        permissions: Vec::new(),
        upstream_base_url: None,
        health_path: None,
    }
}

pub fn external(id: &str, base_url: &str, health_path: &str) -> RegistryEntry {
    RegistryEntry {
        upstream_base_url: Some(base_url.to_owned()),
        health_path: Some(health_path.to_owned()),
        ..local(id)
    }
}

pub fn config(entries: Vec<RegistryEntry>) -> TenantHostConfig {
    let mut cfg = TenantHostConfig::default();
    cfg.registry.tenants = entries;
    cfg
}

pub fn start(root: &Path, entries: Vec<RegistryEntry>) -> TenantHostModule {
    TenantHostModule::init(&config(entries), root.to_path_buf()).expect("module init")
}

pub fn tid(raw: &str) -> TenantId {
    TenantId::parse(raw).unwrap()
}

/// Every path below `root`, relative and sorted. Audit logs are skipped since
/// the drain appends to them in the background.
pub fn snapshot(root: &Path) -> Vec<String> {
    fn walk(dir: &Path, root: &Path, out: &mut Vec<String>) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.file_name().is_some_and(|n| n == "audit.jsonl") {
                continue;
            }
            out.push(path.strip_prefix(root).unwrap().display().to_string());
            if path.is_dir() {
                walk(&path, root, out);
            }
        }
    }
    let mut out = Vec::new();
    walk(root, root, &mut out);
    out.sort();
    out
}
