#![no_main]

use std::path::{Component, Path};

use libfuzzer_sys::fuzz_target;
use tenant_host::domain::scoped_path::ScopedPath;
use tenant_host_sdk::TenantId;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(tenant) = TenantId::parse("fuzz") else {
        return;
    };
    let root = Path::new("/srv/tenants/fuzz/files");

    if let Ok(scoped) = ScopedPath::resolve(&tenant, root, raw) {
        let absolute = scoped.absolute();
        assert!(absolute.starts_with(root));
        assert!(
            scoped
                .relative()
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        );
    }
});
