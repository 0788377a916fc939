#![no_main]

use libfuzzer_sys::fuzz_target;
use tenant_host_sdk::TenantId;

fuzz_target!(|data: &[u8]| {
    if let Ok(raw) = std::str::from_utf8(data)
        && let Ok(id) = TenantId::parse(raw)
    {
        // Accepted ids are returned unchanged and are single path components.
        assert_eq!(id.as_str(), raw);
        assert!(!raw.is_empty() && raw.len() <= 64);
        assert!(raw.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-'));
    }
});
