#![no_main]

use libfuzzer_sys::fuzz_target;
use tenant_host::domain::guardrail::assert_allowed;

fuzz_target!(|data: &[u8]| {
    if let Ok(statement) = std::str::from_utf8(data)
        && assert_allowed(statement).is_ok()
    {
        assert!(!statement.contains(';'));
        assert!(!statement.trim().is_empty());
    }
});
