pub mod clock;
pub mod error;
pub mod guardrail;
pub mod lock;
pub mod ports;
pub mod registry;
pub mod repo;
pub mod router;
pub mod scoped_path;
pub mod selftest;
pub mod service;
pub mod settings;
