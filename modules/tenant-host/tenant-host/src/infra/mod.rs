pub mod audit;
pub mod lock_repo;
pub mod settings_repo;
pub mod store;
pub mod upstream;
