mod handle;
mod manager;
mod rows;
mod schema;

pub use handle::TenantStore;
pub use manager::{PoolSettings, StoreLayout, TenantStoreManager};
