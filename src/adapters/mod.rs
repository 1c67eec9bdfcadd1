// Adapters layer: concrete implementations of the domain ports (file storage, site stores).

pub mod site;
pub mod storage;

pub use site::{JsonSiteStore, MemorySiteStore};
pub use storage::LocalStorage;
