//! Entities module - resource identifiers, entries, catalog and the
//! loader/handle seams the cache core is written against.

pub mod catalog;
pub mod entry;
pub mod error;
pub mod key;
pub mod loader;
pub mod traits;

pub use catalog::CatalogIndex;
pub use entry::{EntryStatus, Priority, ResourceEntry};
pub use error::{CacheError, LoadError};
pub use key::ResourceKey;
pub use loader::{FileHandle, FileLoader};
pub use traits::{MediaHandle, ReadyState, ResourceLoader, TimeRange};
