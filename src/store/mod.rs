//! Document store seam.
//!
//! Each entity module implements its store trait for [`mongodb::Database`]; [`MemoryStore`]
//! implements all of them in-process.

use mongodb::Database;

pub use crate::data::class::db::ClassStore;
pub use crate::data::settings::db::SettingsStore;
pub use crate::data::user::db::UserStore;
use crate::error::StoreError;

pub mod memory;

pub use memory::MemoryStore;

/// Everything the client needs from the document database.
pub trait DocumentStore: UserStore + ClassStore + SettingsStore {}

impl<T: UserStore + ClassStore + SettingsStore> DocumentStore for T {}

pub async fn ensure_indexes(db: &Database) -> Result<(), StoreError> {
    crate::data::class::db::ensure_indexes(db).await
}
