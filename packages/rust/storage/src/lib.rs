//! Workspace storage for SuperAnalyze.
//!
//! A [`Workspace`] owns one directory tree:
//!
//! ```text
//! <root>/workspace/
//!   sources/  docs/  exports/   persisted items
//!   .index/items.db             libSQL item index and action cache
//!   .lock                       held while the handle is alive
//! ```
//!
//! Store operations (`persist`, `record`, `write_final`, `load`, `resolve`)
//! are methods on the open handle, so there is no ambient "current" workspace.

mod index;
mod lock;
mod migrations;
pub mod paths;
mod store;
mod workspace;

pub use index::{CachedOutput, ItemIndex, ItemRecord};
pub use paths::{body_hash, identity, slugify};
pub use workspace::{INDEX_DB, WORKSPACE_DIR, Workspace};
