//! Pipeline entry points for harvest operations.
//!
//! - `run_sync` / `sync_range`: drive one incremental sync cycle
//! - `select`: pure read-side filtering over stored records
//! - `harvest_papers` / `select_papers`: sync plus normalized output

pub mod select;
pub mod sync;

pub use select::select;
pub use sync::{SyncReport, harvest_papers, run_sync, select_papers, sync_range};
