//! # XProfile Core
//!
//! A console user profile: the sealed account credential, the dashboard
//! collection summarizing every title played, and one achievement collection
//! per title.
//!
//! ## Features
//!
//! - **Tolerant loading**: an unusable account falls back to a placeholder and
//!   unreadable title collections are skipped and reported
//! - **Achievement reconciliation** when a title declares its catalogue
//! - **Monotonic progress**: earned counters never go down
//! - **Eager persistence** through a pluggable [`ProfileStorage`]
//!
//! ## Architecture
//!
//! ```text
//! ProfileConfig ──> FsStorage ──> ProfileStore::load
//!                                     │
//!                                     ├──> Account      (xprofile-account)
//!                                     ├──> FFFE07D1.gpd (dashboard)
//!                                     └──> <title>.gpd  (one per title)
//!
//! TitleCatalogue ──> activate_title ──> reconcile ──> persist
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use xprofile_core::{ProfileConfig, ProfileStore, TitleRef};
//! use xprofile_gpd::{Achievement, TitleCatalogue};
//!
//! # fn main() -> xprofile_core::Result<()> {
//! let config = ProfileConfig::for_directory("Content/Profile");
//! let (mut store, report) = ProfileStore::open(&config)?;
//! println!("skipped {} titles", report.skipped.len());
//!
//! let catalogue = TitleCatalogue::new(0x4156_07E6, "Sample")
//!     .with_achievements(vec![Achievement::new(1, "First Steps", 10)]);
//! store.activate_title(&catalogue)?;
//! store.unlock_achievement(TitleRef::Current, 1)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod reconciler;
pub mod storage;
pub mod store;

pub use config::{KeyConfig, ProfileConfig};
pub use error::{ProfileError, Result};
pub use reconciler::{reconcile, recount, Reconciliation, WritePolicy};
pub use storage::{
    collection_file_name, dashboard_file_name, FsStorage, MemoryStorage, ProfileStorage,
};
pub use store::{
    AccountLoad, DashboardLoad, LoadReport, PersistReport, ProfileStore, SkipReason,
    SkippedTitle, TitleRef, PLACEHOLDER_GAMERTAG, PLACEHOLDER_XUID,
};
