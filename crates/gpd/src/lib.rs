//! # XProfile GPD
//!
//! Typed access to the record collections that make up a console user profile.
//!
//! - [`GpdFile`]: one persisted collection. Each title the user played has its own
//!   (achievements, imagery), and the dashboard collection aggregates one
//!   [`TitlePlayed`] summary per title plus the user's settings.
//! - [`TitleCatalogue`]: the achievement catalogue a title declares about itself,
//!   merged into the profile when the title is activated.
//!
//! Collections persist through a two-phase [`GpdFile::write`]: call it without a
//! buffer to learn the size, then again with a buffer of that size.

mod catalogue;
mod error;
mod gpd;
mod types;

pub use catalogue::{TitleCatalogue, DEFAULT_LOCALE};
pub use error::{GpdError, Result};
pub use gpd::{AchievementTotals, GpdFile};
pub use types::{
    achievement_flags, setting_size, Achievement, DataType, Entry, Section, Setting,
    SettingValue, TitlePlayed, DASHBOARD_ID, TITLE_ENTRY_ID,
};
