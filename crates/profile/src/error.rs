use crate::store::TitleRef;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProfileError>;

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Not found: {0}")]
    NotFound(TitleRef),

    #[error("Title id {0:X} is reserved for the dashboard")]
    ReservedTitle(u32),

    #[error("Unknown achievement {achievement_id} for title {title_id:X}")]
    UnknownAchievement { title_id: u32, achievement_id: u16 },

    #[error("Account error: {0}")]
    Account(#[from] xprofile_account::AccountError),

    #[error("Collection error: {0}")]
    Gpd(#[from] xprofile_gpd::GpdError),

    #[error("Failed to write {name}: {source}")]
    WriteFailed {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ProfileError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
