use serde::{Deserialize, Serialize};

/// Title id of the aggregate (dashboard) collection.
pub const DASHBOARD_ID: u32 = 0xFFFE_07D1;

/// Entry id under which a collection stores the title image and title name.
pub const TITLE_ENTRY_ID: u64 = 0x8000;

/// Achievement flag bits
pub mod achievement_flags {
    pub const TYPE_MASK: u32 = 0x0000_0007;
    pub const SHOW_UNACHIEVED: u32 = 0x0000_0008;
    pub const ACHIEVED_ONLINE: u32 = 0x0001_0000;
    pub const ACHIEVED: u32 = 0x0002_0000;
    pub const UNLOCKED_MASK: u32 = ACHIEVED | ACHIEVED_ONLINE;
}

/// One achievement as declared by a title and persisted per title
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Achievement {
    /// Unique within its title
    pub id: u16,

    pub label: String,

    pub description: String,

    /// Shown instead of `description` while locked
    #[serde(default)]
    pub unachieved_description: String,

    /// Image entry id; 0 when the achievement has no image
    #[serde(default)]
    pub image_id: u32,

    pub gamerscore: u32,

    #[serde(default)]
    pub flags: u32,

    /// Unix milliseconds; 0 while locked
    #[serde(default)]
    pub unlock_time: u64,
}

impl Achievement {
    #[must_use]
    pub fn new(id: u16, label: impl Into<String>, gamerscore: u32) -> Self {
        Self {
            id,
            label: label.into(),
            gamerscore,
            ..Default::default()
        }
    }

    #[must_use]
    pub const fn is_unlocked(&self) -> bool {
        self.flags & achievement_flags::UNLOCKED_MASK != 0
    }

    /// Mark as unlocked. An already unlocked achievement keeps its original time.
    pub fn unlock(&mut self, time: u64) {
        if self.is_unlocked() {
            return;
        }
        self.flags |= achievement_flags::ACHIEVED;
        self.unlock_time = time;
    }

    #[must_use]
    pub const fn image_ref(&self) -> Option<u64> {
        if self.image_id == 0 {
            None
        } else {
            Some(self.image_id as u64)
        }
    }
}

/// Per-title summary held in the dashboard collection
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TitlePlayed {
    pub title_id: u32,
    pub title_name: String,
    pub achievements_possible: u32,
    pub achievements_earned: u32,
    pub gamerscore_total: u32,
    pub gamerscore_earned: u32,
    /// Unix milliseconds
    pub last_played: u64,
}

impl TitlePlayed {
    #[must_use]
    pub fn new(title_id: u32, title_name: impl Into<String>) -> Self {
        Self {
            title_id,
            title_name: title_name.into(),
            ..Default::default()
        }
    }
}

/// Data type of a user setting, encoded in bits 28..32 of the setting id
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Context,
    Int32,
    Int64,
    Double,
    Unicode,
    Float,
    Binary,
    DateTime,
    Null,
}

impl DataType {
    #[must_use]
    pub const fn from_setting_id(id: u32) -> Self {
        match (id >> 28) & 0xF {
            0 => Self::Context,
            1 => Self::Int32,
            2 => Self::Int64,
            3 => Self::Double,
            4 => Self::Unicode,
            5 => Self::Float,
            6 => Self::Binary,
            7 => Self::DateTime,
            _ => Self::Null,
        }
    }
}

/// Declared byte width of a setting, encoded in bits 16..28 of its id.
#[must_use]
pub const fn setting_size(id: u32) -> usize {
    ((id >> 16) & 0xFFF) as usize
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SettingValue {
    Context(u32),
    Int32(i32),
    Int64(i64),
    Double(f64),
    Unicode(String),
    Float(f32),
    Binary(Vec<u8>),
    DateTime(u64),
    Null,
}

impl SettingValue {
    #[must_use]
    pub const fn data_type(&self) -> DataType {
        match self {
            Self::Context(_) => DataType::Context,
            Self::Int32(_) => DataType::Int32,
            Self::Int64(_) => DataType::Int64,
            Self::Double(_) => DataType::Double,
            Self::Unicode(_) => DataType::Unicode,
            Self::Float(_) => DataType::Float,
            Self::Binary(_) => DataType::Binary,
            Self::DateTime(_) => DataType::DateTime,
            Self::Null => DataType::Null,
        }
    }
}

/// Opaque named user setting stored in the dashboard collection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Setting {
    pub id: u32,
    pub value: SettingValue,
}

impl Setting {
    #[must_use]
    pub const fn new(id: u32, value: SettingValue) -> Self {
        Self { id, value }
    }

    #[must_use]
    pub const fn declared_size(&self) -> usize {
        setting_size(self.id)
    }
}

/// Record section an opaque entry belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Metadata,
    Achievement,
    Image,
    Setting,
    Title,
    String,
    AvatarAward,
}

/// Opaque data blob (image, localized string) stored alongside typed records
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entry {
    pub section: Section,
    pub id: u64,
    pub data: Vec<u8>,
}

impl Entry {
    #[must_use]
    pub const fn new(section: Section, id: u64, data: Vec<u8>) -> Self {
        Self { section, id, data }
    }

    /// String entry holding UTF-16BE text with a terminating NUL.
    #[must_use]
    pub fn utf16_string(id: u64, text: &str) -> Self {
        let mut data = Vec::with_capacity((text.len() + 1) * 2);
        for unit in text.encode_utf16().chain(std::iter::once(0)) {
            data.extend_from_slice(&unit.to_be_bytes());
        }
        Self::new(Section::String, id, data)
    }

    /// Decode a UTF-16BE string entry up to its terminating NUL.
    #[must_use]
    pub fn as_utf16_string(&self) -> Option<String> {
        if self.section != Section::String || self.data.len() % 2 != 0 {
            return None;
        }
        let units: Vec<u16> = self
            .data
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .take_while(|unit| *unit != 0)
            .collect();
        String::from_utf16(&units).ok()
    }
}
