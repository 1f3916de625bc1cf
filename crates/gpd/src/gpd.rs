use crate::error::{GpdError, Result};
use crate::types::{
    achievement_flags, Achievement, Entry, Section, Setting, TitlePlayed, DASHBOARD_ID,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const GPD_MAGIC: &[u8; 4] = b"XDBF";
const GPD_VERSION: u16 = 1;
const HEADER_LEN: usize = 8;

/// Counters derived from the achievements of one collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AchievementTotals {
    pub possible: u32,
    pub earned: u32,
    pub gamerscore_total: u32,
    pub gamerscore_earned: u32,
}

/// One persisted profile collection.
///
/// A per-title collection holds that title's achievements plus imagery; the
/// dashboard collection ([`DASHBOARD_ID`]) holds one [`TitlePlayed`] per title
/// and the user settings.
#[derive(Debug, Clone, PartialEq)]
pub struct GpdFile {
    title_id: u32,
    achievements: BTreeMap<u16, Achievement>,
    titles: BTreeMap<u32, TitlePlayed>,
    settings: BTreeMap<u32, Setting>,
    entries: BTreeMap<(Section, u64), Entry>,
}

#[derive(Serialize, Deserialize)]
struct PersistedGpd {
    title_id: u32,
    #[serde(default)]
    achievements: Vec<Achievement>,
    #[serde(default)]
    titles: Vec<TitlePlayed>,
    #[serde(default)]
    settings: Vec<Setting>,
    #[serde(default)]
    entries: Vec<Entry>,
}

impl GpdFile {
    #[must_use]
    pub const fn new(title_id: u32) -> Self {
        Self {
            title_id,
            achievements: BTreeMap::new(),
            titles: BTreeMap::new(),
            settings: BTreeMap::new(),
            entries: BTreeMap::new(),
        }
    }

    #[must_use]
    pub const fn dashboard() -> Self {
        Self::new(DASHBOARD_ID)
    }

    #[must_use]
    pub const fn title_id(&self) -> u32 {
        self.title_id
    }

    #[must_use]
    pub const fn is_dashboard(&self) -> bool {
        self.title_id == DASHBOARD_ID
    }

    // Achievements

    #[must_use]
    pub fn get_achievement(&self, id: u16) -> Option<&Achievement> {
        self.achievements.get(&id)
    }

    #[must_use]
    pub fn has_achievement(&self, id: u16) -> bool {
        self.achievements.contains_key(&id)
    }

    /// All achievements ordered by id
    pub fn achievements(&self) -> impl Iterator<Item = &Achievement> {
        self.achievements.values()
    }

    #[must_use]
    pub fn achievement_count(&self) -> usize {
        self.achievements.len()
    }

    /// Insert or replace an achievement. Returns `true` when the id was new.
    ///
    /// Replacing an unlocked achievement with a locked copy keeps the unlock.
    pub fn update_achievement(&mut self, mut achievement: Achievement) -> bool {
        if let Some(existing) = self.achievements.get(&achievement.id) {
            if existing.is_unlocked() && !achievement.is_unlocked() {
                achievement.flags |= existing.flags & achievement_flags::UNLOCKED_MASK;
                achievement.unlock_time = existing.unlock_time;
            }
        }
        self.achievements
            .insert(achievement.id, achievement)
            .is_none()
    }

    /// Unlock an achievement. `None` when the id is unknown, `Some(false)` when
    /// it was already unlocked.
    pub fn unlock_achievement(&mut self, id: u16, time: u64) -> Option<bool> {
        let achievement = self.achievements.get_mut(&id)?;
        if achievement.is_unlocked() {
            return Some(false);
        }
        achievement.unlock(time);
        Some(true)
    }

    #[must_use]
    pub fn achievement_totals(&self) -> AchievementTotals {
        let mut totals = AchievementTotals::default();
        for ach in self.achievements.values() {
            totals.possible = totals.possible.saturating_add(1);
            totals.gamerscore_total = totals.gamerscore_total.saturating_add(ach.gamerscore);
            if ach.is_unlocked() {
                totals.earned = totals.earned.saturating_add(1);
                totals.gamerscore_earned = totals.gamerscore_earned.saturating_add(ach.gamerscore);
            }
        }
        totals
    }

    // Titles

    #[must_use]
    pub fn get_title(&self, title_id: u32) -> Option<&TitlePlayed> {
        self.titles.get(&title_id)
    }

    pub fn titles(&self) -> impl Iterator<Item = &TitlePlayed> {
        self.titles.values()
    }

    /// Insert or replace a title summary. Returns `true` when the title was new.
    pub fn update_title(&mut self, title: TitlePlayed) -> bool {
        self.titles.insert(title.title_id, title).is_none()
    }

    // Settings

    #[must_use]
    pub fn get_setting(&self, id: u32) -> Option<&Setting> {
        self.settings.get(&id)
    }

    pub fn settings(&self) -> impl Iterator<Item = &Setting> {
        self.settings.values()
    }

    pub fn update_setting(&mut self, setting: Setting) -> bool {
        self.settings.insert(setting.id, setting).is_none()
    }

    // Opaque entries

    #[must_use]
    pub fn get_entry(&self, section: Section, id: u64) -> Option<&Entry> {
        self.entries.get(&(section, id))
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    pub fn update_entry(&mut self, entry: Entry) -> bool {
        self.entries.insert((entry.section, entry.id), entry).is_none()
    }

    // Persistence

    /// Parse a persisted collection.
    pub fn read(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN || &bytes[0..4] != GPD_MAGIC {
            return Err(GpdError::corrupt("missing XDBF header"));
        }
        let version = u16::from_be_bytes([bytes[4], bytes[5]]);
        if version != GPD_VERSION {
            return Err(GpdError::UnsupportedVersion(version));
        }
        let persisted: PersistedGpd = serde_json::from_slice(&bytes[HEADER_LEN..])
            .map_err(|e| GpdError::corrupt(format!("invalid body: {e}")))?;

        let mut gpd = Self::new(persisted.title_id);
        for ach in persisted.achievements {
            if !gpd.update_achievement(ach) {
                return Err(GpdError::corrupt("duplicate achievement id"));
            }
        }
        for title in persisted.titles {
            gpd.update_title(title);
        }
        for setting in persisted.settings {
            gpd.update_setting(setting);
        }
        for entry in persisted.entries {
            gpd.update_entry(entry);
        }
        Ok(gpd)
    }

    /// Two-phase write. With `None` returns the number of bytes required; with a
    /// buffer of at least that size writes the collection and returns the
    /// number of bytes written.
    pub fn write(&self, buffer: Option<&mut [u8]>) -> Result<usize> {
        let encoded = self.encode()?;
        let Some(buffer) = buffer else {
            return Ok(encoded.len());
        };
        if buffer.len() < encoded.len() {
            return Err(GpdError::BufferTooSmall {
                needed: encoded.len(),
                actual: buffer.len(),
            });
        }
        buffer[..encoded.len()].copy_from_slice(&encoded);
        Ok(encoded.len())
    }

    /// Encode into a freshly allocated buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.encode()
    }

    fn encode(&self) -> Result<Vec<u8>> {
        let persisted = PersistedGpd {
            title_id: self.title_id,
            achievements: self.achievements.values().cloned().collect(),
            titles: self.titles.values().cloned().collect(),
            settings: self.settings.values().cloned().collect(),
            entries: self.entries.values().cloned().collect(),
        };
        let body = serde_json::to_vec(&persisted)?;
        let mut out = Vec::with_capacity(HEADER_LEN + body.len());
        out.extend_from_slice(GPD_MAGIC);
        out.extend_from_slice(&GPD_VERSION.to_be_bytes());
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(&body);
        Ok(out)
    }
}
