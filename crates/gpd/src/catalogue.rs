use crate::error::{GpdError, Result};
use crate::types::{Achievement, Entry, Section, TITLE_ENTRY_ID};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_LOCALE: &str = "en-US";

fn default_locale() -> String {
    DEFAULT_LOCALE.to_string()
}

/// Achievement catalogue a title declares about itself.
///
/// Achievements are kept per locale in declared order. Images are keyed by
/// image id; the title image uses [`TITLE_ENTRY_ID`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TitleCatalogue {
    pub title_id: u32,

    pub title_name: String,

    #[serde(default = "default_locale")]
    pub default_locale: String,

    #[serde(default)]
    pub achievements: BTreeMap<String, Vec<Achievement>>,

    #[serde(default)]
    pub images: BTreeMap<u64, Vec<u8>>,
}

impl TitleCatalogue {
    #[must_use]
    pub fn new(title_id: u32, title_name: impl Into<String>) -> Self {
        Self {
            title_id,
            title_name: title_name.into(),
            default_locale: default_locale(),
            achievements: BTreeMap::new(),
            images: BTreeMap::new(),
        }
    }

    /// Builder: declare the achievements of the default locale
    #[must_use]
    pub fn with_achievements(mut self, achievements: Vec<Achievement>) -> Self {
        self.achievements
            .insert(self.default_locale.clone(), achievements);
        self
    }

    /// Builder: attach an image blob
    #[must_use]
    pub fn with_image(mut self, id: u64, data: Vec<u8>) -> Self {
        self.images.insert(id, data);
        self
    }

    /// Achievements for a locale, in declared order
    #[must_use]
    pub fn achievements(&self, locale: &str) -> &[Achievement] {
        self.achievements
            .get(locale)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Achievements for the default locale, falling back to the first declared
    /// locale when the default has none.
    #[must_use]
    pub fn default_achievements(&self) -> &[Achievement] {
        self.achievements
            .get(&self.default_locale)
            .or_else(|| self.achievements.values().next())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn image(&self, id: u64) -> Option<Entry> {
        self.images
            .get(&id)
            .map(|data| Entry::new(Section::Image, id, data.clone()))
    }

    #[must_use]
    pub fn title_image(&self) -> Option<Entry> {
        self.image(TITLE_ENTRY_ID)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let catalogue: Self = serde_json::from_slice(bytes)?;
        catalogue.validate()?;
        Ok(catalogue)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_slice(&bytes)
    }

    /// Reject catalogues that declare the same achievement id twice in a locale.
    pub fn validate(&self) -> Result<()> {
        for (locale, list) in &self.achievements {
            let mut seen = std::collections::HashSet::new();
            for ach in list {
                if !seen.insert(ach.id) {
                    return Err(GpdError::Other(format!(
                        "title {:X} declares achievement {} twice in {locale}",
                        self.title_id, ach.id
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_minimal_catalogue() {
        let json = br#"{
            "title_id": 1297287142,
            "title_name": "Sample",
            "achievements": {
                "en-US": [
                    {"id": 2, "label": "Two", "description": "", "gamerscore": 20},
                    {"id": 1, "label": "One", "description": "", "gamerscore": 10, "image_id": 7}
                ]
            },
            "images": {"7": [1, 2, 3]}
        }"#;

        let catalogue = TitleCatalogue::from_slice(json).unwrap();
        assert_eq!(catalogue.default_locale, DEFAULT_LOCALE);
        let ids: Vec<u16> = catalogue.default_achievements().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(catalogue.image(7).unwrap().data, vec![1, 2, 3]);
        assert!(catalogue.title_image().is_none());
    }

    #[test]
    fn falls_back_to_first_locale() {
        let mut catalogue = TitleCatalogue::new(1, "Only French");
        catalogue
            .achievements
            .insert("fr-FR".to_string(), vec![Achievement::new(1, "Un", 5)]);
        assert_eq!(catalogue.default_achievements().len(), 1);
        assert!(catalogue.achievements("de-DE").is_empty());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let catalogue = TitleCatalogue::new(1, "Dup").with_achievements(vec![
            Achievement::new(1, "A", 5),
            Achievement::new(1, "B", 5),
        ]);
        assert!(catalogue.validate().is_err());
    }
}
