//! Merges a title's declared achievement catalogue into the persisted profile.
//!
//! ```text
//! TitleCatalogue ──┐
//! TitlePlayed? ────┼──> reconcile ──> (TitlePlayed, GpdFile, WritePolicy)
//! GpdFile? ────────┘
//! ```
//!
//! Reconciliation is pure: it never touches storage and takes the current time
//! from the caller. The [`WritePolicy`] tells the caller which collections
//! changed and must be persisted.

use std::collections::HashSet;
use xprofile_gpd::{
    achievement_flags, Achievement, Entry, GpdFile, TitleCatalogue, TitlePlayed, TITLE_ENTRY_ID,
};

/// Which collections must be rewritten after a reconciliation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WritePolicy {
    /// The per-title collection changed
    pub title: bool,
    /// The dashboard summary changed (always, since `last_played` moves)
    pub dashboard: bool,
}

/// Result of merging a catalogue into the profile
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub summary: TitlePlayed,
    pub collection: GpdFile,
    pub write_policy: WritePolicy,
    /// No collection existed; one was created from the catalogue
    pub created: bool,
    /// A collection existed without a dashboard summary and one was synthesized
    pub recovered: bool,
    /// Achievement ids newly added to the collection
    pub added: Vec<u16>,
    /// Display list: declared order, then persisted achievements no longer declared
    pub achievement_list: Vec<Achievement>,
}

/// Merge `catalogue` into the existing per-title state.
///
/// `existing_summary` is the title's entry in the dashboard collection and
/// `existing_collection` its per-title collection. `now` is stamped into
/// `last_played`.
#[must_use]
pub fn reconcile(
    catalogue: &TitleCatalogue,
    existing_summary: Option<&TitlePlayed>,
    existing_collection: Option<GpdFile>,
    now: u64,
) -> Reconciliation {
    let title_id = catalogue.title_id;
    let declared = catalogue.default_achievements();

    let mut outcome = match existing_collection {
        None => create_title(catalogue, declared, now),
        Some(collection) => {
            log::info!("Loaded existing GPD for title {title_id:X}");
            merge_title(catalogue, declared, existing_summary, collection, now)
        }
    };

    if let Some(previous) = existing_summary {
        merge_monotonic(previous, &mut outcome.summary);
    }
    outcome.achievement_list = achievement_list(declared, &outcome.collection);
    outcome
}

fn create_title(catalogue: &TitleCatalogue, declared: &[Achievement], now: u64) -> Reconciliation {
    let title_id = catalogue.title_id;
    log::info!("Creating new GPD for title {title_id:X}");

    let mut collection = GpdFile::new(title_id);
    let mut summary = TitlePlayed::new(title_id, catalogue.title_name.clone());
    summary.last_played = now;

    let mut added = Vec::with_capacity(declared.len());
    for ach in declared {
        collection.update_achievement(declared_copy(ach));
        count_declared(&mut summary, ach);
        added.push(ach.id);
    }

    for ach in declared {
        if let Some(image) = ach.image_ref().and_then(|id| catalogue.image(id)) {
            collection.update_entry(image);
        }
    }
    if let Some(title_image) = catalogue.title_image() {
        collection.update_entry(title_image);
    }
    if !catalogue.title_name.is_empty() {
        collection.update_entry(Entry::utf16_string(TITLE_ENTRY_ID, &catalogue.title_name));
    }

    Reconciliation {
        summary,
        collection,
        write_policy: WritePolicy {
            title: true,
            dashboard: true,
        },
        created: true,
        recovered: false,
        added,
        achievement_list: Vec::new(),
    }
}

fn merge_title(
    catalogue: &TitleCatalogue,
    declared: &[Achievement],
    existing_summary: Option<&TitlePlayed>,
    mut collection: GpdFile,
    now: u64,
) -> Reconciliation {
    let title_id = catalogue.title_id;

    let (mut summary, recovered) = match existing_summary {
        Some(summary) => (summary.clone(), false),
        None => {
            log::warn!(
                "GPD for title {title_id:X} exists but the dashboard has no summary for it, rebuilding"
            );
            (TitlePlayed::new(title_id, catalogue.title_name.clone()), true)
        }
    };
    if summary.title_name.is_empty() {
        summary.title_name.clone_from(&catalogue.title_name);
    }
    summary.last_played = now;

    // Catalogues grow after release (title updates); pick up what's new.
    let mut added = Vec::new();
    for ach in declared {
        let exists = collection.has_achievement(ach.id);
        if exists && !recovered {
            continue;
        }

        count_declared(&mut summary, ach);

        if !exists {
            log::debug!(
                "Adding new achievement {} ({}) from the catalogue, it was not in the existing GPD",
                ach.id,
                ach.label
            );
            collection.update_achievement(declared_copy(ach));
            added.push(ach.id);
        }
    }

    if recovered {
        // Earned progress already in the collection still counts.
        for ach in declared {
            if let Some(stored) = collection.get_achievement(ach.id) {
                if stored.is_unlocked() {
                    summary.achievements_earned = summary.achievements_earned.saturating_add(1);
                    summary.gamerscore_earned =
                        summary.gamerscore_earned.saturating_add(stored.gamerscore);
                }
            }
        }
    }

    Reconciliation {
        summary,
        collection,
        write_policy: WritePolicy {
            title: !added.is_empty(),
            dashboard: true,
        },
        created: false,
        recovered,
        added,
        achievement_list: Vec::new(),
    }
}

/// Re-derive a summary's counters from its collection.
///
/// Counters only move upward. Returns `true` when the summary changed.
pub fn recount(summary: &mut TitlePlayed, collection: &GpdFile) -> bool {
    let totals = collection.achievement_totals();
    let mut next = TitlePlayed {
        achievements_possible: totals.possible,
        achievements_earned: totals.earned,
        gamerscore_total: totals.gamerscore_total,
        gamerscore_earned: totals.gamerscore_earned,
        ..summary.clone()
    };
    merge_monotonic(summary, &mut next);
    if next == *summary {
        return false;
    }
    *summary = next;
    true
}

/// Log the display list for a title.
pub fn publish_achievement_list(summary: &TitlePlayed, list: &[Achievement]) {
    if list.is_empty() {
        return;
    }
    log::info!("Achievement list:");
    for ach in list {
        log::info!(
            "{} - {} - {} - {} GS - {}",
            ach.id,
            ach.label,
            ach.description,
            ach.gamerscore,
            if ach.is_unlocked() { "unlocked" } else { "locked" }
        );
    }
    log::info!(
        "Unlocked achievements: {}/{}, gamerscore: {}/{}",
        summary.achievements_earned,
        summary.achievements_possible,
        summary.gamerscore_earned,
        summary.gamerscore_total
    );
}

fn count_declared(summary: &mut TitlePlayed, ach: &Achievement) {
    summary.achievements_possible = summary.achievements_possible.saturating_add(1);
    summary.gamerscore_total = summary.gamerscore_total.saturating_add(ach.gamerscore);
}

// A declared achievement always enters the profile locked.
fn declared_copy(ach: &Achievement) -> Achievement {
    Achievement {
        flags: ach.flags & !achievement_flags::UNLOCKED_MASK,
        unlock_time: 0,
        ..ach.clone()
    }
}

fn merge_monotonic(previous: &TitlePlayed, next: &mut TitlePlayed) {
    next.achievements_possible = next.achievements_possible.max(previous.achievements_possible);
    next.gamerscore_total = next.gamerscore_total.max(previous.gamerscore_total);
    next.achievements_earned = next.achievements_earned.max(previous.achievements_earned);
    next.gamerscore_earned = next.gamerscore_earned.max(previous.gamerscore_earned);
}

fn achievement_list(declared: &[Achievement], collection: &GpdFile) -> Vec<Achievement> {
    let declared_ids: HashSet<u16> = declared.iter().map(|a| a.id).collect();
    let mut list: Vec<Achievement> = declared
        .iter()
        .filter_map(|a| collection.get_achievement(a.id).cloned())
        .collect();
    list.extend(
        collection
            .achievements()
            .filter(|a| !declared_ids.contains(&a.id))
            .cloned(),
    );
    list
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use xprofile_gpd::Section;

    const TITLE: u32 = 0x1234;

    fn catalogue(achievements: Vec<Achievement>) -> TitleCatalogue {
        TitleCatalogue::new(TITLE, "Test Title").with_achievements(achievements)
    }

    fn ids(list: &[Achievement]) -> Vec<u16> {
        list.iter().map(|a| a.id).collect()
    }

    #[test]
    fn new_title_counts_every_declared_achievement() {
        let cat = catalogue(vec![
            Achievement::new(1, "One", 10),
            Achievement::new(2, "Two", 20),
        ]);

        let out = reconcile(&cat, None, None, 1_000);

        assert!(out.created);
        assert_eq!(out.summary.title_id, TITLE);
        assert_eq!(out.summary.achievements_possible, 2);
        assert_eq!(out.summary.gamerscore_total, 30);
        assert_eq!(out.summary.achievements_earned, 0);
        assert_eq!(out.summary.gamerscore_earned, 0);
        assert_eq!(out.summary.last_played, 1_000);
        let achievements: Vec<Achievement> = out.collection.achievements().cloned().collect();
        assert_eq!(ids(&achievements), vec![1, 2]);
        assert_eq!(
            out.write_policy,
            WritePolicy {
                title: true,
                dashboard: true
            }
        );
    }

    #[test]
    fn new_title_imports_imagery_and_name() {
        let cat = TitleCatalogue::new(TITLE, "Shiny")
            .with_achievements(vec![
                Achievement {
                    image_id: 5,
                    ..Achievement::new(1, "Pictured", 10)
                },
                Achievement {
                    image_id: 6,
                    ..Achievement::new(2, "Missing picture", 10)
                },
            ])
            .with_image(5, vec![0xAA])
            .with_image(TITLE_ENTRY_ID, vec![0xBB]);

        let out = reconcile(&cat, None, None, 1);

        assert_eq!(out.collection.get_entry(Section::Image, 5).unwrap().data, vec![0xAA]);
        assert!(out.collection.get_entry(Section::Image, 6).is_none());
        assert_eq!(
            out.collection.get_entry(Section::Image, TITLE_ENTRY_ID).unwrap().data,
            vec![0xBB]
        );
        let name = out.collection.get_entry(Section::String, TITLE_ENTRY_ID).unwrap();
        assert_eq!(name.as_utf16_string().as_deref(), Some("Shiny"));
    }

    #[test]
    fn catalogue_growth_adds_only_new_achievements() {
        let first = reconcile(&catalogue(vec![Achievement::new(1, "One", 10)]), None, None, 1);

        let grown = catalogue(vec![Achievement::new(1, "One", 10), Achievement::new(2, "Two", 5)]);
        let out = reconcile(&grown, Some(&first.summary), Some(first.collection), 2);

        assert!(!out.created);
        assert_eq!(out.added, vec![2]);
        assert_eq!(out.summary.achievements_possible, 2);
        assert_eq!(out.summary.gamerscore_total, 15);
        assert_eq!(
            out.write_policy,
            WritePolicy {
                title: true,
                dashboard: true
            }
        );
    }

    #[test]
    fn unchanged_catalogue_only_touches_dashboard() {
        let cat = catalogue(vec![Achievement::new(1, "One", 10), Achievement::new(2, "Two", 20)]);
        let first = reconcile(&cat, None, None, 1);
        let second = reconcile(&cat, Some(&first.summary), Some(first.collection.clone()), 2);

        assert!(second.added.is_empty());
        assert_eq!(
            second.write_policy,
            WritePolicy {
                title: false,
                dashboard: true
            }
        );
        assert_eq!(second.summary.achievements_possible, 2);
        assert_eq!(second.summary.gamerscore_total, 30);
        assert_eq!(second.summary.last_played, 2);
        assert_eq!(second.collection, first.collection);
    }

    #[test]
    fn missing_summary_is_rebuilt_from_catalogue() {
        let cat = catalogue(vec![Achievement::new(1, "One", 10), Achievement::new(2, "Two", 20)]);
        let mut collection = GpdFile::new(TITLE);
        collection.update_achievement(Achievement::new(1, "One", 10));
        collection.unlock_achievement(1, 50);

        let out = reconcile(&cat, None, Some(collection), 3);

        assert!(out.recovered);
        assert_eq!(out.added, vec![2]);
        assert_eq!(out.summary.achievements_possible, 2);
        assert_eq!(out.summary.gamerscore_total, 30);
        assert_eq!(out.summary.achievements_earned, 1);
        assert_eq!(out.summary.gamerscore_earned, 10);
        assert_eq!(out.summary.title_name, "Test Title");
        assert!(out.collection.get_achievement(1).unwrap().is_unlocked());
    }

    #[test]
    fn declared_unlock_flags_are_ignored() {
        let cat = catalogue(vec![Achievement {
            flags: achievement_flags::ACHIEVED,
            unlock_time: 99,
            ..Achievement::new(1, "Pre-unlocked", 10)
        }]);
        let out = reconcile(&cat, None, None, 1);
        assert!(!out.collection.get_achievement(1).unwrap().is_unlocked());
        assert_eq!(out.summary.achievements_earned, 0);
    }

    #[test]
    fn recreated_collection_keeps_earned_progress() {
        let previous = TitlePlayed {
            achievements_possible: 2,
            achievements_earned: 1,
            gamerscore_total: 30,
            gamerscore_earned: 20,
            last_played: 10,
            ..TitlePlayed::new(TITLE, "Test Title")
        };
        let cat = catalogue(vec![Achievement::new(1, "One", 10), Achievement::new(2, "Two", 20)]);

        let out = reconcile(&cat, Some(&previous), None, 5);

        assert!(out.created);
        assert_eq!(out.summary.achievements_earned, 1);
        assert_eq!(out.summary.gamerscore_earned, 20);
        assert_eq!(out.summary.last_played, 5);
    }

    #[test]
    fn achievement_list_follows_declared_order() {
        let mut collection = GpdFile::new(TITLE);
        collection.update_achievement(Achievement::new(9, "Retired", 0));
        collection.update_achievement(Achievement::new(3, "Three", 5));
        let summary = TitlePlayed::new(TITLE, "Test Title");

        let cat = catalogue(vec![Achievement::new(3, "Three", 5), Achievement::new(1, "One", 5)]);
        let out = reconcile(&cat, Some(&summary), Some(collection), 1);

        assert_eq!(ids(&out.achievement_list), vec![3, 1, 9]);
    }

    #[test]
    fn recount_only_moves_upward() {
        let mut collection = GpdFile::new(TITLE);
        collection.update_achievement(Achievement::new(1, "One", 10));
        collection.update_achievement(Achievement::new(2, "Two", 20));
        collection.unlock_achievement(2, 7);

        let mut summary = TitlePlayed::new(TITLE, "Test Title");
        assert!(recount(&mut summary, &collection));
        assert_eq!(summary.achievements_possible, 2);
        assert_eq!(summary.achievements_earned, 1);
        assert_eq!(summary.gamerscore_earned, 20);
        assert!(!recount(&mut summary, &collection));

        let mut inflated = TitlePlayed {
            achievements_earned: 2,
            gamerscore_earned: 30,
            ..summary.clone()
        };
        assert!(!recount(&mut inflated, &collection));
        assert_eq!(inflated.achievements_earned, 2);
    }
}
