use crate::config::ProfileConfig;
use crate::error::{ProfileError, Result};
use crate::reconciler::{publish_achievement_list, recount, reconcile};
use crate::storage::{collection_file_name, dashboard_file_name, FsStorage, ProfileStorage};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use xprofile_account::{seal, unseal_any, AccountError, AccountInfo, KeyResolver, KeyVariant};
use xprofile_gpd::{GpdFile, Setting, SettingValue, TitleCatalogue, TitlePlayed, DASHBOARD_ID};

/// Account id used when no account file could be unsealed.
pub const PLACEHOLDER_XUID: u64 = 0xE000_BABE_BABE_BABE;
pub const PLACEHOLDER_GAMERTAG: &str = "XeniaUser";

/// Selects a per-title collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleRef {
    /// The most recently activated title
    Current,
    Id(u32),
}

impl From<u32> for TitleRef {
    fn from(id: u32) -> Self {
        Self::Id(id)
    }
}

impl fmt::Display for TitleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Current => f.write_str("current title"),
            Self::Id(id) => write!(f, "title {id:X}"),
        }
    }
}

/// How the account credential was obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountLoad {
    Unsealed(KeyVariant),
    NotFound,
    MissingKey,
    IntegrityFailure,
    Invalid(String),
}

impl AccountLoad {
    #[must_use]
    pub const fn is_placeholder(&self) -> bool {
        !matches!(self, Self::Unsealed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardLoad {
    Loaded,
    Missing,
    Corrupt(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Missing,
    Corrupt(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedTitle {
    pub title_id: u32,
    pub title_name: String,
    pub reason: SkipReason,
}

/// What happened while loading a profile. Every condition here is recoverable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub account: AccountLoad,
    pub dashboard: DashboardLoad,
    pub titles_loaded: Vec<u32>,
    pub skipped: Vec<SkippedTitle>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistReport {
    pub written: Vec<u32>,
    pub failed: Vec<(u32, String)>,
}

impl PersistReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// In-memory profile: account credential, dashboard collection, one collection
/// per known title and the active title.
///
/// Every mutating operation persists eagerly. The store is not synchronized;
/// callers serialize access.
pub struct ProfileStore<S> {
    storage: S,
    account_file: String,
    account: AccountInfo,
    account_variant: Option<KeyVariant>,
    dashboard: GpdFile,
    titles: BTreeMap<u32, GpdFile>,
    /// Titles whose collection could not be loaded; held as blank collections
    /// until activated or explicitly persisted
    unloaded: BTreeSet<u32>,
    current_title: Option<u32>,
    clock: fn() -> u64,
}

impl ProfileStore<FsStorage> {
    /// Load the profile described by `config` from disk.
    pub fn open(config: &ProfileConfig) -> Result<(Self, LoadReport)> {
        config.validate()?;
        let resolver = config.key_resolver()?;
        let storage = FsStorage::new(&config.profile_directory);
        log::info!("Loading profile from {}", storage.root().display());
        Ok(Self::load(storage, &resolver, &config.account_file))
    }
}

impl<S: ProfileStorage> ProfileStore<S> {
    /// Load the account and every collection the dashboard references.
    ///
    /// Never fails: an unusable account falls back to a placeholder, a missing
    /// or corrupt dashboard to a blank one, and an unreadable title collection
    /// is replaced by a blank one. Everything that went wrong is listed in the
    /// [`LoadReport`].
    pub fn load<R: KeyResolver + ?Sized>(
        storage: S,
        resolver: &R,
        account_file: &str,
    ) -> (Self, LoadReport) {
        let (account, account_load) = load_account(&storage, resolver, account_file);
        let (dashboard, dashboard_load) = load_dashboard(&storage);

        let mut titles = BTreeMap::new();
        let mut unloaded = BTreeSet::new();
        let mut titles_loaded = Vec::new();
        let mut skipped = Vec::new();
        for title in dashboard.titles() {
            if title.title_id == DASHBOARD_ID {
                log::warn!("Dash GPD lists itself as a title, skipping");
                skipped.push(SkippedTitle {
                    title_id: title.title_id,
                    title_name: title.title_name.clone(),
                    reason: SkipReason::Corrupt("reserved id".to_string()),
                });
                continue;
            }
            match load_title(&storage, title) {
                Ok(gpd) => {
                    titles.insert(title.title_id, gpd);
                    titles_loaded.push(title.title_id);
                }
                Err(reason) => {
                    titles.insert(title.title_id, GpdFile::new(title.title_id));
                    unloaded.insert(title.title_id);
                    skipped.push(SkippedTitle {
                        title_id: title.title_id,
                        title_name: title.title_name.clone(),
                        reason,
                    });
                }
            }
        }
        log::info!("Loaded {} profile GPDs", titles_loaded.len());

        let account_variant = match account_load {
            AccountLoad::Unsealed(variant) => Some(variant),
            _ => None,
        };
        let store = Self {
            storage,
            account_file: account_file.to_string(),
            account,
            account_variant,
            dashboard,
            titles,
            unloaded,
            current_title: None,
            clock: unix_now_ms,
        };
        let report = LoadReport {
            account: account_load,
            dashboard: dashboard_load,
            titles_loaded,
            skipped,
        };
        (store, report)
    }

    /// Replace the time source used for `last_played` and unlock times.
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> u64) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub const fn account(&self) -> &AccountInfo {
        &self.account
    }

    /// Key variant that unsealed the account; `None` for the placeholder.
    #[must_use]
    pub const fn account_variant(&self) -> Option<KeyVariant> {
        self.account_variant
    }

    #[must_use]
    pub const fn dashboard(&self) -> &GpdFile {
        &self.dashboard
    }

    #[must_use]
    pub const fn current_title_id(&self) -> Option<u32> {
        self.current_title
    }

    /// Every known per-title collection, including blank stand-ins for titles
    /// that failed to load
    pub fn titles(&self) -> impl Iterator<Item = &GpdFile> {
        self.titles.values()
    }

    /// Titles held as blank stand-ins because their collection failed to load
    pub fn unloaded_titles(&self) -> impl Iterator<Item = u32> + '_ {
        self.unloaded.iter().copied()
    }

    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Dashboard summary of a title
    pub fn summary(&self, title: TitleRef) -> Result<&TitlePlayed> {
        let id = self.resolve(title)?;
        self.dashboard
            .get_title(id)
            .ok_or(ProfileError::NotFound(TitleRef::Id(id)))
    }

    /// Merge a title's catalogue into the profile and make it the active title.
    ///
    /// In-memory state is updated before anything is written. The dashboard is
    /// written even when the title write fails; the first write failure is
    /// returned after the store already reflects the new state.
    pub fn activate_title(&mut self, catalogue: &TitleCatalogue) -> Result<&GpdFile> {
        let title_id = catalogue.title_id;
        if title_id == DASHBOARD_ID {
            return Err(ProfileError::ReservedTitle(title_id));
        }

        let existing = self.titles.remove(&title_id);
        // A stand-in carries nothing; rebuild from the catalogue instead.
        let existing = if self.unloaded.remove(&title_id) {
            None
        } else {
            existing
        };
        let summary = self.dashboard.get_title(title_id).cloned();
        let outcome = reconcile(catalogue, summary.as_ref(), existing, (self.clock)());
        let policy = outcome.write_policy;

        self.dashboard.update_title(outcome.summary.clone());
        self.titles.insert(title_id, outcome.collection);
        self.current_title = Some(title_id);
        publish_achievement_list(&outcome.summary, &outcome.achievement_list);

        let mut first_err = None;
        let mut dashboard_written = false;
        if policy.title {
            match self.write_title(title_id) {
                Ok(written) => dashboard_written = written,
                Err(err) => first_err = Some(err),
            }
        }
        if policy.dashboard && !dashboard_written {
            if let Err(err) = self.write_dashboard() {
                first_err.get_or_insert(err);
            }
        }
        if let Some(err) = first_err {
            return Err(err);
        }

        self.lookup(TitleRef::Id(title_id))
    }

    /// Resolve a title collection; `NotFound` for unknown ids or when no title
    /// is active.
    pub fn lookup(&self, title: TitleRef) -> Result<&GpdFile> {
        let id = self.resolve(title)?;
        self.titles
            .get(&id)
            .ok_or(ProfileError::NotFound(TitleRef::Id(id)))
    }

    /// Mutable access; persist changes with [`ProfileStore::persist_title`].
    pub fn lookup_mut(&mut self, title: TitleRef) -> Result<&mut GpdFile> {
        let id = self.resolve(title)?;
        self.titles
            .get_mut(&id)
            .ok_or(ProfileError::NotFound(TitleRef::Id(id)))
    }

    /// Unlock an achievement and persist. Returns `false` when it was already
    /// unlocked.
    pub fn unlock_achievement(&mut self, title: TitleRef, achievement_id: u16) -> Result<bool> {
        let title_id = self.resolve(title)?;
        let now = (self.clock)();
        let gpd = self
            .titles
            .get_mut(&title_id)
            .ok_or(ProfileError::NotFound(TitleRef::Id(title_id)))?;

        match gpd.unlock_achievement(achievement_id, now) {
            None => Err(ProfileError::UnknownAchievement {
                title_id,
                achievement_id,
            }),
            Some(false) => Ok(false),
            Some(true) => {
                log::info!("Unlocked achievement {achievement_id} for title {title_id:X}");
                self.write_title(title_id)?;
                Ok(true)
            }
        }
    }

    /// Persist one title collection, refreshing its dashboard summary.
    pub fn persist_title(&mut self, title: TitleRef) -> Result<()> {
        let title_id = self.resolve(title)?;
        match self.write_title(title_id) {
            Ok(_) => {
                self.unloaded.remove(&title_id);
                log::debug!("Updated title {title_id:X} GPD successfully!");
                Ok(())
            }
            Err(err) => {
                log::error!("Persisting title {title_id:X} failed: {err}");
                Err(err)
            }
        }
    }

    /// Persist every title collection. Failures are collected, not fatal.
    ///
    /// Blank stand-ins are left alone so an unreadable file on disk is never
    /// replaced by an empty collection.
    pub fn persist_all(&mut self) -> PersistReport {
        let mut report = PersistReport::default();
        let ids: Vec<u32> = self
            .titles
            .keys()
            .copied()
            .filter(|id| !self.unloaded.contains(id))
            .collect();
        for title_id in ids {
            match self.write_title(title_id) {
                Ok(_) => report.written.push(title_id),
                Err(err) => {
                    log::error!("Persisting title {title_id:X} failed: {err}");
                    report.failed.push((title_id, err.to_string()));
                }
            }
        }
        report
    }

    /// Add a setting to the dashboard unless one with the same id exists.
    ///
    /// Binary settings without a payload are sized to the width their id
    /// declares. Returns `false` when the setting already existed.
    pub fn record_setting(&mut self, mut setting: Setting) -> Result<bool> {
        if self.dashboard.get_setting(setting.id).is_some() {
            return Ok(false);
        }
        let declared_size = setting.declared_size();
        if let SettingValue::Binary(data) = &mut setting.value {
            if data.is_empty() {
                data.resize(declared_size, 0);
            }
        }
        self.dashboard.update_setting(setting);
        self.write_dashboard()?;
        Ok(true)
    }

    /// Seal `info` with the given key variant and replace the account file.
    pub fn reseal_account<R: KeyResolver + ?Sized>(
        &mut self,
        resolver: &R,
        variant: KeyVariant,
        info: AccountInfo,
    ) -> Result<()> {
        let blob = seal(resolver, variant, &info)?;
        let name = self.account_file.clone();
        self.storage
            .write(&name, &blob)
            .map_err(|source| ProfileError::WriteFailed { name, source })?;
        log::info!("Sealed Account \"{}\" with {variant} key", info.gamertag());
        self.account = info;
        self.account_variant = Some(variant);
        Ok(())
    }

    fn resolve(&self, title: TitleRef) -> Result<u32> {
        match title {
            TitleRef::Id(id) => Ok(id),
            TitleRef::Current => self
                .current_title
                .ok_or(ProfileError::NotFound(TitleRef::Current)),
        }
    }

    /// Write a title collection, then re-derive its dashboard summary and write
    /// the dashboard if the counters moved. Returns whether the dashboard was
    /// written.
    fn write_title(&mut self, title_id: u32) -> Result<bool> {
        if title_id == DASHBOARD_ID {
            return Err(ProfileError::ReservedTitle(title_id));
        }
        let refreshed = {
            let gpd = self
                .titles
                .get(&title_id)
                .ok_or(ProfileError::NotFound(TitleRef::Id(title_id)))?;
            write_collection(&mut self.storage, gpd)?;

            self.dashboard.get_title(title_id).cloned().and_then(|mut summary| {
                let changed = recount(&mut summary, gpd);
                changed.then_some(summary)
            })
        };

        let Some(summary) = refreshed else {
            return Ok(false);
        };
        self.dashboard.update_title(summary);
        self.write_dashboard()?;
        Ok(true)
    }

    fn write_dashboard(&mut self) -> Result<()> {
        write_collection(&mut self.storage, &self.dashboard)
    }
}

fn write_collection<S: ProfileStorage>(storage: &mut S, gpd: &GpdFile) -> Result<()> {
    let name = collection_file_name(gpd.title_id());
    let len = gpd.write(None)?;
    let mut buffer = vec![0u8; len];
    let written = gpd.write(Some(&mut buffer))?;
    buffer.truncate(written);

    storage.write(&name, &buffer).map_err(|source| {
        log::error!("Failed to open {name} for writing: {source}");
        ProfileError::WriteFailed { name, source }
    })
}

fn load_account<S: ProfileStorage, R: KeyResolver + ?Sized>(
    storage: &S,
    resolver: &R,
    account_file: &str,
) -> (AccountInfo, AccountLoad) {
    let blob = match storage.read(account_file) {
        Ok(Some(blob)) => blob,
        Ok(None) => {
            log::info!("No Account file, using placeholder account");
            return (placeholder_account(), AccountLoad::NotFound);
        }
        Err(err) => {
            log::warn!("Failed to read Account file: {err}");
            return (placeholder_account(), AccountLoad::Invalid(err.to_string()));
        }
    };

    log::info!("Loading Account file {account_file}");
    match unseal_any(resolver, &blob) {
        Ok((info, variant)) => {
            log::info!("Loaded Account \"{}\" successfully!", info.gamertag());
            (info, AccountLoad::Unsealed(variant))
        }
        Err(AccountError::MissingKey { key_id, .. }) => {
            log::error!("Root secret {key_id:#x} is not configured, Account file cannot be unsealed");
            (placeholder_account(), AccountLoad::MissingKey)
        }
        Err(AccountError::IntegrityFailure) => {
            log::warn!("Failed to decrypt Account file data");
            (placeholder_account(), AccountLoad::IntegrityFailure)
        }
        Err(err) => {
            log::warn!("Invalid Account file: {err}");
            (placeholder_account(), AccountLoad::Invalid(err.to_string()))
        }
    }
}

fn load_dashboard<S: ProfileStorage>(storage: &S) -> (GpdFile, DashboardLoad) {
    let name = dashboard_file_name();
    let bytes = match storage.read(&name) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            log::warn!("Failed to open dash GPD ({name}) for reading, using blank one");
            return (GpdFile::dashboard(), DashboardLoad::Missing);
        }
        Err(err) => {
            log::warn!("Failed to read dash GPD ({name}): {err}, using blank one");
            return (GpdFile::dashboard(), DashboardLoad::Corrupt(err.to_string()));
        }
    };
    match GpdFile::read(&bytes) {
        Ok(gpd) if gpd.is_dashboard() => (gpd, DashboardLoad::Loaded),
        Ok(gpd) => {
            let reason = format!("holds title {:X}", gpd.title_id());
            log::warn!("Dash GPD ({name}) {reason}, using blank one");
            (GpdFile::dashboard(), DashboardLoad::Corrupt(reason))
        }
        Err(err) => {
            log::warn!("Failed to parse dash GPD ({name}): {err}, using blank one");
            (GpdFile::dashboard(), DashboardLoad::Corrupt(err.to_string()))
        }
    }
}

fn load_title<S: ProfileStorage>(
    storage: &S,
    title: &TitlePlayed,
) -> std::result::Result<GpdFile, SkipReason> {
    let name = collection_file_name(title.title_id);
    let bytes = match storage.read(&name) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            log::error!(
                "Failed to open GPD for title {:X} ({})!",
                title.title_id,
                title.title_name
            );
            return Err(SkipReason::Missing);
        }
        Err(err) => {
            log::error!("Failed to read GPD for title {:X}: {err}", title.title_id);
            return Err(SkipReason::Corrupt(err.to_string()));
        }
    };

    match GpdFile::read(&bytes) {
        Ok(gpd) if gpd.title_id() == title.title_id => Ok(gpd),
        Ok(gpd) => {
            log::error!(
                "GPD for title {:X} holds title {:X}, skipping",
                title.title_id,
                gpd.title_id()
            );
            Err(SkipReason::Corrupt(format!("holds title {:X}", gpd.title_id())))
        }
        Err(err) => {
            log::error!(
                "Failed to read GPD for title {:X} ({})!",
                title.title_id,
                title.title_name
            );
            Err(SkipReason::Corrupt(err.to_string()))
        }
    }
}

fn placeholder_account() -> AccountInfo {
    let mut info = AccountInfo {
        xuid_online: PLACEHOLDER_XUID,
        ..Default::default()
    };
    for (dst, unit) in info.gamertag.iter_mut().zip(PLACEHOLDER_GAMERTAG.encode_utf16()) {
        *dst = unit;
    }
    info
}

fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use pretty_assertions::assert_eq;
    use std::io;
    use xprofile_account::StaticKeyResolver;
    use xprofile_gpd::{Achievement, DataType};

    const TITLE: u32 = 0x4156_07E6;

    /// Memory storage that refuses writes to selected files
    #[derive(Default)]
    struct FlakyStorage {
        inner: MemoryStorage,
        refuse: Vec<String>,
    }

    impl ProfileStorage for FlakyStorage {
        fn read(&self, name: &str) -> io::Result<Option<Vec<u8>>> {
            self.inner.read(name)
        }

        fn write(&mut self, name: &str, bytes: &[u8]) -> io::Result<()> {
            if self.refuse.iter().any(|r| r == name) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
            }
            self.inner.write(name, bytes)
        }
    }

    fn fixed_clock() -> u64 {
        1_700_000_000_000
    }

    fn empty_store() -> ProfileStore<MemoryStorage> {
        let (store, _) =
            ProfileStore::load(MemoryStorage::new(), &StaticKeyResolver::default(), "Account");
        store.with_clock(fixed_clock)
    }

    fn catalogue(title_id: u32, achievements: Vec<Achievement>) -> TitleCatalogue {
        TitleCatalogue::new(title_id, format!("Title {title_id:X}")).with_achievements(achievements)
    }

    #[test]
    fn empty_storage_loads_placeholder_profile() {
        let (store, report) =
            ProfileStore::load(MemoryStorage::new(), &StaticKeyResolver::default(), "Account");

        assert_eq!(report.account, AccountLoad::NotFound);
        assert_eq!(report.dashboard, DashboardLoad::Missing);
        assert!(report.titles_loaded.is_empty());
        assert_eq!(store.account().xuid_online, PLACEHOLDER_XUID);
        assert_eq!(store.account().gamertag(), PLACEHOLDER_GAMERTAG);
        assert_eq!(store.account_variant(), None);
    }

    #[test]
    fn activation_creates_and_persists_title() {
        let mut store = empty_store();
        let cat = catalogue(
            TITLE,
            vec![Achievement::new(1, "One", 10), Achievement::new(2, "Two", 20)],
        );

        let gpd = store.activate_title(&cat).unwrap();
        assert_eq!(gpd.achievement_count(), 2);
        assert_eq!(store.current_title_id(), Some(TITLE));

        let summary = store.summary(TitleRef::Current).unwrap();
        assert_eq!(summary.achievements_possible, 2);
        assert_eq!(summary.gamerscore_total, 30);
        assert_eq!(summary.last_played, fixed_clock());

        let storage = store.storage();
        assert!(storage.get(&collection_file_name(TITLE)).is_some());
        let dash = GpdFile::read(storage.get(&dashboard_file_name()).unwrap()).unwrap();
        assert_eq!(dash.get_title(TITLE), Some(summary));
    }

    #[test]
    fn repeated_activation_does_not_duplicate() {
        let mut store = empty_store();
        let cat = catalogue(TITLE, vec![Achievement::new(1, "One", 10)]);

        store.activate_title(&cat).unwrap();
        store.activate_title(&cat).unwrap();

        let summary = store.summary(TitleRef::Id(TITLE)).unwrap();
        assert_eq!(summary.achievements_possible, 1);
        assert_eq!(summary.gamerscore_total, 10);
        assert_eq!(store.lookup(TitleRef::Current).unwrap().achievement_count(), 1);
    }

    #[test]
    fn lookup_reports_not_found() {
        let store = empty_store();
        let err = store.lookup(TitleRef::Current).unwrap_err();
        assert!(matches!(err, ProfileError::NotFound(TitleRef::Current)));

        let err = store.lookup(TitleRef::Id(0xDEAD)).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn dashboard_id_cannot_be_activated() {
        let mut store = empty_store();
        let err = store
            .activate_title(&catalogue(DASHBOARD_ID, Vec::new()))
            .unwrap_err();
        assert!(matches!(err, ProfileError::ReservedTitle(DASHBOARD_ID)));
    }

    #[test]
    fn unlock_refreshes_dashboard_summary() {
        let mut store = empty_store();
        let cat = catalogue(
            TITLE,
            vec![Achievement::new(1, "One", 10), Achievement::new(2, "Two", 20)],
        );
        store.activate_title(&cat).unwrap();

        assert!(store.unlock_achievement(TitleRef::Current, 2).unwrap());
        assert!(!store.unlock_achievement(TitleRef::Current, 2).unwrap());

        let summary = store.summary(TitleRef::Current).unwrap();
        assert_eq!(summary.achievements_earned, 1);
        assert_eq!(summary.gamerscore_earned, 20);

        let dash = GpdFile::read(store.storage().get(&dashboard_file_name()).unwrap()).unwrap();
        assert_eq!(dash.get_title(TITLE).unwrap().gamerscore_earned, 20);

        let err = store.unlock_achievement(TitleRef::Current, 9).unwrap_err();
        assert!(matches!(
            err,
            ProfileError::UnknownAchievement {
                achievement_id: 9,
                ..
            }
        ));
    }

    #[test]
    fn earned_progress_survives_reactivation() {
        let mut store = empty_store();
        let cat = catalogue(TITLE, vec![Achievement::new(1, "One", 10)]);
        store.activate_title(&cat).unwrap();
        store.unlock_achievement(TitleRef::Current, 1).unwrap();

        let grown = catalogue(
            TITLE,
            vec![Achievement::new(1, "One", 10), Achievement::new(2, "Two", 5)],
        );
        store.activate_title(&grown).unwrap();

        let summary = store.summary(TitleRef::Current).unwrap();
        assert_eq!(summary.achievements_possible, 2);
        assert_eq!(summary.achievements_earned, 1);
        assert_eq!(summary.gamerscore_earned, 10);
        assert!(store
            .lookup(TitleRef::Current)
            .unwrap()
            .get_achievement(1)
            .unwrap()
            .is_unlocked());
    }

    #[test]
    fn record_setting_never_overwrites() {
        let mut store = empty_store();
        let gamerscore = 0x1004_0008;

        assert!(store
            .record_setting(Setting::new(gamerscore, SettingValue::Int32(10)))
            .unwrap());
        assert!(!store
            .record_setting(Setting::new(gamerscore, SettingValue::Int32(99)))
            .unwrap());
        assert_eq!(
            store.dashboard().get_setting(gamerscore).unwrap().value,
            SettingValue::Int32(10)
        );
        assert!(store.storage().get(&dashboard_file_name()).is_some());
    }

    #[test]
    fn empty_binary_setting_is_sized_from_id() {
        let mut store = empty_store();
        let picture_key = 0x6064_0F00;
        assert_eq!(DataType::from_setting_id(picture_key), DataType::Binary);

        store
            .record_setting(Setting::new(picture_key, SettingValue::Binary(Vec::new())))
            .unwrap();

        let stored = store.dashboard().get_setting(picture_key).unwrap();
        assert_eq!(stored.value, SettingValue::Binary(vec![0; 0x64]));
    }

    #[test]
    fn persist_all_reports_failures_and_continues() {
        let storage = FlakyStorage::default();
        let (mut store, _) = ProfileStore::load(storage, &StaticKeyResolver::default(), "Account");
        store
            .activate_title(&catalogue(0x1111, vec![Achievement::new(1, "A", 5)]))
            .unwrap();
        store
            .activate_title(&catalogue(0x2222, vec![Achievement::new(1, "B", 5)]))
            .unwrap();

        store
            .storage_mut()
            .refuse
            .push(collection_file_name(0x1111));
        let report = store.persist_all();

        assert_eq!(report.written, vec![0x2222]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, 0x1111);
        assert!(!report.is_clean());
        assert!(store.lookup(TitleRef::Id(0x1111)).is_ok());
    }

    #[test]
    fn failed_activation_write_keeps_memory_state() {
        let storage = FlakyStorage {
            refuse: vec![collection_file_name(TITLE)],
            ..Default::default()
        };
        let (mut store, _) = ProfileStore::load(storage, &StaticKeyResolver::default(), "Account");

        let err = store
            .activate_title(&catalogue(TITLE, vec![Achievement::new(1, "A", 5)]))
            .unwrap_err();
        assert!(matches!(err, ProfileError::WriteFailed { .. }));
        assert_eq!(store.current_title_id(), Some(TITLE));
        assert_eq!(store.lookup(TitleRef::Current).unwrap().achievement_count(), 1);
    }

    fn later_clock() -> u64 {
        fixed_clock() + 60_000
    }

    fn persisted_dashboard(storage: &MemoryStorage) -> GpdFile {
        GpdFile::read(storage.get(&dashboard_file_name()).unwrap()).unwrap()
    }

    #[test]
    fn refused_title_write_still_persists_dashboard() {
        let storage = FlakyStorage {
            refuse: vec![collection_file_name(TITLE)],
            ..Default::default()
        };
        let (store, _) = ProfileStore::load(storage, &StaticKeyResolver::default(), "Account");
        let mut store = store.with_clock(fixed_clock);

        let err = store
            .activate_title(&catalogue(TITLE, vec![Achievement::new(1, "A", 5)]))
            .unwrap_err();
        assert!(matches!(err, ProfileError::WriteFailed { .. }));
        let dash = persisted_dashboard(&store.storage().inner);
        let summary = dash.get_title(TITLE).unwrap();
        assert_eq!(summary.achievements_possible, 1);
        assert_eq!(summary.last_played, fixed_clock());

        let mut store = store.with_clock(later_clock);
        let grown = catalogue(
            TITLE,
            vec![Achievement::new(1, "A", 5), Achievement::new(2, "B", 10)],
        );
        assert!(store.activate_title(&grown).is_err());
        let dash = persisted_dashboard(&store.storage().inner);
        let summary = dash.get_title(TITLE).unwrap();
        assert_eq!(summary.achievements_possible, 2);
        assert_eq!(summary.gamerscore_total, 15);
        assert_eq!(summary.last_played, later_clock());
        assert!(store.storage().inner.get(&collection_file_name(TITLE)).is_none());
    }

    #[test]
    fn dashboard_listing_itself_is_skipped() {
        let mut dashboard = GpdFile::dashboard();
        dashboard.update_title(TitlePlayed::new(DASHBOARD_ID, "Dashboard"));
        let mut storage = MemoryStorage::new();
        storage
            .write(&dashboard_file_name(), &dashboard.to_bytes().unwrap())
            .unwrap();

        let (store, report) = ProfileStore::load(storage, &StaticKeyResolver::default(), "Account");
        assert!(report.titles_loaded.is_empty());
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].title_id, DASHBOARD_ID);
        assert_eq!(
            report.skipped[0].reason,
            SkipReason::Corrupt("reserved id".to_string())
        );
        assert_eq!(store.titles().count(), 0);
        assert_eq!(store.unloaded_titles().count(), 0);

        let mut store = store.with_clock(fixed_clock);
        store
            .activate_title(&catalogue(TITLE, vec![Achievement::new(1, "A", 5)]))
            .unwrap();
        let persisted = store.persist_all();
        assert_eq!(persisted.written, vec![TITLE]);
        assert!(persisted_dashboard(store.storage()).get_title(TITLE).is_some());

        let err = store.persist_title(TitleRef::Id(DASHBOARD_ID)).unwrap_err();
        assert!(matches!(err, ProfileError::ReservedTitle(DASHBOARD_ID)));
        assert!(persisted_dashboard(store.storage()).get_title(TITLE).is_some());
    }

    #[test]
    fn reseal_account_then_reload() {
        let keys = StaticKeyResolver::default().with_devkit([0x42; 16]);
        let mut store = empty_store();
        let info = AccountInfo::new(0xE000_0000_0000_1234, "Resealed").unwrap();

        store
            .reseal_account(&keys, KeyVariant::Devkit, info.clone())
            .unwrap();
        assert_eq!(store.account(), &info);

        let storage = store.storage().clone();
        let (reloaded, report) = ProfileStore::load(storage, &keys, "Account");
        assert_eq!(report.account, AccountLoad::Unsealed(KeyVariant::Devkit));
        assert_eq!(reloaded.account().gamertag(), "Resealed");
    }

    #[test]
    fn reseal_without_key_is_reported() {
        let mut store = empty_store();
        let info = AccountInfo::new(1, "NoKey").unwrap();
        let err = store
            .reseal_account(&StaticKeyResolver::default(), KeyVariant::Retail, info)
            .unwrap_err();
        assert!(matches!(
            err,
            ProfileError::Account(AccountError::MissingKey { .. })
        ));
        assert_eq!(store.account().gamertag(), PLACEHOLDER_GAMERTAG);
    }
}
