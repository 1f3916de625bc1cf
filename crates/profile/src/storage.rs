use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use xprofile_gpd::DASHBOARD_ID;

/// File name of a collection: the title id in upper-case hex.
#[must_use]
pub fn collection_file_name(title_id: u32) -> String {
    format!("{title_id:X}.gpd")
}

#[must_use]
pub fn dashboard_file_name() -> String {
    collection_file_name(DASHBOARD_ID)
}

/// Named-blob storage backing one profile.
pub trait ProfileStorage {
    /// Read a whole file; `Ok(None)` when it does not exist.
    fn read(&self, name: &str) -> io::Result<Option<Vec<u8>>>;

    /// Create or replace a file with exactly `bytes`.
    fn write(&mut self, name: &str, bytes: &[u8]) -> io::Result<()>;
}

/// Profile files stored flat inside one directory.
///
/// Writes go to `<name>.tmp`, preallocated to the final size, then renamed over
/// the target. A crash mid-write leaves the previous file in place.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn ensure_dir(&self) -> io::Result<()> {
        if !self.root.is_dir() {
            log::info!("Creating profile directory {}", self.root.display());
            fs::create_dir_all(&self.root)?;
        }
        Ok(())
    }
}

impl ProfileStorage for FsStorage {
    fn read(&self, name: &str) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(name)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn write(&mut self, name: &str, bytes: &[u8]) -> io::Result<()> {
        self.ensure_dir()?;
        let path = self.path_for(name);
        let tmp = self.root.join(format!("{name}.tmp"));

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)?;
        if !bytes.is_empty() {
            if let Err(err) = file.allocate(bytes.len() as u64) {
                // Not every filesystem supports preallocation.
                log::debug!("Preallocating {} failed: {err}", tmp.display());
            }
        }
        let result = file.write_all(bytes).and_then(|()| file.sync_all());
        drop(file);
        if let Err(err) = result {
            let _ = fs::remove_file(&tmp);
            return Err(err);
        }

        if let Err(err) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(err);
        }
        Ok(())
    }
}

/// In-memory storage for tools and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.files.insert(name.into(), bytes);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }
}

impl ProfileStorage for MemoryStorage {
    fn read(&self, name: &str) -> io::Result<Option<Vec<u8>>> {
        Ok(self.files.get(name).cloned())
    }

    fn write(&mut self, name: &str, bytes: &[u8]) -> io::Result<()> {
        self.files.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }
}
