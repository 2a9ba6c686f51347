//! Staged trees and transfer doubles

use async_trait::async_trait;
use stagecopy_config::{CategoryRoots, DestinationConfig};
use stagecopy_engine::LocalTransfer;
use stagecopy_types::{Category, Error, FileTransfer, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tempfile::TempDir;
use walkdir::WalkDir;

/// A staging tree and a destination tree living in one temporary directory
pub struct Staging {
    temp_dir: TempDir,
}

impl Staging {
    /// Create an empty staging area with every category directory present
    pub fn new() -> std::io::Result<Self> {
        let temp_dir = TempDir::new()?;
        for category in Category::ALL {
            fs::create_dir_all(temp_dir.path().join("source").join(category.source_dir_name()))?;
        }
        Ok(Self { temp_dir })
    }

    /// Root holding the category directories
    pub fn source_root(&self) -> PathBuf {
        self.temp_dir.path().join("source")
    }

    /// Directory for `category` under the source root
    pub fn category_dir(&self, category: Category) -> PathBuf {
        self.source_root().join(category.source_dir_name())
    }

    /// Write `contents` at `relative` inside the category directory
    pub fn stage(&self, category: Category, relative: &str, contents: &[u8]) -> std::io::Result<PathBuf> {
        let path = self.category_dir(category).join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// Destination root used for `category` in both run modes
    pub fn destination_root(&self, category: Category) -> PathBuf {
        self.temp_dir
            .path()
            .join("dest")
            .join(category.source_dir_name())
    }

    /// Destinations pointing both run modes into this staging area
    pub fn destinations(&self) -> DestinationConfig {
        let roots = CategoryRoots {
            nc_branch: self.destination_root(Category::NcBranch),
            nc_agency: self.destination_root(Category::NcAgency),
            nm_agency: self.destination_root(Category::NmAgency),
            srcn: self.destination_root(Category::Srcn),
            mbdot: self.destination_root(Category::Mbdot),
        };
        DestinationConfig {
            test: roots.clone(),
            production: roots,
        }
    }

    /// Scratch path outside both trees
    pub fn scratch(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }
}

/// Count every regular file below `dir`
pub fn count_files(dir: &Path) -> usize {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .count()
}

/// [`LocalTransfer`] where chosen sources fail a set number of times
#[derive(Debug, Default)]
pub struct FlakyTransfer {
    failures: Mutex<HashMap<PathBuf, u32>>,
    directory_creations: AtomicUsize,
    copy_calls: AtomicUsize,
}

impl FlakyTransfer {
    /// Make copies of `source` fail `times` times before succeeding
    pub fn fail(self, source: impl Into<PathBuf>, times: u32) -> Self {
        self.failures
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(source.into(), times);
        self
    }

    /// Number of directories actually created
    pub fn directory_creations(&self) -> usize {
        self.directory_creations.load(Ordering::SeqCst)
    }

    /// Number of copy attempts, failed or not
    pub fn copy_calls(&self) -> usize {
        self.copy_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileTransfer for FlakyTransfer {
    async fn ensure_directory(&self, dir: &Path) -> Result<bool> {
        let created = LocalTransfer.ensure_directory(dir).await?;
        if created {
            self.directory_creations.fetch_add(1, Ordering::SeqCst);
        }
        Ok(created)
    }

    async fn copy_file(&self, source: &Path, destination: &Path) -> Result<u64> {
        self.copy_calls.fetch_add(1, Ordering::SeqCst);
        {
            let mut failures = self
                .failures
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if let Some(remaining) = failures.get_mut(source) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(Error::transfer(source, "share unavailable"));
                }
            }
        }
        LocalTransfer.copy_file(source, destination).await
    }
}
