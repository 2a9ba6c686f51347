//! Source tree enumeration and destination mapping
//!
//! The source root holds one directory per [`Category`]. Each category
//! contributes files according to its [`EnumerationScope`], and every file is
//! mapped to `<category root>/<output name>/<path relative to the category
//! directory>`.

use crate::task::Task;
use stagecopy_config::DestinationConfig;
use stagecopy_types::{Category, EnumerationScope, Error, Result, RunMode};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::task::JoinSet;
use tracing::{debug, error, info};
use walkdir::WalkDir;

/// Tasks discovered for one batch
#[derive(Debug, Clone, Default)]
pub struct BatchPlan {
    /// Every task, grouped by category and sorted by source path
    pub tasks: Vec<Task>,
    /// Number of files found per category
    pub per_category: BTreeMap<Category, usize>,
}

impl BatchPlan {
    /// Total number of files
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no file was found
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Maps a staged source tree onto destination roots
#[derive(Debug, Clone)]
pub struct Catalog {
    source_root: PathBuf,
    output_name: String,
    mode: RunMode,
    destinations: DestinationConfig,
}

impl Catalog {
    /// Create a catalog for `source_root` writing into `output_name` under each root
    pub fn new<P: Into<PathBuf>, S: Into<String>>(
        source_root: P,
        output_name: S,
        mode: RunMode,
        destinations: DestinationConfig,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            output_name: output_name.into(),
            mode,
            destinations,
        }
    }

    /// Directory holding `category` under the source root
    pub fn category_dir(&self, category: Category) -> PathBuf {
        self.source_root.join(category.source_dir_name())
    }

    /// Fail with the first category whose directory is missing
    pub fn verify_source_tree(&self) -> Result<()> {
        for category in Category::ALL {
            let dir = self.category_dir(category);
            if !dir.is_dir() {
                error!("Directory {} could not be found", dir.display());
                return Err(Error::MissingSourceDirectory {
                    category: category.to_string(),
                    path: dir,
                });
            }
        }
        Ok(())
    }

    /// Destination for `file`, which must live under the category directory
    pub fn destination_for(&self, category: Category, file: &Path) -> Result<PathBuf> {
        let category_dir = self.category_dir(category);
        let relative = file.strip_prefix(&category_dir).map_err(|_| {
            Error::other(format!(
                "{} is not inside {}",
                file.display(),
                category_dir.display()
            ))
        })?;
        let root = self.destinations.resolve(category, self.mode)?;
        Ok(root.join(&self.output_name).join(relative))
    }

    /// Verify the tree, enumerate every category concurrently and build the batch.
    ///
    /// Nothing is returned unless every category directory exists and every
    /// destination root is configured.
    pub async fn plan(&self) -> Result<BatchPlan> {
        if self.output_name.trim().is_empty() {
            return Err(Error::config("Output directory name must not be empty"));
        }
        self.verify_source_tree()?;
        self.destinations.ensure_complete(self.mode)?;

        let mut enumerations = JoinSet::new();
        for category in Category::ALL {
            let dir = self.category_dir(category);
            enumerations.spawn_blocking(move || {
                enumerate(&dir, category.scope()).map(|files| (category, files))
            });
        }

        let mut found = Vec::with_capacity(Category::ALL.len());
        while let Some(joined) = enumerations.join_next().await {
            let (category, files) = joined
                .map_err(|e| Error::other(format!("Enumeration task failed: {}", e)))??;
            debug!("Found {} files in {}", files.len(), category);
            found.push((category, files));
        }
        found.sort_by_key(|(category, _)| *category);

        let mut plan = BatchPlan::default();
        for (category, files) in found {
            plan.per_category.insert(category, files.len());
            for file in files {
                let destination = self.destination_for(category, &file)?;
                plan.tasks.push(Task::new(category, file, destination));
            }
        }

        info!(
            "Planned {} files from {} ({} run)",
            plan.len(),
            self.source_root.display(),
            self.mode
        );
        Ok(plan)
    }
}

/// Files under `dir` that fall within `scope`, sorted by path
fn enumerate(dir: &Path, scope: EnumerationScope) -> Result<Vec<PathBuf>> {
    let mut walker = WalkDir::new(dir)
        .min_depth(scope.min_depth())
        .sort_by_file_name();
    if let Some(max_depth) = scope.max_depth() {
        walker = walker.max_depth(max_depth);
    }

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| {
            Error::other(format!("Failed to enumerate {}: {}", dir.display(), e))
        })?;
        if entry.file_type().is_file() && scope.includes_depth(entry.depth()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    /// Lays out every category with a top-level file, a child-directory file
    /// and a grandchild-directory file.
    fn staged_tree() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        for category in Category::ALL {
            let dir = temp_dir.path().join(category.source_dir_name());
            let nested = dir.join("child").join("grandchild");
            fs::create_dir_all(&nested).unwrap();
            fs::write(dir.join("top.pdf"), b"top").unwrap();
            fs::write(dir.join("child").join("mid.pdf"), b"mid").unwrap();
            fs::write(nested.join("deep.pdf"), b"deep").unwrap();
        }
        temp_dir
    }

    fn catalog(root: &Path, mode: RunMode) -> Catalog {
        Catalog::new(root, "2024-06", mode, DestinationConfig::default())
    }

    fn names(plan: &BatchPlan, category: Category) -> Vec<String> {
        plan.tasks
            .iter()
            .filter(|t| t.category() == category)
            .map(|t| t.source().file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[rstest]
    #[case(Category::NcBranch, &["top.pdf", "mid.pdf"])]
    #[case(Category::NcAgency, &["mid.pdf"])]
    #[case(Category::NmAgency, &["mid.pdf", "deep.pdf"])]
    #[case(Category::Srcn, &["top.pdf"])]
    #[case(Category::Mbdot, &["top.pdf", "mid.pdf"])]
    #[tokio::test]
    async fn test_scope_per_category(#[case] category: Category, #[case] expected: &[&str]) {
        let tree = staged_tree();
        let plan = catalog(tree.path(), RunMode::Test).plan().await.unwrap();

        let mut found = names(&plan, category);
        found.sort();
        let mut expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
        expected.sort();
        assert_eq!(found, expected);
        assert_eq!(plan.per_category[&category], expected.len());
    }

    #[tokio::test]
    async fn test_destination_keeps_relative_path() {
        let tree = staged_tree();
        let plan = catalog(tree.path(), RunMode::Test).plan().await.unwrap();

        let deep = plan
            .tasks
            .iter()
            .find(|t| t.category() == Category::NmAgency && t.source().ends_with("deep.pdf"))
            .unwrap();
        assert_eq!(
            deep.destination(),
            Path::new("staging-test/NM Agencies/2024-06/child/grandchild/deep.pdf")
        );
    }

    #[tokio::test]
    async fn test_missing_category_fails_fast() {
        let tree = staged_tree();
        fs::remove_dir_all(tree.path().join("SRCN")).unwrap();

        let err = catalog(tree.path(), RunMode::Test).plan().await.unwrap_err();
        assert!(matches!(
            err,
            Error::MissingSourceDirectory { ref category, .. } if category == "SRCN"
        ));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_unconfigured_production_roots_fail() {
        let tree = staged_tree();
        let err = catalog(tree.path(), RunMode::Production)
            .plan()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), stagecopy_types::ErrorKind::Config);
    }

    #[tokio::test]
    async fn test_empty_output_name_is_rejected() {
        let tree = staged_tree();
        let catalog = Catalog::new(tree.path(), " ", RunMode::Test, DestinationConfig::default());
        assert!(catalog.plan().await.is_err());
    }

    #[test]
    fn test_destination_outside_category_is_rejected() {
        let catalog = catalog(Path::new("/staging"), RunMode::Test);
        assert!(catalog
            .destination_for(Category::Srcn, Path::new("/elsewhere/a.pdf"))
            .is_err());
    }
}
