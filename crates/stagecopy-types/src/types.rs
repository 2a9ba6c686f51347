//! Source-tree categories and transfer results

use std::fmt;

/// Classification of a staged file, one per top-level source directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Category {
    /// North Carolina branch statements
    NcBranch,
    /// North Carolina agency statements
    NcAgency,
    /// New Mexico agency statements
    NmAgency,
    /// SRCN statements
    Srcn,
    /// MBDOT statements
    Mbdot,
}

impl Category {
    /// Every category, in load order
    pub const ALL: [Self; 5] = [
        Self::NcBranch,
        Self::NcAgency,
        Self::NmAgency,
        Self::Srcn,
        Self::Mbdot,
    ];

    /// Name of the directory under the source root holding this category
    pub fn source_dir_name(self) -> &'static str {
        match self {
            Self::NcBranch => "NC Branches",
            Self::NcAgency => "NC Agencies",
            Self::NmAgency => "NM Agencies",
            Self::Srcn => "SRCN",
            Self::Mbdot => "MBDOT",
        }
    }

    /// Which files under the category directory are scheduled
    pub fn scope(self) -> EnumerationScope {
        match self {
            Self::NcBranch | Self::Mbdot => EnumerationScope::TopLevelAndChildren,
            Self::NcAgency => EnumerationScope::ChildDirectories,
            Self::NmAgency => EnumerationScope::NestedDirectories,
            Self::Srcn => EnumerationScope::TopLevel,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.source_dir_name())
    }
}

/// Which depths of a category directory contribute files.
///
/// Depth is counted from the category directory: its own files sit at depth 1,
/// files inside its immediate subdirectories at depth 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumerationScope {
    /// Files directly in the category directory
    TopLevel,
    /// Files directly inside each immediate subdirectory
    ChildDirectories,
    /// Both of the above
    TopLevelAndChildren,
    /// Files in every subdirectory at any depth, excluding top-level files
    NestedDirectories,
}

impl EnumerationScope {
    /// Shallowest depth that contributes files
    pub fn min_depth(self) -> usize {
        match self {
            Self::TopLevel | Self::TopLevelAndChildren => 1,
            Self::ChildDirectories | Self::NestedDirectories => 2,
        }
    }

    /// Deepest depth that contributes files, `None` when unbounded
    pub fn max_depth(self) -> Option<usize> {
        match self {
            Self::TopLevel => Some(1),
            Self::ChildDirectories | Self::TopLevelAndChildren => Some(2),
            Self::NestedDirectories => None,
        }
    }

    /// Whether a file found at `depth` belongs to the scope
    pub fn includes_depth(self, depth: usize) -> bool {
        depth >= self.min_depth() && self.max_depth().map_or(true, |max| depth <= max)
    }
}

/// Result of one successful file transfer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferOutcome {
    /// Bytes written to the destination
    pub bytes_copied: u64,
    /// Whether the destination directory had to be created first
    pub directory_created: bool,
}
