//! Script Store - Indexes migration scripts on disk
//!
//! Scripts are named `NNNN.MM.mm.<up|down>.sql`: a four-digit file number,
//! two-digit major and minor version and the direction marker. The index is
//! built once per `migrate` call and keyed by file number, so execution order
//! never depends on the order the filesystem lists entries in.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::definitions::{Direction, Migration};
use crate::error::{MigrationError, MigrationResult};
use crate::plan::MigrationPlan;

static SCRIPT_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})\.(\d{2})\.(\d{2})\.(up|down)\.sql$").expect("valid script name pattern")
});

/// A parsed script filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptName {
    pub file_number: u32,
    pub major: u32,
    pub minor: u32,
    pub direction: Direction,
}

impl ScriptName {
    /// Parse a filename, returning `None` when it is not a migration script
    pub fn parse(file_name: &str) -> Option<Self> {
        let caps = SCRIPT_NAME.captures(file_name)?;
        let direction = match &caps[4] {
            "up" => Direction::Up,
            _ => Direction::Down,
        };

        Some(Self {
            file_number: caps[1].parse().ok()?,
            major: caps[2].parse().ok()?,
            minor: caps[3].parse().ok()?,
            direction,
        })
    }

    /// Canonical filename for this script
    pub fn file_name(&self) -> String {
        format!(
            "{:04}.{:02}.{:02}.{}.sql",
            self.file_number, self.major, self.minor, self.direction
        )
    }
}

/// One migration step: a version point and its up/down scripts
#[derive(Debug, Clone)]
pub struct ScriptStep {
    pub version: Migration,
    pub up: Option<PathBuf>,
    pub down: Option<PathBuf>,
}

impl ScriptStep {
    pub fn script(&self, direction: Direction) -> Option<&Path> {
        match direction {
            Direction::Up => self.up.as_deref(),
            Direction::Down => self.down.as_deref(),
        }
    }
}

/// Index of the migrations directory keyed by file number
#[derive(Debug, Clone, Default)]
pub struct ScriptIndex {
    dir: PathBuf,
    steps: BTreeMap<u32, ScriptStep>,
}

impl ScriptIndex {
    /// Scan `dir` and build the index
    pub fn load(dir: impl AsRef<Path>) -> MigrationResult<Self> {
        const OP: &str = "migrator.load_index";
        let dir = dir.as_ref();

        let entries = fs::read_dir(dir).map_err(|e| MigrationError::file_system(OP, dir, e))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| MigrationError::file_system(OP, dir, e))?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                tracing::debug!(path = %entry.path().display(), "skipping non UTF-8 file name");
                continue;
            };

            match ScriptName::parse(file_name) {
                Some(name) => names.push(name),
                None => tracing::debug!(file = file_name, "ignoring non-migration file"),
            }
        }

        let index = Self::from_names(dir, names)?;
        tracing::debug!(
            dir = %dir.display(),
            steps = index.len(),
            "indexed migrations directory"
        );
        Ok(index)
    }

    /// Build an index from already parsed names
    pub fn from_names(
        dir: impl Into<PathBuf>,
        names: impl IntoIterator<Item = ScriptName>,
    ) -> MigrationResult<Self> {
        const OP: &str = "migrator.load_index";
        let dir = dir.into();
        let mut steps: BTreeMap<u32, ScriptStep> = BTreeMap::new();

        for name in names {
            if name.file_number == 0 {
                return Err(MigrationError::planning(
                    OP,
                    format!(
                        "{}: file number 0000 is reserved for the empty schema",
                        name.file_name()
                    ),
                ));
            }

            let path = dir.join(name.file_name());
            let step = steps.entry(name.file_number).or_insert_with(|| ScriptStep {
                version: Migration::new(name.major, name.minor, name.file_number),
                up: None,
                down: None,
            });

            if step.version.major != name.major || step.version.minor != name.minor {
                return Err(MigrationError::planning(
                    OP,
                    format!(
                        "file {:04} is tagged both {:02}.{:02} and {:02}.{:02}",
                        name.file_number, step.version.major, step.version.minor, name.major, name.minor
                    ),
                ));
            }

            let slot = match name.direction {
                Direction::Up => &mut step.up,
                Direction::Down => &mut step.down,
            };
            if slot.is_some() {
                return Err(MigrationError::planning(
                    OP,
                    format!(
                        "duplicate {} script for file {:04}",
                        name.direction, name.file_number
                    ),
                ));
            }
            *slot = Some(path);
        }

        Ok(Self { dir, steps })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Highest file number tagged with `(major, minor)`
    pub fn resolve(&self, major: u32, minor: u32) -> Option<u32> {
        self.steps
            .values()
            .rev()
            .find(|step| step.version.major == major && step.version.minor == minor)
            .map(|step| step.version.file_number)
    }

    pub fn step(&self, file_number: u32) -> Option<&ScriptStep> {
        self.steps.get(&file_number)
    }

    pub fn version_at(&self, file_number: u32) -> Option<Migration> {
        self.steps.get(&file_number).map(|step| step.version)
    }

    /// Version left in place once `file_number` has been reverted
    pub fn previous(&self, file_number: u32) -> Migration {
        self.steps
            .range(..file_number)
            .next_back()
            .map(|(_, step)| step.version)
            .unwrap_or_else(Migration::zero)
    }

    /// Newest step in the directory
    pub fn latest(&self) -> Option<Migration> {
        self.steps.values().next_back().map(|step| step.version)
    }

    pub fn script_path(&self, file_number: u32, direction: Direction) -> Option<&Path> {
        self.steps.get(&file_number)?.script(direction)
    }

    /// File numbers covered by `plan`, in execution order
    pub fn steps(&self, plan: &MigrationPlan) -> Vec<u32> {
        let (low, high) = plan.bounds();
        let numbers = self.steps.range(low..=high).map(|(number, _)| *number);

        match plan.direction {
            Direction::Up => numbers.collect(),
            Direction::Down => numbers.rev().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_scripts(dir: &Path, names: &[&str]) {
        for name in names {
            fs::write(dir.join(name), format!("-- {}", name)).unwrap();
        }
    }

    #[test]
    fn test_parse_script_name() {
        let name = ScriptName::parse("0003.00.01.down.sql").unwrap();
        assert_eq!(name.file_number, 3);
        assert_eq!(name.major, 0);
        assert_eq!(name.minor, 1);
        assert_eq!(name.direction, Direction::Down);
        assert_eq!(name.file_name(), "0003.00.01.down.sql");

        assert!(ScriptName::parse("README.md").is_none());
        assert!(ScriptName::parse("3.0.1.up.sql").is_none());
        assert!(ScriptName::parse("0003.00.01.sideways.sql").is_none());
        assert!(ScriptName::parse("0003.00.01.up.sql.bak").is_none());
    }

    #[test]
    fn test_load_ignores_unrelated_files() {
        let temp_dir = TempDir::new().unwrap();
        write_scripts(
            temp_dir.path(),
            &["0001.00.00.up.sql", "0001.00.00.down.sql", "notes.txt", "0002.00.00.up.sql"],
        );

        let index = ScriptIndex::load(temp_dir.path()).unwrap();
        assert_eq!(index.len(), 2);
        assert!(index.script_path(1, Direction::Down).is_some());
        assert!(index.script_path(2, Direction::Down).is_none());
        assert_eq!(index.dir(), temp_dir.path());
    }

    #[test]
    fn test_load_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let err = ScriptIndex::load(temp_dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, MigrationError::FileSystem { .. }));
    }

    #[test]
    fn test_resolve_picks_highest_matching_file() {
        let temp_dir = TempDir::new().unwrap();
        write_scripts(
            temp_dir.path(),
            &[
                "0001.00.00.up.sql",
                "0002.00.00.up.sql",
                "0003.00.01.up.sql",
                "0004.01.00.up.sql",
            ],
        );

        let index = ScriptIndex::load(temp_dir.path()).unwrap();
        assert_eq!(index.resolve(0, 0), Some(2));
        assert_eq!(index.resolve(0, 1), Some(3));
        assert_eq!(index.resolve(1, 0), Some(4));
        assert_eq!(index.resolve(2, 0), None);
        assert_eq!(index.latest(), Some(Migration::new(1, 0, 4)));
    }

    #[test]
    fn test_duplicate_direction_rejected() {
        let names = vec![
            ScriptName::parse("0002.00.00.up.sql").unwrap(),
            ScriptName::parse("0002.00.00.up.sql").unwrap(),
        ];
        let err = ScriptIndex::from_names("migrations", names).unwrap_err();
        assert!(matches!(err, MigrationError::Planning { .. }));
        assert!(err.to_string().contains("duplicate up script for file 0002"));
    }

    #[test]
    fn test_conflicting_versions_rejected() {
        let temp_dir = TempDir::new().unwrap();
        write_scripts(temp_dir.path(), &["0002.00.00.up.sql", "0002.00.01.down.sql"]);

        let err = ScriptIndex::load(temp_dir.path()).unwrap_err();
        assert!(err.to_string().contains("tagged both 00.00 and 00.01"));
    }

    #[test]
    fn test_file_number_zero_rejected() {
        let names = vec![ScriptName::parse("0000.00.00.up.sql").unwrap()];
        assert!(ScriptIndex::from_names("migrations", names).is_err());
    }

    #[test]
    fn test_previous_skips_gaps() {
        let names = ["0001.00.00.up.sql", "0002.00.01.up.sql", "0005.00.02.up.sql"]
            .iter()
            .filter_map(|n| ScriptName::parse(n));
        let index = ScriptIndex::from_names("migrations", names).unwrap();

        assert_eq!(index.previous(5), Migration::new(0, 1, 2));
        assert_eq!(index.previous(2), Migration::new(0, 0, 1));
        assert_eq!(index.previous(1), Migration::zero());
    }

    #[test]
    fn test_steps_follow_plan_order() {
        let names = [
            "0001.00.00.up.sql",
            "0002.00.00.up.sql",
            "0003.00.01.up.sql",
            "0004.00.01.up.sql",
        ]
        .iter()
        .filter_map(|n| ScriptName::parse(n));
        let index = ScriptIndex::from_names("migrations", names).unwrap();

        let up = MigrationPlan {
            direction: Direction::Up,
            first: 2,
            last: 4,
        };
        assert_eq!(index.steps(&up), vec![2, 3, 4]);

        let down = MigrationPlan {
            direction: Direction::Down,
            first: 4,
            last: 2,
        };
        assert_eq!(index.steps(&down), vec![4, 3, 2]);
    }
}
