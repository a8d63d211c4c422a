//! Range Planner - Computes which steps move the schema to the target
//!
//! `current.file_number` always names the last applied step. Moving up runs
//! `(current, target]` in ascending order; moving down reverts
//! `(target, current]` in descending order.

use serde::Serialize;

use crate::definitions::{Direction, Migration};
use crate::error::{MigrationError, MigrationResult};
use crate::store::ScriptIndex;

/// Inclusive range of file numbers in execution order
///
/// For `Up` plans `first <= last`; for `Down` plans `first >= last`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MigrationPlan {
    pub direction: Direction,
    /// First file executed
    pub first: u32,
    /// Last file executed
    pub last: u32,
}

impl MigrationPlan {
    /// `(low, high)` regardless of direction
    pub fn bounds(&self) -> (u32, u32) {
        match self.direction {
            Direction::Up => (self.first, self.last),
            Direction::Down => (self.last, self.first),
        }
    }

    pub fn contains(&self, file_number: u32) -> bool {
        let (low, high) = self.bounds();
        (low..=high).contains(&file_number)
    }

    /// Check every step in range has a script for the plan's direction
    pub fn validate(&self, index: &ScriptIndex) -> MigrationResult<Vec<u32>> {
        const OP: &str = "migrator.plan";

        let steps = index.steps(self);
        // Both ends that name an existing version must be indexed: the
        // target when moving up, the applied file when moving down.
        let anchor = match self.direction {
            Direction::Up => self.last,
            Direction::Down => self.first,
        };
        if !steps.contains(&anchor) {
            return Err(MigrationError::planning(
                OP,
                format!("file {:04} is not in {}", anchor, index.dir().display()),
            ));
        }

        if let Some(missing) = steps
            .iter()
            .find(|number| index.script_path(**number, self.direction).is_none())
        {
            return Err(MigrationError::planning(
                OP,
                format!("file {:04} has no {} script", missing, self.direction),
            ));
        }

        Ok(steps)
    }
}

/// Plan the move from `current` to `target`; `None` when nothing has to run
pub fn plan(current: &Migration, target: &Migration) -> Option<MigrationPlan> {
    use std::cmp::Ordering;

    match target.file_number.cmp(&current.file_number) {
        Ordering::Greater => Some(MigrationPlan {
            direction: Direction::Up,
            first: current.file_number + 1,
            last: target.file_number,
        }),
        Ordering::Less => Some(MigrationPlan {
            direction: Direction::Down,
            first: current.file_number,
            last: target.file_number + 1,
        }),
        Ordering::Equal => None,
    }
}

/// Resolve the requested `(major, minor)` to the highest matching step
pub fn resolve_target(index: &ScriptIndex, major: u32, minor: u32) -> MigrationResult<Migration> {
    const OP: &str = "migrator.resolve_target";

    index
        .resolve(major, minor)
        .map(|file_number| Migration::new(major, minor, file_number))
        .ok_or_else(|| {
            MigrationError::planning(
                OP,
                format!(
                    "no migration for version {:02}.{:02} in {}",
                    major,
                    minor,
                    index.dir().display()
                ),
            )
        })
}
