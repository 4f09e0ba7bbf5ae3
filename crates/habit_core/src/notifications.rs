use chrono::NaiveDate;

use crate::habit::{Habit, HabitId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HabitChange {
    Added(HabitId),
    Updated(HabitId),
    Deleted(HabitId),
    Completed { id: HabitId, date: NaiveDate },
    Uncompleted { id: HabitId, date: NaiveDate },
    /// The whole collection was replaced by the seed.
    Reset,
}

impl HabitChange {
    pub fn habit_id(&self) -> Option<&HabitId> {
        match self {
            HabitChange::Added(id)
            | HabitChange::Updated(id)
            | HabitChange::Deleted(id)
            | HabitChange::Completed { id, .. }
            | HabitChange::Uncompleted { id, .. } => Some(id),
            HabitChange::Reset => None,
        }
    }
}

/// Front ends implement this to re-render after a mutation. `habits` is the
/// collection as it stood right after `change` was applied.
pub trait HabitListener: Send + Sync {
    fn habits_changed(&self, change: &HabitChange, habits: &[Habit]);
}
