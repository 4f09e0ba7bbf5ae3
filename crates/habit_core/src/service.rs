use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::{
    error::{HabitError, Result, StorageError},
    habit::{self, Habit, HabitId, HabitInput, HabitPatch},
    notifications::{HabitChange, HabitListener},
    storage::{FileStore, KeyValueStore, MemoryStore},
    streak::{self, DayCompletion, ProgressSummary},
};

/// Key under which the whole collection is persisted.
pub const HABITS_KEY: &str = "habits";

/// Result of a mutation that did not fail to persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Unchanged,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadSource {
    Persisted,
    Seeded { reason: SeedReason },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedReason {
    Missing,
    Unreadable(String),
}

struct HabitState {
    habits: Vec<Habit>,
    last_id: u64,
}

impl HabitState {
    fn new(habits: Vec<Habit>) -> Self {
        let last_id = habits
            .iter()
            .filter_map(|habit| habit.id.numeric())
            .max()
            .unwrap_or(0);
        Self { habits, last_id }
    }

    /// Millisecond timestamps, bumped so ids stay strictly increasing.
    fn next_id(&mut self, now: DateTime<Utc>) -> HabitId {
        let candidate = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        let Some(floor) = self.last_id.checked_add(1) else {
            return self.unused_id(candidate);
        };
        let next = candidate.max(floor);
        self.last_id = next;
        HabitId::new(next.to_string())
    }

    /// Used once `u64::MAX` is taken: first free numeric id from `start`,
    /// wrapping around to 0.
    fn unused_id(&self, start: u64) -> HabitId {
        let taken: HashSet<&str> = self.habits.iter().map(|habit| habit.id.as_str()).collect();
        (start..=u64::MAX)
            .chain(0..start)
            .map(|n| n.to_string())
            .find(|id| !taken.contains(id.as_str()))
            .map(HabitId::new)
            .unwrap_or_else(|| HabitId::new(format!("{start}-{}", self.habits.len())))
    }

    /// Swaps in `habits` without letting ids handed out so far be reused.
    fn replace(&mut self, habits: Vec<Habit>) {
        let last_id = self.last_id;
        *self = Self::new(habits);
        self.last_id = self.last_id.max(last_id);
    }

    fn find_mut(&mut self, id: &HabitId) -> Option<&mut Habit> {
        self.habits.iter_mut().find(|habit| &habit.id == id)
    }
}

/// Owns the habit collection and keeps the backing store in step with it.
pub struct HabitService {
    store: Arc<dyn KeyValueStore>,
    state: RwLock<HabitState>,
    listeners: RwLock<Vec<Box<dyn HabitListener>>>,
    seed: Option<Vec<Habit>>,
    load_source: LoadSource,
}

pub struct HabitServiceBuilder {
    store: Option<Arc<dyn KeyValueStore>>,
    listeners: Vec<Box<dyn HabitListener>>,
    seed: Option<Vec<Habit>>,
}

impl HabitServiceBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            listeners: Vec::new(),
            seed: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_data_dir(self, path: impl AsRef<Path>) -> Self {
        self.with_store(Arc::new(FileStore::new(path)))
    }

    pub fn with_listener(mut self, listener: Box<dyn HabitListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Replaces the example habits used when nothing usable is persisted.
    pub fn with_seed(mut self, habits: Vec<Habit>) -> Self {
        self.seed = Some(habits);
        self
    }

    #[instrument(skip(self))]
    pub fn build(self) -> Result<HabitService> {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));

        let (habits, load_source) = match load_habits(store.as_ref()) {
            Ok(habits) => (habits, LoadSource::Persisted),
            Err(reason) => (seed_habits(self.seed.as_deref()), LoadSource::Seeded { reason }),
        };

        let service = HabitService {
            store,
            state: RwLock::new(HabitState::new(habits)),
            listeners: RwLock::new(self.listeners),
            seed: self.seed,
            load_source,
        };

        if let LoadSource::Seeded { reason } = &service.load_source {
            info!(?reason, "seeding habits with defaults");
            if let Err(err) = service.flush() {
                warn!(%err, "unable to write seeded habits");
            }
        }
        Ok(service)
    }
}

impl Default for HabitServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn seed_habits(seed: Option<&[Habit]>) -> Vec<Habit> {
    match seed {
        Some(habits) => habits.to_vec(),
        None => habit::default_habits(Utc::now(), streak::local_today()),
    }
}

fn load_habits(store: &dyn KeyValueStore) -> std::result::Result<Vec<Habit>, SeedReason> {
    let raw = match store.get(HABITS_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Err(SeedReason::Missing),
        Err(err) => {
            warn!(%err, "unable to read persisted habits");
            return Err(SeedReason::Unreadable(err.to_string()));
        }
    };
    let parsed: Vec<Habit> = serde_json::from_str(&raw).map_err(|err| {
        warn!(%err, "persisted habits are corrupt");
        SeedReason::Unreadable(err.to_string())
    })?;

    let mut seen = HashSet::new();
    let mut habits = Vec::with_capacity(parsed.len());
    for habit in parsed {
        if seen.insert(habit.id.clone()) {
            habits.push(habit);
        } else {
            warn!(id = %habit.id, "dropping habit with duplicate id");
        }
    }
    Ok(habits)
}

impl HabitService {
    pub fn builder() -> HabitServiceBuilder {
        HabitServiceBuilder::new()
    }

    pub fn load_source(&self) -> &LoadSource {
        &self.load_source
    }

    pub fn store(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.store)
    }

    pub fn subscribe(&self, listener: Box<dyn HabitListener>) {
        self.listeners.write().push(listener);
    }

    pub fn add_habit(&self, input: HabitInput) -> Result<Habit> {
        self.add_habit_at(input, Utc::now())
    }

    pub fn add_habit_at(&self, input: HabitInput, created_at: DateTime<Utc>) -> Result<Habit> {
        self.commit(|state| {
            let id = state.next_id(created_at);
            let habit = Habit::from_input(id.clone(), input, created_at);
            debug!(id = %id, name = %habit.name, "adding habit");
            state.habits.push(habit.clone());
            (habit, Some(HabitChange::Added(id)))
        })
    }

    pub fn update_habit(&self, id: &HabitId, patch: &HabitPatch) -> Result<Outcome> {
        self.commit(|state| {
            let Some(habit) = state.find_mut(id) else {
                return (Outcome::NotFound, None);
            };
            if !patch.apply(habit) {
                return (Outcome::Unchanged, None);
            }
            debug!(id = %id, "updated habit");
            (Outcome::Applied, Some(HabitChange::Updated(id.clone())))
        })
    }

    pub fn delete_habit(&self, id: &HabitId) -> Result<Outcome> {
        self.commit(|state| {
            let before = state.habits.len();
            state.habits.retain(|habit| &habit.id != id);
            if state.habits.len() == before {
                return (Outcome::NotFound, None);
            }
            debug!(id = %id, "deleted habit");
            (Outcome::Applied, Some(HabitChange::Deleted(id.clone())))
        })
    }

    pub fn complete_habit(&self, id: &HabitId, date: NaiveDate) -> Result<Outcome> {
        self.commit(|state| {
            let Some(habit) = state.find_mut(id) else {
                return (Outcome::NotFound, None);
            };
            if !habit.completed_dates.insert(date) {
                return (Outcome::Unchanged, None);
            }
            debug!(id = %id, %date, "marked habit complete");
            let change = HabitChange::Completed {
                id: id.clone(),
                date,
            };
            (Outcome::Applied, Some(change))
        })
    }

    pub fn uncomplete_habit(&self, id: &HabitId, date: NaiveDate) -> Result<Outcome> {
        self.commit(|state| {
            let Some(habit) = state.find_mut(id) else {
                return (Outcome::NotFound, None);
            };
            if !habit.completed_dates.remove(&date) {
                return (Outcome::Unchanged, None);
            }
            debug!(id = %id, %date, "cleared habit completion");
            let change = HabitChange::Uncompleted {
                id: id.clone(),
                date,
            };
            (Outcome::Applied, Some(change))
        })
    }

    /// Completes `id` on `date`, or clears it if it was already complete.
    pub fn toggle_habit(&self, id: &HabitId, date: NaiveDate) -> Result<Outcome> {
        self.commit(|state| {
            let Some(habit) = state.find_mut(id) else {
                return (Outcome::NotFound, None);
            };
            let id = id.clone();
            let change = if habit.completed_dates.remove(&date) {
                HabitChange::Uncompleted { id, date }
            } else {
                habit.completed_dates.insert(date);
                HabitChange::Completed { id, date }
            };
            debug!(?change, "toggled habit completion");
            (Outcome::Applied, Some(change))
        })
    }

    /// Throws away every habit and completion and starts over from the seed.
    #[instrument(skip(self))]
    pub fn reset(&self) -> Result<()> {
        let seed = seed_habits(self.seed.as_deref());
        self.commit(|state| {
            info!(habits = seed.len(), "resetting habits to seed");
            state.replace(seed);
            ((), Some(HabitChange::Reset))
        })
    }

    /// Rewrites the current snapshot. Safe to call again after a failed write.
    pub fn flush(&self) -> Result<()> {
        let state = self.state.read();
        write_snapshot(self.store.as_ref(), &state.habits)?;
        Ok(())
    }

    pub fn habits(&self) -> Vec<Habit> {
        self.state.read().habits.clone()
    }

    pub fn habit(&self, id: &HabitId) -> Option<Habit> {
        self.state
            .read()
            .habits
            .iter()
            .find(|habit| &habit.id == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.state.read().habits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Streak for `id`; 0 for unknown ids.
    pub fn streak_count(&self, id: &HabitId, today: NaiveDate) -> u32 {
        self.state
            .read()
            .habits
            .iter()
            .find(|habit| &habit.id == id)
            .map(|habit| streak::streak_count(habit, today))
            .unwrap_or(0)
    }

    /// Ids of habits completed on `date`, in collection order.
    pub fn completed_for_date(&self, date: NaiveDate) -> Vec<HabitId> {
        self.state
            .read()
            .habits
            .iter()
            .filter(|habit| habit.is_completed_on(date))
            .map(|habit| habit.id.clone())
            .collect()
    }

    pub fn completion_ratio_for_date(&self, date: NaiveDate) -> f64 {
        streak::completion_ratio_for_date(&self.state.read().habits, date)
    }

    pub fn longest_streak(&self, today: NaiveDate) -> u32 {
        streak::longest_streak(&self.state.read().habits, today)
    }

    pub fn completion_rate(&self, today: NaiveDate) -> u32 {
        streak::completion_rate(&self.state.read().habits, today)
    }

    pub fn rolling_window(&self, today: NaiveDate, window_days: usize) -> Vec<DayCompletion> {
        streak::rolling_window(&self.state.read().habits, today, window_days)
    }

    pub fn month_overview(&self, year: i32, month: u32) -> Vec<DayCompletion> {
        streak::month_overview(&self.state.read().habits, year, month)
    }

    pub fn summary(&self, today: NaiveDate) -> ProgressSummary {
        streak::summarize(&self.state.read().habits, today)
    }
}

impl HabitService {
    /// Applies `op` and writes the snapshot under one write lock, then
    /// notifies listeners once the lock is released. A failed write is
    /// returned after notification; the in-memory change stands either way.
    fn commit<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&mut HabitState) -> (T, Option<HabitChange>),
    {
        let (outcome, change, snapshot, written) = {
            let mut state = self.state.write();
            let (outcome, change) = op(&mut *state);
            let written = write_snapshot(self.store.as_ref(), &state.habits);
            let snapshot = change.as_ref().map(|_| state.habits.clone());
            (outcome, change, snapshot, written)
        };

        if let (Some(change), Some(habits)) = (change, snapshot) {
            for listener in self.listeners.read().iter() {
                listener.habits_changed(&change, &habits);
            }
        }

        written.map_err(|err| {
            warn!(%err, "habit snapshot write failed");
            HabitError::Persistence(err)
        })?;
        Ok(outcome)
    }
}

fn write_snapshot(
    store: &dyn KeyValueStore,
    habits: &[Habit],
) -> std::result::Result<(), StorageError> {
    let payload = serde_json::to_string(habits)?;
    store.set(HABITS_KEY, &payload)
}
