use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::streak;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HabitId(String);

impl HabitId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value of ids minted from a millisecond clock or the seed set.
    pub fn numeric(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl fmt::Display for HabitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HabitId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    #[default]
    Anytime,
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            other => Err(format!("unknown frequency `{other}`")),
        }
    }
}

impl FromStr for TimeOfDay {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "morning" => Ok(Self::Morning),
            "afternoon" => Ok(Self::Afternoon),
            "evening" => Ok(Self::Evening),
            "anytime" => Ok(Self::Anytime),
            other => Err(format!("unknown time of day `{other}`")),
        }
    }
}

/// A tracked habit together with every local date it was completed on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    pub id: HabitId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub icon: String,
    pub color: String,
    pub frequency: Frequency,
    #[serde(default)]
    pub time_of_day: TimeOfDay,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_dates: BTreeSet<NaiveDate>,
}

impl Habit {
    pub fn from_input(id: HabitId, input: HabitInput, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: input.name,
            description: input.description,
            icon: input.icon,
            color: input.color,
            frequency: input.frequency,
            time_of_day: input.time_of_day,
            created_at,
            completed_dates: BTreeSet::new(),
        }
    }

    pub fn is_completed_on(&self, date: NaiveDate) -> bool {
        self.completed_dates.contains(&date)
    }

    /// Calendar date of creation as seen from `tz`.
    pub fn created_on<Tz: TimeZone>(&self, tz: &Tz) -> NaiveDate {
        self.created_at.with_timezone(tz).date_naive()
    }
}

/// Fields supplied by the caller when creating a habit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HabitInput {
    pub name: String,
    pub description: Option<String>,
    pub icon: String,
    pub color: String,
    pub frequency: Frequency,
    pub time_of_day: TimeOfDay,
}

impl HabitInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            icon: "activity".to_string(),
            color: "zen-purple".to_string(),
            frequency: Frequency::Daily,
            time_of_day: TimeOfDay::Anytime,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn with_time_of_day(mut self, time_of_day: TimeOfDay) -> Self {
        self.time_of_day = time_of_day;
        self
    }
}

/// Partial update. Id and creation time are not patchable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HabitPatch {
    pub name: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub frequency: Option<Frequency>,
    pub time_of_day: Option<TimeOfDay>,
    pub completed_dates: Option<BTreeSet<NaiveDate>>,
}

impl HabitPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merges the provided fields into `habit`, returning whether anything changed.
    pub fn apply(&self, habit: &mut Habit) -> bool {
        let before = habit.clone();
        if let Some(name) = &self.name {
            habit.name = name.clone();
        }
        if let Some(description) = &self.description {
            habit.description = description.clone();
        }
        if let Some(icon) = &self.icon {
            habit.icon = icon.clone();
        }
        if let Some(color) = &self.color {
            habit.color = color.clone();
        }
        if let Some(frequency) = self.frequency {
            habit.frequency = frequency;
        }
        if let Some(time_of_day) = self.time_of_day {
            habit.time_of_day = time_of_day;
        }
        if let Some(dates) = &self.completed_dates {
            habit.completed_dates = dates.clone();
        }
        *habit != before
    }
}

/// Example habits used when nothing usable is persisted yet.
pub fn default_habits(now: DateTime<Utc>, today: NaiveDate) -> Vec<Habit> {
    let days_back = |offsets: &[i64]| -> BTreeSet<NaiveDate> {
        offsets
            .iter()
            .map(|offset| today - Duration::days(*offset))
            .collect()
    };
    let seed = |id: &str, name: &str, description: &str, icon: &str, color: &str| Habit {
        id: HabitId::new(id),
        name: name.to_string(),
        description: Some(description.to_string()),
        icon: icon.to_string(),
        color: color.to_string(),
        frequency: Frequency::Daily,
        time_of_day: TimeOfDay::Anytime,
        created_at: now,
        completed_dates: BTreeSet::new(),
    };

    vec![
        Habit {
            time_of_day: TimeOfDay::Morning,
            completed_dates: days_back(&[0, 1, 2]),
            ..seed(
                "1",
                "Meditation",
                "10 minutes of mindfulness meditation",
                "activity",
                "zen-purple",
            )
        },
        Habit {
            time_of_day: TimeOfDay::Evening,
            completed_dates: days_back(&[1]),
            ..seed(
                "2",
                "Journaling",
                "Write about your thoughts and feelings",
                "edit",
                "zen-blue",
            )
        },
        Habit {
            completed_dates: days_back(&[0, 1, 2, 3, 4]),
            ..seed(
                "3",
                "Drink Water",
                "8 glasses of water throughout the day",
                "drop",
                "zen-indigo",
            )
        },
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Streak,
    Recent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(Self::Name),
            "streak" => Ok(Self::Streak),
            "recent" => Ok(Self::Recent),
            other => Err(format!("unknown sort key `{other}`")),
        }
    }
}

/// Keeps habits scheduled for `slot`; `None` keeps everything.
pub fn filter_by_time_of_day(habits: &[Habit], slot: Option<TimeOfDay>) -> Vec<Habit> {
    habits
        .iter()
        .filter(|habit| slot.map_or(true, |slot| habit.time_of_day == slot))
        .cloned()
        .collect()
}

/// Ascending order is: names A–Z, longest streak first, newest first.
pub fn sort_habits(
    habits: &mut [Habit],
    key: SortKey,
    direction: SortDirection,
    today: NaiveDate,
) {
    habits.sort_by(|a, b| {
        let ordering = match key {
            SortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            SortKey::Streak => {
                streak::streak_count(b, today).cmp(&streak::streak_count(a, today))
            }
            SortKey::Recent => b.created_at.cmp(&a.created_at),
        };
        match direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn deserializes_legacy_record_without_optional_fields() {
        let raw = r#"{
            "id": "1717000000000",
            "name": "Stretch",
            "icon": "activity",
            "color": "zen-blue",
            "frequency": "weekly",
            "createdAt": "2024-06-01T08:30:00.000Z",
            "completedDates": ["2024-06-02", "2024-06-01", "2024-06-02"]
        }"#;
        let habit: Habit = serde_json::from_str(raw).expect("parse habit");
        assert_eq!(habit.frequency, Frequency::Weekly);
        assert_eq!(habit.time_of_day, TimeOfDay::Anytime);
        assert!(habit.description.is_none());
        assert_eq!(
            habit.completed_dates.iter().copied().collect::<Vec<_>>(),
            vec![date(2024, 6, 1), date(2024, 6, 2)]
        );
        assert_eq!(habit.created_on(&Utc), date(2024, 6, 1));
    }

    #[test]
    fn serializes_with_camel_case_keys_and_plain_dates() {
        let mut habit = Habit::from_input(
            HabitId::new("42"),
            HabitInput::new("Read").with_time_of_day(TimeOfDay::Evening),
            Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap(),
        );
        habit.completed_dates.insert(date(2024, 1, 11));
        let value = serde_json::to_value(&habit).expect("serialize");
        assert_eq!(value["timeOfDay"], "evening");
        assert_eq!(value["frequency"], "daily");
        assert_eq!(value["completedDates"][0], "2024-01-11");
        assert!(value["createdAt"].as_str().unwrap().starts_with("2024-01-10T12:00:00"));
    }

    #[test]
    fn patch_never_touches_identity() {
        let created = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
        let mut habit = Habit::from_input(HabitId::new("7"), HabitInput::new("Walk"), created);
        let patch = HabitPatch {
            name: Some("Evening walk".into()),
            description: Some(Some("after dinner".into())),
            ..HabitPatch::default()
        };
        assert!(patch.apply(&mut habit));
        assert!(!patch.apply(&mut habit), "re-applying is a no-op");
        assert_eq!(habit.id.as_str(), "7");
        assert_eq!(habit.created_at, created);
        assert_eq!(habit.description.as_deref(), Some("after dinner"));
    }

    #[test]
    fn seed_habits_have_distinct_ids_and_live_streaks() {
        let today = date(2024, 3, 5);
        let habits = default_habits(Utc::now(), today);
        let ids: BTreeSet<_> = habits.iter().map(|h| h.id.clone()).collect();
        assert_eq!(ids.len(), habits.len());
        let streaks: Vec<u32> = habits
            .iter()
            .map(|h| streak::streak_count(h, today))
            .collect();
        assert_eq!(streaks, vec![3, 1, 5]);
    }

    #[test]
    fn filters_and_sorts_like_the_habit_list() {
        let today = date(2024, 3, 5);
        let mut habits = default_habits(Utc::now(), today);
        let evening = filter_by_time_of_day(&habits, Some(TimeOfDay::Evening));
        assert_eq!(evening.len(), 1);
        assert_eq!(evening[0].name, "Journaling");
        assert_eq!(filter_by_time_of_day(&habits, None).len(), 3);

        sort_habits(&mut habits, SortKey::Streak, SortDirection::Ascending, today);
        let names: Vec<&str> = habits.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["Drink Water", "Meditation", "Journaling"]);

        sort_habits(&mut habits, SortKey::Name, SortDirection::Descending, today);
        let names: Vec<&str> = habits.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["Meditation", "Journaling", "Drink Water"]);
    }
}
