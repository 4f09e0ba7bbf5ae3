//! Streak and completion accounting over local calendar dates.
//!
//! Everything here is pure: callers pass the reference `today` explicitly so
//! that results do not depend on wall-clock time. [`local_today`] provides the
//! usual value.

use std::iter;

use chrono::{Datelike, Local, NaiveDate, TimeZone};
use serde::Serialize;

use crate::habit::Habit;

/// Completion tally for a single calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayCompletion {
    pub date: NaiveDate,
    pub completed_count: usize,
    pub total_count: usize,
    pub ratio: f64,
}

/// Dashboard and progress figures derived from one collection snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSummary {
    pub total_habits: usize,
    pub completed_today: usize,
    pub today_percentage: u32,
    pub longest_streak: u32,
    pub total_completions: usize,
    pub completion_rate: u32,
}

pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// Length of the run of consecutive completed days ending today, or ending
/// yesterday when today is not marked yet.
pub fn streak_count(habit: &Habit, today: NaiveDate) -> u32 {
    let dates = &habit.completed_dates;
    if dates.is_empty() {
        return 0;
    }

    let anchor = if dates.contains(&today) {
        today
    } else {
        match today.pred_opt() {
            Some(yesterday) if dates.contains(&yesterday) => yesterday,
            _ => return 0,
        }
    };

    let mut streak = 1;
    let mut cursor = anchor;
    while let Some(previous) = cursor.pred_opt() {
        if !dates.contains(&previous) {
            break;
        }
        streak += 1;
        cursor = previous;
    }
    streak
}

pub fn completed_count_for_date(habits: &[Habit], date: NaiveDate) -> usize {
    habits
        .iter()
        .filter(|habit| habit.is_completed_on(date))
        .count()
}

/// Share of habits completed on `date`; 0 when there are no habits.
pub fn completion_ratio_for_date(habits: &[Habit], date: NaiveDate) -> f64 {
    day_completion(habits, date).ratio
}

pub fn longest_streak(habits: &[Habit], today: NaiveDate) -> u32 {
    habits
        .iter()
        .map(|habit| streak_count(habit, today))
        .max()
        .unwrap_or(0)
}

pub fn total_completions(habits: &[Habit]) -> usize {
    habits.iter().map(|habit| habit.completed_dates.len()).sum()
}

/// Number of days a habit could have been completed: its creation day through
/// `today`, inclusive, never less than one.
pub fn possible_completions<Tz: TimeZone>(habit: &Habit, today: NaiveDate, tz: &Tz) -> u64 {
    let days = (today - habit.created_on(tz)).num_days() + 1;
    days.max(1) as u64
}

/// Completion rate as a whole percentage, with creation dates taken in the
/// local timezone.
pub fn completion_rate(habits: &[Habit], today: NaiveDate) -> u32 {
    completion_rate_in(habits, today, &Local)
}

/// Total completions over total possible completions, rounded and capped at
/// 100. Completions marked before a habit's creation day still count toward
/// the numerator.
pub fn completion_rate_in<Tz: TimeZone>(habits: &[Habit], today: NaiveDate, tz: &Tz) -> u32 {
    if habits.is_empty() {
        return 0;
    }
    let possible: u64 = habits
        .iter()
        .map(|habit| possible_completions(habit, today, tz))
        .sum();
    if possible == 0 {
        return 0;
    }
    let ratio = total_completions(habits) as f64 / possible as f64;
    percentage(ratio).min(100)
}

/// The last `window_days` days ending at `today`, oldest first. The window
/// stops at the earliest representable date.
pub fn rolling_window(
    habits: &[Habit],
    today: NaiveDate,
    window_days: usize,
) -> Vec<DayCompletion> {
    let mut window: Vec<DayCompletion> = iter::successors(Some(today), NaiveDate::pred_opt)
        .take(window_days)
        .map(|date| day_completion(habits, date))
        .collect();
    window.reverse();
    window
}

/// One entry per day of the given month; empty for an invalid month.
pub fn month_overview(habits: &[Habit], year: i32, month: u32) -> Vec<DayCompletion> {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return Vec::new();
    };
    first
        .iter_days()
        .take_while(|date| date.month() == month && date.year() == year)
        .map(|date| day_completion(habits, date))
        .collect()
}

pub fn day_completion(habits: &[Habit], date: NaiveDate) -> DayCompletion {
    let completed_count = completed_count_for_date(habits, date);
    let total_count = habits.len();
    let ratio = if total_count == 0 {
        0.0
    } else {
        completed_count as f64 / total_count as f64
    };
    DayCompletion {
        date,
        completed_count,
        total_count,
        ratio,
    }
}

pub fn percentage(ratio: f64) -> u32 {
    (ratio * 100.0).round().max(0.0) as u32
}

pub fn summarize(habits: &[Habit], today: NaiveDate) -> ProgressSummary {
    summarize_in(habits, today, &Local)
}

pub fn summarize_in<Tz: TimeZone>(
    habits: &[Habit],
    today: NaiveDate,
    tz: &Tz,
) -> ProgressSummary {
    let today_entry = day_completion(habits, today);
    ProgressSummary {
        total_habits: habits.len(),
        completed_today: today_entry.completed_count,
        today_percentage: percentage(today_entry.ratio),
        longest_streak: longest_streak(habits, today),
        total_completions: total_completions(habits),
        completion_rate: completion_rate_in(habits, today, tz),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::habit::{HabitId, HabitInput};
    use chrono::{FixedOffset, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn habit_with(id: &str, created: NaiveDate, done: &[NaiveDate]) -> Habit {
        let created_at = Utc.from_utc_datetime(&created.and_hms_opt(12, 0, 0).unwrap());
        let mut habit = Habit::from_input(HabitId::new(id), HabitInput::new(id), created_at);
        habit.completed_dates.extend(done.iter().copied());
        habit
    }

    #[test]
    fn counts_consecutive_days_ending_today() {
        let today = date(2024, 3, 10);
        let habit = habit_with(
            "a",
            date(2024, 3, 1),
            &[date(2024, 3, 10), date(2024, 3, 9), date(2024, 3, 8)],
        );
        assert_eq!(streak_count(&habit, today), 3);
    }

    #[test]
    fn gap_truncates_the_walk() {
        let today = date(2024, 3, 10);
        let habit = habit_with(
            "a",
            date(2024, 3, 1),
            &[date(2024, 3, 10), date(2024, 3, 8)],
        );
        assert_eq!(streak_count(&habit, today), 1);
    }

    #[test]
    fn yesterday_keeps_the_streak_alive() {
        let today = date(2024, 3, 10);
        let only_yesterday = habit_with("a", date(2024, 3, 1), &[date(2024, 3, 9)]);
        assert_eq!(streak_count(&only_yesterday, today), 1);

        let run_to_yesterday = habit_with(
            "b",
            date(2024, 3, 1),
            &[date(2024, 3, 9), date(2024, 3, 8), date(2024, 3, 7)],
        );
        assert_eq!(streak_count(&run_to_yesterday, today), 3);

        let two_days_ago = habit_with("c", date(2024, 3, 1), &[date(2024, 3, 8)]);
        assert_eq!(streak_count(&two_days_ago, today), 0);

        let empty = habit_with("d", date(2024, 3, 1), &[]);
        assert_eq!(streak_count(&empty, today), 0);
    }

    #[test]
    fn streak_walks_across_month_and_year_boundaries() {
        let today = date(2024, 1, 1);
        let habit = habit_with(
            "a",
            date(2023, 12, 1),
            &[date(2024, 1, 1), date(2023, 12, 31), date(2023, 12, 30)],
        );
        assert_eq!(streak_count(&habit, today), 3);

        let leap = habit_with(
            "b",
            date(2024, 2, 1),
            &[date(2024, 3, 1), date(2024, 2, 29), date(2024, 2, 28)],
        );
        assert_eq!(streak_count(&leap, date(2024, 3, 1)), 3);
    }

    #[test]
    fn ratio_and_rate_are_zero_without_habits() {
        let today = date(2024, 3, 10);
        assert_eq!(completion_ratio_for_date(&[], today), 0.0);
        assert_eq!(completion_rate_in(&[], today, &Utc), 0);
        assert_eq!(longest_streak(&[], today), 0);
        let window = rolling_window(&[], today, 3);
        assert!(window.iter().all(|day| day.ratio == 0.0 && day.total_count == 0));
    }

    #[test]
    fn completion_rate_counts_days_since_creation_inclusive() {
        let habit = habit_with(
            "a",
            date(2024, 1, 10),
            &[date(2024, 1, 10), date(2024, 1, 12)],
        );
        let today = date(2024, 1, 12);
        assert_eq!(possible_completions(&habit, today, &Utc), 3);
        assert_eq!(completion_rate_in(&[habit], today, &Utc), 67);
    }

    #[test]
    fn habit_created_today_contributes_one_possible_day() {
        let today = date(2024, 1, 12);
        let fresh = habit_with("a", today, &[today]);
        assert_eq!(possible_completions(&fresh, today, &Utc), 1);
        assert_eq!(completion_rate_in(&[fresh], today, &Utc), 100);
    }

    #[test]
    fn completion_rate_never_exceeds_one_hundred() {
        let today = date(2024, 1, 12);
        let backfilled = habit_with(
            "a",
            today,
            &[date(2024, 1, 10), date(2024, 1, 11), today],
        );
        assert_eq!(completion_rate_in(&[backfilled], today, &Utc), 100);
    }

    #[test]
    fn rolling_window_is_oldest_first() {
        let today = date(2024, 6, 3);
        let habits = vec![
            habit_with("a", date(2024, 5, 1), &[date(2024, 6, 1), date(2024, 6, 3)]),
            habit_with("b", date(2024, 5, 1), &[date(2024, 6, 3)]),
        ];
        let window = rolling_window(&habits, today, 3);
        let dates: Vec<NaiveDate> = window.iter().map(|day| day.date).collect();
        assert_eq!(dates, vec![date(2024, 6, 1), date(2024, 6, 2), date(2024, 6, 3)]);
        assert_eq!(window[0].completed_count, 1);
        assert_eq!(window[0].ratio, 0.5);
        assert_eq!(window[1].completed_count, 0);
        assert_eq!(window[2].ratio, 1.0);
        assert_eq!(window, rolling_window(&habits, today, 3));
        assert!(rolling_window(&habits, today, 0).is_empty());
    }

    #[test]
    fn month_overview_covers_every_day() {
        let habits = vec![habit_with("a", date(2024, 1, 1), &[date(2024, 2, 29)])];
        let february = month_overview(&habits, 2024, 2);
        assert_eq!(february.len(), 29);
        assert_eq!(february.last().map(|day| day.completed_count), Some(1));
        assert!(month_overview(&habits, 2024, 13).is_empty());
    }

    #[test]
    fn summary_matches_individual_figures() {
        let today = date(2024, 6, 3);
        let habits = vec![
            habit_with("a", date(2024, 6, 1), &[date(2024, 6, 2), date(2024, 6, 3)]),
            habit_with("b", date(2024, 6, 3), &[]),
        ];
        let summary = summarize_in(&habits, today, &Utc);
        assert_eq!(summary.total_habits, 2);
        assert_eq!(summary.completed_today, 1);
        assert_eq!(summary.today_percentage, 50);
        assert_eq!(summary.longest_streak, 2);
        assert_eq!(summary.total_completions, 2);
        assert_eq!(summary.completion_rate, 50);
    }

    #[test]
    fn creation_day_is_read_in_the_given_timezone() {
        let created_at = Utc.with_ymd_and_hms(2024, 1, 9, 20, 0, 0).unwrap();
        let mut habit = Habit::from_input(HabitId::new("tz"), HabitInput::new("tz"), created_at);
        habit
            .completed_dates
            .extend([date(2024, 1, 10), date(2024, 1, 11), date(2024, 1, 12)]);
        let brisbane = FixedOffset::east_opt(10 * 3600).unwrap();
        let today = date(2024, 1, 12);

        assert_eq!(habit.created_on(&brisbane), date(2024, 1, 10));
        assert_eq!(possible_completions(&habit, today, &brisbane), 3);
        assert_eq!(possible_completions(&habit, today, &Utc), 4);
        let habits = [habit];
        assert_eq!(completion_rate_in(&habits, today, &brisbane), 100);
        assert_eq!(completion_rate_in(&habits, today, &Utc), 75);
    }

    #[test]
    fn rolling_window_stops_at_the_earliest_date() {
        let habits = [habit_with("a", date(2024, 1, 1), &[])];
        let today = NaiveDate::MIN.succ_opt().and_then(|d| d.succ_opt()).unwrap();
        let window = rolling_window(&habits, today, 10);
        assert_eq!(window.len(), 3);
        assert_eq!(window[0].date, NaiveDate::MIN);
        assert_eq!(window[2].date, today);
    }
}
