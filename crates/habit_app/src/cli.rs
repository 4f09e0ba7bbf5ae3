use std::str::FromStr;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use habit_core::{habit::SortKey, Frequency, TimeOfDay};

#[derive(Parser, Debug)]
#[command(name = "habits")]
#[command(about = "Track daily habits, streaks and progress", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Today's checklist with a progress summary and the daily quote
    Today,
    /// List habits
    List {
        /// Only show habits for this time of day (morning, afternoon, evening, anytime)
        #[arg(short, long)]
        time: Option<TimeOfDay>,
        /// Sort by name, streak or recent
        #[arg(short, long, default_value = "name")]
        sort: SortKey,
        /// Reverse the sort order
        #[arg(long)]
        desc: bool,
    },
    /// Add a new habit
    Add {
        /// Habit name (quoted if it has spaces)
        name: String,
        #[arg(short, long)]
        description: Option<String>,
        /// daily or weekly
        #[arg(short, long, default_value = "daily")]
        frequency: Frequency,
        /// morning, afternoon, evening or anytime
        #[arg(short, long, default_value = "anytime")]
        time: TimeOfDay,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        icon: Option<String>,
    },
    /// Edit an existing habit
    Edit {
        id: String,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long, conflicts_with = "clear_description")]
        description: Option<String>,
        /// Remove the description
        #[arg(long)]
        clear_description: bool,
        #[arg(short, long)]
        frequency: Option<Frequency>,
        #[arg(short, long)]
        time: Option<TimeOfDay>,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        icon: Option<String>,
    },
    /// Delete a habit and its history
    Delete { id: String },
    /// Mark a habit done (defaults to today)
    Done {
        id: String,
        /// Date in YYYY-MM-DD
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// Clear a completion (defaults to today)
    Undo {
        id: String,
        /// Date in YYYY-MM-DD
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// Flip a habit between done and not done (defaults to today)
    Toggle {
        id: String,
        /// Date in YYYY-MM-DD
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// Longest streak, total completions and completion rate
    Stats,
    /// Per-day completion over the last N days
    Window {
        /// Number of days; defaults to HABITS_WINDOW_DAYS or 30
        #[arg(short, long, value_parser = parse_window_days)]
        days: Option<usize>,
    },
    /// Per-day completion for a calendar month
    Calendar {
        /// Month in YYYY-MM; defaults to the current month
        #[arg(short, long)]
        month: Option<YearMonth>,
    },
    /// Show the daily quote
    Quote {
        /// Fetch a new quote even if one is cached for today
        #[arg(short, long)]
        refresh: bool,
    },
    /// Erase all habits and history and start again from the example habits
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
}

/// Longest window the `window` command and `HABITS_WINDOW_DAYS` accept.
pub const MAX_WINDOW_DAYS: usize = 3660;

pub fn parse_window_days(s: &str) -> Result<usize, String> {
    let days: usize = s
        .trim()
        .parse()
        .map_err(|_| format!("expected a number of days, got `{s}`"))?;
    if !(1..=MAX_WINDOW_DAYS).contains(&days) {
        return Err(format!("days must be between 1 and {MAX_WINDOW_DAYS}, got {days}"));
    }
    Ok(days)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl FromStr for YearMonth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("expected YYYY-MM, got `{s}`"))?;
        let year: i32 = year
            .parse()
            .map_err(|_| format!("invalid year in `{s}`"))?;
        let month: u32 = month
            .parse()
            .map_err(|_| format!("invalid month in `{s}`"))?;
        if !(1..=12).contains(&month) {
            return Err(format!("month must be between 1 and 12, got {month}"));
        }
        Ok(Self { year, month })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_done_with_explicit_date() {
        let cli = Cli::try_parse_from(["habits", "done", "42", "--date", "2024-06-01"])
            .expect("parse");
        assert_eq!(
            cli.command,
            Some(Command::Done {
                id: "42".into(),
                date: NaiveDate::from_ymd_opt(2024, 6, 1),
            })
        );
    }

    #[test]
    fn parses_list_filters() {
        let cli = Cli::try_parse_from(["habits", "list", "--time", "evening", "--sort", "streak"])
            .expect("parse");
        assert_eq!(
            cli.command,
            Some(Command::List {
                time: Some(TimeOfDay::Evening),
                sort: SortKey::Streak,
                desc: false,
            })
        );
        assert!(Cli::try_parse_from(["habits", "list", "--time", "midnight"]).is_err());
    }

    #[test]
    fn year_month_rejects_bad_input() {
        assert_eq!(
            "2024-02".parse::<YearMonth>(),
            Ok(YearMonth {
                year: 2024,
                month: 2
            })
        );
        assert!("2024-13".parse::<YearMonth>().is_err());
        assert!("February".parse::<YearMonth>().is_err());
    }

    #[test]
    fn window_days_must_fit_the_calendar() {
        let cli = Cli::try_parse_from(["habits", "window", "--days", "7"]).expect("parse");
        assert_eq!(cli.command, Some(Command::Window { days: Some(7) }));
        assert!(Cli::try_parse_from(["habits", "window", "--days", "0"]).is_err());
        assert!(Cli::try_parse_from(["habits", "window", "--days", "200000000000000"]).is_err());
        assert!(parse_window_days("3661").is_err());
    }

    #[test]
    fn parses_reset_confirmation() {
        let cli = Cli::try_parse_from(["habits", "reset", "--yes"]).expect("parse");
        assert_eq!(cli.command, Some(Command::Reset { yes: true }));
    }
}
