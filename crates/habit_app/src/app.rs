use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use chrono::{Datelike, NaiveDate};
use habit_core::{
    habit::{self, SortDirection},
    notifications::{HabitChange, HabitListener},
    quote::{
        HttpQuoteSource, OfflineQuoteSource, QuoteBook, QuoteOrigin, QuoteSource, DEFAULT_QUOTE_URL,
    },
    streak::{self, DayCompletion},
    validation, Habit, HabitId, HabitInput, HabitPatch, HabitService, Outcome,
};
use tracing::{debug, info};

use crate::cli::{parse_window_days, Command, YearMonth};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub(crate) data_dir: PathBuf,
    pub(crate) window_days: usize,
    pub(crate) quote_url: String,
    pub(crate) offline: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(dir) = lookup("HABITS_DATA_DIR") {
            let dir = dir.trim();
            if !dir.is_empty() {
                config.data_dir = PathBuf::from(dir);
            }
        }
        if let Some(days) = lookup("HABITS_WINDOW_DAYS") {
            config.window_days = parse_window_days(&days)
                .map_err(|err| anyhow!(err))
                .context("invalid HABITS_WINDOW_DAYS")?;
        }
        if let Some(url) = lookup("HABITS_QUOTE_URL") {
            config.quote_url = url.trim().to_string();
        }
        if let Some(flag) = lookup("HABITS_OFFLINE") {
            config.offline = matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        debug!(?config, "resolved configuration");
        Ok(config)
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("habit-tracker");
        Self {
            data_dir,
            window_days: 30,
            quote_url: DEFAULT_QUOTE_URL.to_string(),
            offline: false,
        }
    }
}

struct ChangeLogger;

impl HabitListener for ChangeLogger {
    fn habits_changed(&self, change: &HabitChange, habits: &[Habit]) {
        info!(?change, habits = habits.len(), "habits updated");
    }
}

pub struct App {
    config: AppConfig,
    service: HabitService,
    quotes: QuoteBook,
}

impl App {
    pub fn open(config: AppConfig) -> Result<Self> {
        info!(path = %config.data_dir.display(), "opening habit store");
        let service = HabitService::builder()
            .with_data_dir(&config.data_dir)
            .with_listener(Box::new(ChangeLogger))
            .build()
            .context("unable to open habit store")?;
        let source: Box<dyn QuoteSource> = if config.offline {
            Box::new(OfflineQuoteSource)
        } else {
            Box::new(HttpQuoteSource::new(config.quote_url.clone()))
        };
        let quotes = QuoteBook::new(service.store(), source);
        Ok(Self {
            config,
            service,
            quotes,
        })
    }

    pub fn service(&self) -> &HabitService {
        &self.service
    }

    /// Runs `command` against the store and returns the text to print.
    pub fn execute(&self, command: Command, today: NaiveDate) -> Result<String> {
        match command {
            Command::Today => self.today(today),
            Command::List { time, sort, desc } => {
                let mut habits = habit::filter_by_time_of_day(&self.service.habits(), time);
                let direction = if desc {
                    SortDirection::Descending
                } else {
                    SortDirection::Ascending
                };
                habit::sort_habits(&mut habits, sort, direction, today);
                render_habits(&habits, today)
            }
            Command::Add {
                name,
                description,
                frequency,
                time,
                color,
                icon,
            } => {
                let mut input = HabitInput::new(name)
                    .with_frequency(frequency)
                    .with_time_of_day(time);
                input.description = description;
                if let Some(color) = color {
                    input.color = color;
                }
                if let Some(icon) = icon {
                    input.icon = icon;
                }
                validation::validate_input(&input)?;
                let habit = self.service.add_habit(input)?;
                Ok(format!("Added `{}` with id {}", habit.name, habit.id))
            }
            Command::Edit {
                id,
                name,
                description,
                clear_description,
                frequency,
                time,
                color,
                icon,
            } => {
                let patch = HabitPatch {
                    name,
                    description: if clear_description {
                        Some(None)
                    } else {
                        description.map(Some)
                    },
                    icon,
                    color,
                    frequency,
                    time_of_day: time,
                    completed_dates: None,
                };
                validation::validate_patch(&patch)?;
                let id = HabitId::from(id.as_str());
                let outcome = self.service.update_habit(&id, &patch)?;
                Ok(describe(outcome, &id, "updated"))
            }
            Command::Delete { id } => {
                let id = HabitId::from(id.as_str());
                let outcome = self.service.delete_habit(&id)?;
                Ok(describe(outcome, &id, "deleted"))
            }
            Command::Done { id, date } => {
                let id = HabitId::from(id.as_str());
                let date = date.unwrap_or(today);
                let outcome = self.service.complete_habit(&id, date)?;
                Ok(self.describe_completion(outcome, &id, date, today))
            }
            Command::Undo { id, date } => {
                let id = HabitId::from(id.as_str());
                let date = date.unwrap_or(today);
                let outcome = self.service.uncomplete_habit(&id, date)?;
                Ok(self.describe_completion(outcome, &id, date, today))
            }
            Command::Toggle { id, date } => {
                let id = HabitId::from(id.as_str());
                let date = date.unwrap_or(today);
                let outcome = self.service.toggle_habit(&id, date)?;
                Ok(self.describe_completion(outcome, &id, date, today))
            }
            Command::Stats => self.stats(today),
            Command::Window { days } => {
                let days = days.unwrap_or(self.config.window_days);
                render_days(&self.service.rolling_window(today, days))
            }
            Command::Calendar { month } => {
                let YearMonth { year, month } = month.unwrap_or(YearMonth {
                    year: today.year(),
                    month: today.month(),
                });
                render_days(&self.service.month_overview(year, month))
            }
            Command::Quote { refresh } => {
                let daily = if refresh {
                    self.quotes.refresh(today)
                } else {
                    self.quotes.quote_for(today)
                };
                let mut out = format!("\"{}\" - {}", daily.quote.text, daily.quote.author);
                if let QuoteOrigin::Fallback { error } = daily.origin {
                    write!(out, "\n(offline quote: {error})")?;
                }
                Ok(out)
            }
            Command::Reset { yes: false } => {
                Ok("This erases every habit and its history. Run again with --yes to confirm."
                    .to_string())
            }
            Command::Reset { yes: true } => {
                self.service.reset()?;
                self.quotes.clear().context("unable to clear the cached quote")?;
                Ok(format!("Reset to {} example habits", self.service.len()))
            }
        }
    }

    /// Pending habits are listed before the ones already done today.
    fn today(&self, today: NaiveDate) -> Result<String> {
        let mut habits = self.service.habits();
        habits.sort_by_key(|habit| habit.is_completed_on(today));
        let summary = self.service.summary(today);
        let mut out = String::new();
        writeln!(
            out,
            "{}: {}/{} done ({}%)",
            today.format("%A, %B %-d"),
            summary.completed_today,
            summary.total_habits,
            summary.today_percentage
        )?;
        out.push_str(&render_habits(&habits, today)?);
        let daily = self.quotes.quote_for(today);
        write!(out, "\n\"{}\" - {}", daily.quote.text, daily.quote.author)?;
        Ok(out)
    }

    fn stats(&self, today: NaiveDate) -> Result<String> {
        let summary = self.service.summary(today);
        let mut out = String::new();
        writeln!(out, "Habits:            {}", summary.total_habits)?;
        writeln!(out, "Longest streak:    {} days", summary.longest_streak)?;
        writeln!(out, "Total completions: {}", summary.total_completions)?;
        write!(out, "Completion rate:   {}%", summary.completion_rate)?;
        Ok(out)
    }

    fn describe_completion(
        &self,
        outcome: Outcome,
        id: &HabitId,
        date: NaiveDate,
        today: NaiveDate,
    ) -> String {
        match outcome {
            Outcome::NotFound => format!("No habit with id {id}"),
            Outcome::Unchanged => format!("Nothing to change for {id} on {date}"),
            Outcome::Applied => {
                let done = self
                    .service
                    .habit(id)
                    .map(|habit| habit.is_completed_on(date))
                    .unwrap_or(false);
                format!(
                    "{} {} on {date}; streak is {} days",
                    id,
                    if done { "done" } else { "cleared" },
                    self.service.streak_count(id, today)
                )
            }
        }
    }
}

fn describe(outcome: Outcome, id: &HabitId, verb: &str) -> String {
    match outcome {
        Outcome::Applied => format!("Habit {id} {verb}"),
        Outcome::Unchanged => format!("Habit {id} already up to date"),
        Outcome::NotFound => format!("No habit with id {id}"),
    }
}

fn render_habits(habits: &[Habit], today: NaiveDate) -> Result<String> {
    if habits.is_empty() {
        return Ok("No habits yet. Add one with `habits add <name>`.".to_string());
    }
    let mut out = String::new();
    for habit in habits {
        let mark = if habit.is_completed_on(today) { "x" } else { " " };
        write!(
            out,
            "\n[{mark}] {:<14} {:<24} {:>3} day streak  ({:?}, {:?})",
            habit.id.as_str(),
            habit.name,
            streak::streak_count(habit, today),
            habit.frequency,
            habit.time_of_day,
        )?;
    }
    Ok(out.trim_start_matches('\n').to_string())
}

fn render_days(days: &[DayCompletion]) -> Result<String> {
    let mut out = String::new();
    for day in days {
        let filled = (day.ratio * 10.0).round() as usize;
        writeln!(
            out,
            "{} {:<10} {}/{} ({}%)",
            day.date,
            "#".repeat(filled),
            day.completed_count,
            day.total_count,
            streak::percentage(day.ratio)
        )?;
    }
    Ok(out.trim_end().to_string())
}

/// Opens the store and prints the result of `command`.
pub fn run(config: AppConfig, command: Command) -> Result<()> {
    let app = App::open(config)?;
    let output = app.execute(command, streak::local_today())?;
    println!("{output}");
    Ok(())
}
