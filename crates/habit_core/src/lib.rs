pub mod error;
pub mod habit;
pub mod notifications;
pub mod quote;
pub mod service;
pub mod storage;
pub mod streak;
pub mod validation;

pub use crate::error::{HabitError, StorageError, ValidationError};
pub use crate::habit::{Frequency, Habit, HabitId, HabitInput, HabitPatch, TimeOfDay};
pub use crate::service::{HabitService, HabitServiceBuilder, Outcome};
