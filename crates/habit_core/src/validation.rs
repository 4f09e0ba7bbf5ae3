use crate::error::ValidationError;
use crate::habit::{HabitInput, HabitPatch};

pub const MAX_NAME_CHARS: usize = 50;
pub const MAX_DESCRIPTION_CHARS: usize = 200;

pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    let len = name.chars().count();
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if len > MAX_NAME_CHARS {
        return Err(ValidationError::NameTooLong {
            len,
            max: MAX_NAME_CHARS,
        });
    }
    Ok(())
}

pub fn validate_description(description: &str) -> Result<(), ValidationError> {
    let len = description.chars().count();
    if len > MAX_DESCRIPTION_CHARS {
        return Err(ValidationError::DescriptionTooLong {
            len,
            max: MAX_DESCRIPTION_CHARS,
        });
    }
    Ok(())
}

pub fn validate_input(input: &HabitInput) -> Result<(), ValidationError> {
    validate_name(&input.name)?;
    if let Some(description) = &input.description {
        validate_description(description)?;
    }
    Ok(())
}

pub fn validate_patch(patch: &HabitPatch) -> Result<(), ValidationError> {
    if let Some(name) = &patch.name {
        validate_name(name)?;
    }
    if let Some(Some(description)) = &patch.description {
        validate_description(description)?;
    }
    Ok(())
}
