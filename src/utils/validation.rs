use crate::utils::error::{CurriculumError, Result};
use regex::Regex;
use std::path::{Component, Path};
use std::sync::OnceLock;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(CurriculumError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(CurriculumError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

/// Model names are relative paths below `storage/models` (grid runs use `name/seedN`).
pub fn validate_model_name(field_name: &str, name: &str) -> Result<()> {
    validate_non_empty_string(field_name, name)?;
    validate_path(field_name, name)?;

    let path = Path::new(name);
    if path.is_absolute() {
        return Err(CurriculumError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: name.to_string(),
            reason: "Model name must be relative to the models directory".to_string(),
        });
    }

    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(CurriculumError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: name.to_string(),
            reason: "Model name cannot leave the models directory".to_string(),
        });
    }

    Ok(())
}

fn env_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z][A-Za-z0-9]*(-[A-Za-z0-9]+)*-v[0-9]+$").expect("static regex")
    })
}

/// Gym style identifiers such as `MiniGrid-KeyCorridorS3R1-v0`.
pub fn validate_env_id(field_name: &str, env_id: &str) -> Result<()> {
    if env_id_regex().is_match(env_id) {
        Ok(())
    } else {
        Err(CurriculumError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: env_id.to_string(),
            reason: "Expected an environment id like 'MiniGrid-Unlock-v0'".to_string(),
        })
    }
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(CurriculumError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

/// Rejects values still holding a `${VAR}` placeholder after environment substitution.
pub fn validate_env_substituted(field_name: &str, value: &str) -> Result<()> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("static regex"));

    if let Some(caps) = re.captures(value) {
        return Err(CurriculumError::config(format!(
            "{} refers to environment variable {} which is not set",
            field_name, &caps[1]
        )));
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CurriculumError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if !(value >= min && value <= max) {
        return Err(CurriculumError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_model_name() {
        assert!(validate_model_name("model", "KeyCorridor_Linreg").is_ok());
        assert!(validate_model_name("model", "grid_run/seed3").is_ok());
        assert!(validate_model_name("model", "").is_err());
        assert!(validate_model_name("model", "../outside").is_err());
        assert!(validate_model_name("model", "/abs/path").is_err());
    }

    #[test]
    fn test_validate_env_id() {
        assert!(validate_env_id("env", "MiniGrid-KeyCorridorS3R1-v0").is_ok());
        assert!(validate_env_id("env", "MiniGrid-ObstructedMaze-1Dlhb-v0").is_ok());
        assert!(validate_env_id("env", "Addition-3-v0").is_ok());
        assert!(validate_env_id("env", "KeyCorridor").is_err());
        assert!(validate_env_id("env", "MiniGrid KeyCorridor-v0").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("num_len", 5, 1).is_ok());
        assert!(validate_positive_number("num_len", 0, 1).is_err());
    }

    #[test]
    fn test_validate_env_substituted() {
        assert!(validate_env_substituted("slurm.account", "def-lab").is_ok());
        let err = validate_env_substituted("slurm.account", "${SLURM_ACCOUNT}").unwrap_err();
        assert!(err.to_string().contains("SLURM_ACCOUNT"));
        assert!(validate_env_substituted("mem", "${MEM}G").is_err());
    }

    #[test]
    fn test_validate_range_rejects_nan() {
        assert!(validate_range("eps", 0.2, 0.0, 1.0).is_ok());
        assert!(validate_range("eps", 1.5, 0.0, 1.0).is_err());
        assert!(validate_range("eps", f64::NAN, 0.0, 1.0).is_err());
    }
}
