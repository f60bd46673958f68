use experience_classifier::constants::llm_defaults;
use std::{fmt::Display, path::PathBuf, str::FromStr};

/// Temperature within the range every supported provider accepts
pub fn validate_temperature(s: &str) -> Result<f32, String> {
    let temp: f32 = parse(s)?;
    let range = llm_defaults::MIN_TEMPERATURE..=llm_defaults::MAX_TEMPERATURE;
    if range.contains(&temp) {
        Ok(temp)
    } else {
        Err(format!(
            "Temperature must be between {} and {}, got {temp}",
            range.start(),
            range.end()
        ))
    }
}

/// Counts and limits: token budgets, batch sizes, timeouts
pub fn validate_positive<T>(s: &str) -> Result<T, String>
where
    T: FromStr + PartialOrd + Default + Display,
{
    let val: T = parse(s)?;
    if val > T::default() {
        Ok(val)
    } else {
        Err(format!("Value must be > 0, got {val}"))
    }
}

pub fn validate_file_exists(s: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(s);
    if path.exists() {
        Ok(path)
    } else {
        Err(format!("File does not exist: '{s}'"))
    }
}

fn parse<T: FromStr>(s: &str) -> Result<T, String> {
    s.trim()
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temperature_bounds() {
        assert_eq!(validate_temperature("2.0").unwrap(), 2.0);
        assert!(validate_temperature("2.5").is_err());
        assert!(validate_temperature("warm").is_err());
    }

    #[test]
    fn test_batch_size_must_be_positive() {
        assert_eq!(validate_positive::<usize>("10").unwrap(), 10);
        assert!(validate_positive::<usize>("0").is_err());
        assert!(validate_positive::<usize>("-3").is_err());
        assert!(validate_positive::<u64>("0")
            .unwrap_err()
            .contains("> 0"));
    }
}
