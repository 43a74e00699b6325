use std::str::FromStr;

use crate::prelude::*;

pub fn non_zero_usize(value: &str) -> Result<usize> {
    match FromStr::from_str(value)? {
        value if value >= 1 => Ok(value),
        _ => Err(anyhow!("expected a positive number")),
    }
}

pub fn n_folds(value: &str) -> Result<usize> {
    match FromStr::from_str(value)? {
        value if value >= 2 => Ok(value),
        _ => Err(anyhow!("expected at least 2 folds")),
    }
}

/// Parses a fraction from the open interval `(0, 1)`.
pub fn fraction(value: &str) -> Result<f64> {
    match f64::from_str(value)? {
        value if value > 0.0 && value < 1.0 => Ok(value),
        value => Err(anyhow!("{} is not within (0, 1)", value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_ok() -> Result {
        assert!((fraction("0.3")? - 0.3).abs() < f64::EPSILON);
        assert!(fraction("0").is_err());
        assert!(fraction("1").is_err());
        assert!(fraction("abc").is_err());
        Ok(())
    }

    #[test]
    fn n_folds_ok() -> Result {
        assert_eq!(n_folds("5")?, 5);
        assert!(n_folds("1").is_err());
        Ok(())
    }
}
