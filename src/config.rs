use core::fmt;

use crate::goal::GoalTarget;
use crate::solver::SolverOptions;

/// Errors while reading option text or goal cells.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A line is not of the form `key = value`.
    Syntax { line: usize, text: String },
    UnknownKey { line: usize, key: String },
    /// A value did not parse for its key.
    InvalidValue { line: usize, key: String, value: String },
    /// A value parsed but lies outside its allowed range.
    OutOfRange { key: &'static str, value: f64 },
    /// Goal cell text is neither a number nor a single-letter tag.
    InvalidGoal { text: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax { line, text } => {
                write!(f, "line {line}: expected `key = value`, got `{text}`")
            }
            Self::UnknownKey { line, key } => write!(f, "line {line}: unknown option `{key}`"),
            Self::InvalidValue { line, key, value } => {
                write!(f, "line {line}: invalid value `{value}` for `{key}`")
            }
            Self::OutOfRange { key, value } => write!(f, "`{key}` out of range: {value}"),
            Self::InvalidGoal { text } => write!(f, "invalid goal cell `{text}`"),
        }
    }
}

impl std::error::Error for ConfigError {}

fn number(line: usize, key: &str, value: &str) -> Result<f64, ConfigError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ConfigError::InvalidValue {
            line,
            key: key.to_string(),
            value: value.to_string(),
        })
}

fn require(ok: bool, key: &'static str, value: f64) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { key, value })
    }
}

impl SolverOptions {
    /// Parse `key = value` lines over the defaults.
    ///
    /// Blank lines and `#` comments are skipped. Keys: `iterations`,
    /// `tolerance`, `lambda`, `lambda_min`, `lambda_max`, `shrink`, `boost`,
    /// `step`, `verbose`.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut options = Self::default();
        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            let content = raw.split('#').next().unwrap_or("").trim();
            if content.is_empty() {
                continue;
            }
            let Some((key, value)) = content.split_once('=') else {
                return Err(ConfigError::Syntax {
                    line,
                    text: content.to_string(),
                });
            };
            let (key, value) = (key.trim(), value.trim());
            match key {
                "iterations" => {
                    options.max_iters =
                        value.parse().map_err(|_| ConfigError::InvalidValue {
                            line,
                            key: key.to_string(),
                            value: value.to_string(),
                        })?;
                }
                "tolerance" => options.tolerance = number(line, key, value)?,
                "lambda" => options.lambda_init = number(line, key, value)?,
                "lambda_min" => options.lambda_min = number(line, key, value)?,
                "lambda_max" => options.lambda_max = number(line, key, value)?,
                "shrink" => options.shrink = number(line, key, value)?,
                "boost" => options.boost = number(line, key, value)?,
                "step" => options.base_step = number(line, key, value)?,
                "verbose" => {
                    options.verbose = match value {
                        "true" | "yes" | "1" => true,
                        "false" | "no" | "0" => false,
                        _ => {
                            return Err(ConfigError::InvalidValue {
                                line,
                                key: key.to_string(),
                                value: value.to_string(),
                            })
                        }
                    };
                }
                _ => {
                    return Err(ConfigError::UnknownKey {
                        line,
                        key: key.to_string(),
                    })
                }
            }
        }
        options.validate()?;
        Ok(options)
    }

    /// Check the ranges the damping loop relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require(self.tolerance >= 0.0, "tolerance", self.tolerance)?;
        require(self.lambda_min > 0.0, "lambda_min", self.lambda_min)?;
        require(self.lambda_init >= self.lambda_min, "lambda", self.lambda_init)?;
        require(self.lambda_max > self.lambda_init, "lambda_max", self.lambda_max)?;
        require(self.shrink > 0.0 && self.shrink < 1.0, "shrink", self.shrink)?;
        require(self.boost > 1.0, "boost", self.boost)?;
        require(self.base_step > 0.0, "step", self.base_step)?;
        Ok(())
    }
}

impl GoalTarget {
    /// Parse goal cell text: blank, a number, or a single letter naming a gang.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Self::Unused);
        }
        let mut chars = text.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if c.is_ascii_alphabetic() {
                return Ok(Self::Ganged(c));
            }
        }
        text.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Self::Fixed)
            .ok_or_else(|| ConfigError::InvalidGoal {
                text: text.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_options_over_defaults() {
        let text = "# adjust\niterations = 20\ntolerance=1e-10  # relative\n\nverbose = yes\n";
        let options = SolverOptions::parse(text).unwrap();
        assert_eq!(options.max_iters, 20);
        assert_eq!(options.tolerance, 1e-10);
        assert!(options.verbose);
        assert_eq!(options.lambda_init, SolverOptions::default().lambda_init);
    }

    #[test]
    fn reports_syntax_and_range_errors() {
        assert_eq!(
            SolverOptions::parse("iterations 20").err(),
            Some(ConfigError::Syntax {
                line: 1,
                text: "iterations 20".to_string()
            })
        );
        assert!(matches!(
            SolverOptions::parse("\nspeed = 3"),
            Err(ConfigError::UnknownKey { line: 2, .. })
        ));
        assert!(matches!(
            SolverOptions::parse("boost = 0.5"),
            Err(ConfigError::OutOfRange { key: "boost", .. })
        ));
        assert!(matches!(
            SolverOptions::parse("lambda_min = 0"),
            Err(ConfigError::OutOfRange { key: "lambda_min", .. })
        ));
        assert!(matches!(
            SolverOptions::parse("lambda_min = 1e-3\nlambda = 1e-4"),
            Err(ConfigError::OutOfRange { key: "lambda", .. })
        ));
        assert!(matches!(
            SolverOptions::parse("lambda = abc"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn goal_cells() {
        assert_eq!(GoalTarget::parse("  "), Ok(GoalTarget::Unused));
        assert_eq!(GoalTarget::parse("g"), Ok(GoalTarget::Ganged('g')));
        assert_eq!(GoalTarget::parse("-1.5"), Ok(GoalTarget::Fixed(-1.5)));
        assert!(GoalTarget::parse("1.2.3").is_err());
        assert!(GoalTarget::parse("ab").is_err());
    }
}
