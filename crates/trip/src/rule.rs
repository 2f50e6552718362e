//! Fault rules: "fail `function` with probability `chance`, reporting `errno`".
//!
//! Rules are written on the command line as `func[:chance[:error]]` and
//! several can be joined with commas:
//!
//! ```text
//! open:0.5:ENOENT,malloc:0.01,write:EIO
//! ```

use crate::error::RuleError;
use crate::registry::{self, Interceptable};

/// Characters separating the fields of a single rule. `/` is accepted for
/// compatibility with older command lines.
const FIELD_DELIMITERS: &[char] = &[':', '/'];

/// Separates rules within one argument.
pub const RULE_DELIMITER: char = ',';

/// A validated fault rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaultRule {
    function: &'static Interceptable,
    chance: f64,
    errno: i32,
}

impl FaultRule {
    /// Creates a rule, rejecting chances outside `(0, 1]`.
    ///
    /// An `errno` of `0` means "pick from the function's plausible set". A
    /// nonzero `errno` is not checked against that set here: decoded rules
    /// may come from a differently built encoder.
    pub fn new(function: &'static Interceptable, chance: f64, errno: i32) -> Result<Self, RuleError> {
        validate_chance(function.name, chance)?;
        Ok(Self {
            function,
            chance,
            errno,
        })
    }

    /// Parses a single `func[:chance[:error]]` rule.
    pub fn parse(text: &str, default_chance: f64) -> Result<Self, RuleError> {
        let mut fields = text.split(FIELD_DELIMITERS);

        let name = fields.next().filter(|n| !n.is_empty()).ok_or(RuleError::Empty)?;
        let function =
            registry::lookup(name).ok_or_else(|| RuleError::UnknownFunction(name.to_string()))?;

        let mut chance_field = fields.next();
        let mut error_field = fields.next();
        if fields.next().is_some() {
            return Err(RuleError::TooManyFields(text.to_string()));
        }

        // `open:ENOENT` names an error without a chance.
        if error_field.is_none() && chance_field.is_some_and(|c| c.starts_with(['e', 'E'])) {
            error_field = chance_field.take();
        }

        let chance = match chance_field {
            Some(c) => c
                .parse::<f64>()
                .map_err(|_| RuleError::InvalidChance(c.to_string()))?,
            None => default_chance,
        };

        let errno = match error_field {
            Some(e) => {
                function
                    .errno_by_name(e)
                    .ok_or_else(|| RuleError::UnexpectedError {
                        function: function.name.to_string(),
                        error: e.to_ascii_uppercase(),
                    })?
                    .code
            }
            None => 0,
        };

        Self::new(function, chance, errno)
    }

    /// Parses a comma-separated list of rules. Empty items are ignored.
    pub fn parse_list(text: &str, default_chance: f64) -> Result<Vec<Self>, RuleError> {
        text.split(RULE_DELIMITER)
            .filter(|item| !item.is_empty())
            .map(|item| Self::parse(item, default_chance))
            .collect()
    }

    pub fn function(&self) -> &'static Interceptable {
        self.function
    }

    pub fn name(&self) -> &'static str {
        self.function.name
    }

    pub fn chance(&self) -> f64 {
        self.chance
    }

    /// The explicit error code, or `0` for "any plausible error".
    pub fn errno(&self) -> i32 {
        self.errno
    }
}

/// Checks that `chance` is a probability in `(0, 1]`.
pub fn validate_chance(function: &str, chance: f64) -> Result<(), RuleError> {
    if chance.is_nan() {
        return Err(RuleError::ChanceNotANumber(function.to_string()));
    }
    if chance <= 0.0 {
        return Err(RuleError::ChanceNotPositive {
            function: function.to_string(),
            chance,
        });
    }
    if chance > 1.0 {
        return Err(RuleError::ChanceAboveOne {
            function: function.to_string(),
            chance,
        });
    }
    Ok(())
}
