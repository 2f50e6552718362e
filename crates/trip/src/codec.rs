//! Text encoding of the fault configuration.
//!
//! The bootstrap hands the table to the target through a single environment
//! variable. The format is:
//!
//! ```text
//! blob  := ["D"] (entry RS)*
//! entry := name GS chance GS errno
//! ```
//!
//! `GS` (0x1D) and `RS` (0x1E) are ASCII group and record separators, which
//! never occur in function names or numbers. `chance` is a hexadecimal float
//! (see [`crate::hexfloat`]) so the probability survives bit-exactly; `errno`
//! is a hexadecimal integer. A leading `D` turns on debug output in the
//! decoding process.
//!
//! Unknown function names are dropped so that a bootstrap and an
//! interposition object from different builds can still talk to each other.
//! Every other defect is an error.

use tracing::debug;

use crate::error::{CodecError, TableFull};
use crate::hexfloat;
use crate::registry;
use crate::rule::FaultRule;
use crate::table::{FaultTable, MAX_RULES};

/// Environment variable carrying the encoded configuration.
pub const CONFIG_ENV: &str = "____TRIP_CONFIGURATION";

/// Separates the fields of one entry.
pub const GROUP_SEPARATOR: char = '\u{1d}';

/// Terminates each entry.
pub const RECORD_SEPARATOR: char = '\u{1e}';

/// Leading marker enabling debug output.
pub const DEBUG_MARKER: char = 'D';

/// Everything that crosses the exec boundary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configuration {
    pub table: FaultTable,
    pub debug: bool,
}

impl Configuration {
    pub fn new(table: FaultTable, debug: bool) -> Self {
        Self { table, debug }
    }
}

/// Result of [`decode`]: the configuration plus names that were skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decoded {
    pub configuration: Configuration,
    /// Function names the decoder did not recognise, in blob order.
    pub dropped: Vec<String>,
}

/// Encodes `config` into its wire form.
pub fn encode(config: &Configuration) -> String {
    let mut blob = String::with_capacity(1 + config.table.len() * 32);
    if config.debug {
        blob.push(DEBUG_MARKER);
    }
    for rule in &config.table {
        blob.push_str(rule.name());
        blob.push(GROUP_SEPARATOR);
        blob.push_str(&hexfloat::format(rule.chance()));
        blob.push(GROUP_SEPARATOR);
        blob.push_str(&format!("{:x}", rule.errno()));
        blob.push(RECORD_SEPARATOR);
    }
    blob
}

/// Decodes a wire blob.
pub fn decode(blob: &str) -> Result<Decoded, CodecError> {
    let (debug, body) = match blob.strip_prefix(DEBUG_MARKER) {
        Some(rest) => (true, rest),
        None => (false, blob),
    };

    let mut table = FaultTable::new();
    let mut dropped = Vec::new();

    for (record, entry) in body
        .split(RECORD_SEPARATOR)
        .enumerate()
        .filter(|(_, entry)| !entry.is_empty())
    {
        let mut fields = entry.split(GROUP_SEPARATOR);
        let name = fields.next().unwrap_or_default();

        let Some(function) = registry::lookup(name) else {
            debug!(function = name, "unknown function");
            dropped.push(name.to_string());
            continue;
        };

        if table.len() >= MAX_RULES {
            return Err(CodecError::Full(TableFull {
                count: table.len(),
                limit: MAX_RULES,
            }));
        }

        let chance_text = fields.next().ok_or(CodecError::MissingField {
            record,
            field: "chance",
        })?;
        let chance = hexfloat::parse(chance_text).map_err(|source| CodecError::InvalidChance {
            record,
            value: chance_text.to_string(),
            source,
        })?;

        let errno_text = fields.next().ok_or(CodecError::MissingField {
            record,
            field: "error",
        })?;
        let errno = parse_errno(errno_text).map_err(|source| CodecError::InvalidErrno {
            record,
            value: errno_text.to_string(),
            source,
        })?;

        if fields.next().is_some() {
            return Err(CodecError::TrailingField { record });
        }

        let rule = FaultRule::new(function, chance, errno)
            .map_err(|source| CodecError::Rule { record, source })?;
        debug!(function = name, chance, errno, "registering");
        table.push(rule)?;
    }

    Ok(Decoded {
        configuration: Configuration { table, debug },
        dropped,
    })
}

/// Hex integer as written by `{:x}`; negative codes appear in two's complement.
fn parse_errno(text: &str) -> Result<i32, std::num::ParseIntError> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u32::from_str_radix(digits, 16).map(|v| v as i32)
}
