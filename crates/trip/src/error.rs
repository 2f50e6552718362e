//! Error types for rule parsing, table construction, the wire codec and the
//! relaunch path.

use std::num::ParseIntError;
use std::path::PathBuf;

use thiserror::Error;

use crate::hexfloat::HexFloatError;

/// A user-supplied fault rule is invalid.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleError {
    #[error("empty fault rule")]
    Empty,

    #[error("unknown function \"{0}\", cannot trip")]
    UnknownFunction(String),

    #[error("cannot parse chance \"{0}\"")]
    InvalidChance(String),

    #[error("the chance {chance} (for {function}) is not positive")]
    ChanceNotPositive { function: String, chance: f64 },

    #[error("the chance {chance} (for {function}) is greater than 1")]
    ChanceAboveOne { function: String, chance: f64 },

    #[error("the chance for {0} is not a number")]
    ChanceNotANumber(String),

    #[error("{function} is not expected to return {error}")]
    UnexpectedError { function: String, error: String },

    #[error("too many fields in fault rule \"{0}\" (expected func[:chance[:error]])")]
    TooManyFields(String),
}

/// A fault table would exceed its fixed capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("overlong configuration ({count} >= {limit})")]
pub struct TableFull {
    pub count: usize,
    pub limit: usize,
}

/// An encoded configuration blob is structurally corrupt.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    #[error("configuration is not valid UTF-8")]
    NotUtf8,

    #[error("malformed trip configuration: record {record} has no {field} field")]
    MissingField { record: usize, field: &'static str },

    #[error("malformed trip configuration: record {record} has trailing fields")]
    TrailingField { record: usize },

    #[error("malformed trip chance \"{value}\" in record {record}: {source}")]
    InvalidChance {
        record: usize,
        value: String,
        source: HexFloatError,
    },

    #[error("malformed trip error code \"{value}\" in record {record}: {source}")]
    InvalidErrno {
        record: usize,
        value: String,
        source: ParseIntError,
    },

    #[error("invalid rule in record {record}: {source}")]
    Rule { record: usize, source: RuleError },

    #[error(transparent)]
    Full(#[from] TableFull),
}

/// The bootstrap could not replace itself with the target command.
#[derive(Debug, Error)]
pub enum RelaunchError {
    #[error("no command to run")]
    EmptyCommand,

    #[error("readlink {path}: {source}")]
    SelfPath {
        path: &'static str,
        source: std::io::Error,
    },

    #[error("path of the running executable exceeds {limit} bytes")]
    SelfPathTooLong { limit: usize },

    #[error("running executable {0} has no parent directory")]
    NoParentDirectory(PathBuf),

    #[error("interposition object not found at {path}")]
    PreloadMissing { path: PathBuf },

    #[error("argument contains an interior NUL byte: {0:?}")]
    InteriorNul(String),

    #[error("exec {program}: {source}")]
    Exec {
        program: String,
        source: std::io::Error,
    },
}
