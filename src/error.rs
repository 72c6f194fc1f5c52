//! Driver-level errors and exit codes.
//!
//! Compilation- and analysis-time failures are collected at the top of
//! a command and surfaced here; nothing is swallowed. UNSAT and
//! "unknown" verification outcomes are results, not errors.

use std::fmt;

use sybil_base::SpannedError;
use sybil_compile::CompileError;
use sybil_model::ModelError;
use sybil_sat::EngineError;
use sybil_witness::store::StoreError;

#[derive(Debug)]
pub enum Error {
    /// Malformed input, reported at line/column.
    Parse(SpannedError),
    /// Resolution, type or semantic errors from analysis.
    Analysis(Vec<ModelError>),
    Compile(CompileError),
    Engine(EngineError),
    Witness(StoreError),
    /// Temporal properties reach the stubbed LTL slot.
    TemporalUnsupported,
    /// Trace dump with an unknown format.
    UnsupportedFormat(String),
    /// Ill-formed command.
    Command(String),
    Io(std::io::Error),
}

impl Error {
    /// Process exit code per error class: 2 for parse/analysis
    /// failures, 1 for everything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Parse(_) | Error::Analysis(_) => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Parse(e) => write!(f, "ParseError: {}", e),
            Error::Analysis(errors) => {
                writeln!(f, "{} analysis error(s):", errors.len())?;
                for e in errors {
                    writeln!(f, "  {}", e)?;
                }
                Ok(())
            }
            Error::Compile(e) => write!(f, "CompileError: {}", e),
            Error::Engine(e) => write!(f, "SolverError: {}", e),
            Error::Witness(e) => write!(f, "WitnessError: {}", e),
            Error::TemporalUnsupported => {
                write!(f, "temporal properties are not supported yet")
            }
            Error::UnsupportedFormat(fmt_name) => {
                write!(f, "CommandError: format `{}` is not supported", fmt_name)
            }
            Error::Command(msg) => write!(f, "CommandError: {}", msg),
            Error::Io(e) => write!(f, "IoError: {}", e),
        }
    }
}

impl std::error::Error for Error {}

impl From<SpannedError> for Error {
    fn from(e: SpannedError) -> Self {
        Error::Parse(e)
    }
}

impl From<Vec<ModelError>> for Error {
    fn from(e: Vec<ModelError>) -> Self {
        Error::Analysis(e)
    }
}

impl From<ModelError> for Error {
    fn from(e: ModelError) -> Self {
        Error::Analysis(vec![e])
    }
}

impl From<CompileError> for Error {
    fn from(e: CompileError) -> Self {
        Error::Compile(e)
    }
}

impl From<EngineError> for Error {
    fn from(e: EngineError) -> Self {
        Error::Engine(e)
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Error::Witness(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}
