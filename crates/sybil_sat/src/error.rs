//! SAT-layer errors.

use std::fmt;

use sybil_compile::OpSignature;

/// Failures while loading or parsing operator microcode.
#[derive(Debug)]
pub enum MicrocodeError {
    Io {
        sig: OpSignature,
        source: std::io::Error,
    },
    Parse {
        sig: OpSignature,
        line: usize,
    },
}

impl fmt::Display for MicrocodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MicrocodeError::Io { sig, source } => {
                write!(f, "microcode {}: {}", sig, source)
            }
            MicrocodeError::Parse { sig, line } => {
                write!(f, "microcode {}: malformed clause at line {}", sig, line)
            }
        }
    }
}

impl std::error::Error for MicrocodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MicrocodeError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Failures while injecting clauses.
#[derive(Debug)]
pub enum EngineError {
    Microcode(MicrocodeError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Microcode(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<MicrocodeError> for EngineError {
    fn from(e: MicrocodeError) -> Self {
        EngineError::Microcode(e)
    }
}
