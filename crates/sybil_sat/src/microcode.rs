//! The operator microcode cache.
//!
//! One clause template exists per `(op, width, signed)` signature,
//! stored on disk as a newline-separated list of clauses; each clause
//! is a space-separated list of signed 1-based abstract bit indices
//! terminated by `0`. A missing template is synthesised on demand and
//! written back. The first load of a signature is memoised for the
//! process lifetime; distinct signatures load independently behind
//! per-signature locks, so worker threads sharing a compiler do not
//! serialise on each other.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use sybil_compile::OpSignature;
use tracing::{debug, warn};

use crate::builder;
use crate::error::MicrocodeError;

/// A loaded template: clauses over abstract indices.
pub type Template = Vec<Vec<i32>>;

type Slot = Arc<Mutex<Option<Arc<Template>>>>;

pub struct MicrocodeCache {
    dir: PathBuf,
    slots: Mutex<HashMap<OpSignature, Slot>>,
}

impl MicrocodeCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        MicrocodeCache {
            dir: dir.into(),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// The cache directory: `SYBIL_MICROCODE_DIR` or `.microcode`
    /// beside the working directory.
    pub fn default_dir() -> PathBuf {
        std::env::var_os("SYBIL_MICROCODE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".microcode"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The template for a signature, loading or synthesising it on
    /// first use.
    pub fn require(&self, sig: OpSignature) -> Result<Arc<Template>, MicrocodeError> {
        let slot: Slot = {
            let mut slots = self.slots.lock().expect("microcode cache poisoned");
            slots.entry(sig).or_default().clone()
        };

        let mut guard = slot.lock().expect("microcode slot poisoned");
        if let Some(t) = guard.as_ref() {
            return Ok(t.clone());
        }

        let template = Arc::new(self.load_or_build(sig)?);
        *guard = Some(template.clone());
        Ok(template)
    }

    fn path_of(&self, sig: OpSignature) -> PathBuf {
        self.dir.join(format!("{}.mc", sig))
    }

    fn load_or_build(&self, sig: OpSignature) -> Result<Template, MicrocodeError> {
        let path = self.path_of(sig);
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                debug!(%sig, path = %path.display(), "loading microcode");
                parse_template(sig, &text)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(%sig, "synthesising microcode");
                let template = builder::synthesize(sig);
                if let Err(e) = self.store(&path, &template) {
                    warn!(%sig, error = %e, "could not persist microcode");
                }
                Ok(template)
            }
            Err(e) => Err(MicrocodeError::Io { sig, source: e }),
        }
    }

    fn store(&self, path: &Path, template: &Template) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(path, serialize_template(template))
    }
}

fn serialize_template(template: &Template) -> String {
    let mut out = String::new();
    for clause in template {
        for lit in clause {
            out.push_str(&lit.to_string());
            out.push(' ');
        }
        out.push_str("0\n");
    }
    out
}

fn parse_template(sig: OpSignature, text: &str) -> Result<Template, MicrocodeError> {
    let mut out = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut clause = Vec::new();
        let mut terminated = false;
        for tok in line.split_whitespace() {
            let lit: i32 = tok.parse().map_err(|_| MicrocodeError::Parse {
                sig,
                line: lineno + 1,
            })?;
            if lit == 0 {
                terminated = true;
                break;
            }
            clause.push(lit);
        }
        if !terminated {
            return Err(MicrocodeError::Parse {
                sig,
                line: lineno + 1,
            });
        }
        out.push(clause);
    }
    Ok(out)
}
