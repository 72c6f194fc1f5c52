//! The process-wide context.
//!
//! Every manager the pipeline shares lives here: the expression pool,
//! the type manager, the diagram manager and the encoding manager, plus
//! the microcode directory and the cancellation flag the algorithms
//! poll between injections. There are no hidden globals; everything
//! reaches its collaborators through this struct.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use sybil_compile::EncodingMgr;
use sybil_dd::AddMgr;
use sybil_expr::ExprPool;
use sybil_sat::MicrocodeCache;
use sybil_type::TypeMgr;

pub struct Context {
    pub pool: ExprPool,
    pub tm: TypeMgr,
    pub dd: AddMgr,
    pub enc: EncodingMgr,
    pub microcode_dir: PathBuf,
    cancel: AtomicBool,
}

impl Context {
    pub fn new() -> Self {
        Context {
            pool: ExprPool::new(),
            tm: TypeMgr::new(),
            dd: AddMgr::new(),
            enc: EncodingMgr::new(),
            microcode_dir: MicrocodeCache::default_dir(),
            cancel: AtomicBool::new(false),
        }
    }

    pub fn with_microcode_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.microcode_dir = dir.into();
        self
    }

    /// Requests cancellation of the running algorithm.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Polled by algorithms between consecutive injections and solves.
    pub fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Clears the flag before starting a new run.
    pub fn reset_cancel(&self) {
        self.cancel.store(false, Ordering::Relaxed);
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
