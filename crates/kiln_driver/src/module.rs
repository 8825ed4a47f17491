//! The language module collaborator.
//!
//! Semantic analysis and per-declaration code generation live outside the
//! driver. The [`Module`] trait is the surface the scheduler needs: decl
//! states, analysis entry points, the generation counter, the deletion set,
//! and the module's own error store. The driver shares the module with the
//! linker by reference; both observe the generation counter for
//! invalidation.

use crate::stage1::Stage1Flags;
use kiln_diagnostics::Diagnostic;

/// Identifies a declaration within the module.
pub type DeclId = u32;

/// The analysis/codegen state of one declaration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeclState {
    /// Never referenced; codegen for it is an invariant violation.
    Unreferenced,
    /// Analysis is running; seeing this from the queue is an invariant
    /// violation.
    InProgress,
    /// Marked stale by a generation bump; must be re-analyzed first.
    Outdated,
    /// Semantic analysis failed.
    SemaFailure,
    /// Semantic analysis failed but may succeed if re-run.
    SemaFailureRetryable,
    /// Code generation failed.
    CodegenFailure,
    /// Code generation failed but may succeed if re-run.
    CodegenFailureRetryable,
    /// A dependency failed; this declaration was not attempted.
    DependencyFailure,
    /// Fully analyzed and ready for codegen.
    Complete,
}

/// Errors surfaced by module operations.
#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    /// Analysis failed; the module has already recorded the user-facing
    /// errors, the caller just moves on.
    #[error("analysis failed")]
    AnalysisFail,
    /// Any other failure; the message is recorded on the declaration as a
    /// retryable codegen failure.
    #[error("{0}")]
    Retryable(String),
}

/// Work the module requests from the scheduler after analyzing the root.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModuleJob {
    /// Enqueue semantic analysis of a declaration.
    Analyze(DeclId),
    /// Enqueue code generation of a declaration.
    Codegen(DeclId),
    /// Enqueue a source-line update for a declaration.
    UpdateLineNumber(DeclId),
}

/// The semantic analyzer and IR generator, seen from the driver.
pub trait Module {
    /// Increments the generation counter, invalidating cached analysis.
    fn bump_generation(&mut self);

    /// Drops the loaded root source text to reclaim memory.
    fn unload_root_source(&mut self);

    /// Re-analyzes the root container, returning the declaration jobs to
    /// enqueue. `Err(AnalysisFail)` means errors were recorded and the
    /// update continues without new declaration work.
    fn analyze_root(&mut self) -> Result<Vec<ModuleJob>, ModuleError>;

    /// Current state of a declaration.
    fn decl_state(&self, decl: DeclId) -> DeclState;

    /// Forces a declaration's state (used for dependency-failure
    /// propagation).
    fn set_decl_state(&mut self, decl: DeclId, state: DeclState);

    /// Ensures a declaration is semantically analyzed.
    fn ensure_decl_analyzed(&mut self, decl: DeclId) -> Result<(), ModuleError>;

    /// True when the declaration's value is a function whose body analysis
    /// is still queued.
    fn is_queued_function(&self, decl: DeclId) -> bool;

    /// Runs body analysis and liveness for a queued function.
    fn analyze_body_and_liveness(&mut self, decl: DeclId) -> Result<(), ModuleError>;

    /// Records a retryable codegen failure message on a declaration.
    fn record_retryable_failure(&mut self, decl: DeclId, message: String);

    /// Declarations currently marked for deletion.
    fn take_deletion_candidates(&mut self) -> Vec<DeclId>;

    /// Number of declarations depending on `decl`.
    fn dependant_count(&self, decl: DeclId) -> usize;

    /// Deletes a declaration whose dependant set is empty.
    fn delete_decl(&mut self, decl: DeclId);

    /// Clears the deletion mark from a still-referenced declaration.
    fn clear_deletion_flag(&mut self, decl: DeclId);

    /// Number of user-facing errors the module has recorded.
    fn error_count(&self) -> usize;

    /// The module's recorded errors, for aggregation.
    fn errors(&self) -> Vec<Diagnostic>;

    /// Records the flags the stage1 back-end reported for the root module.
    fn set_stage1_flags(&mut self, flags: Stage1Flags);
}

/// A module with no declarations, used for compilations without a root
/// module (plain C builds, CRT sub-compilations).
#[derive(Debug, Default)]
pub struct NullModule {
    stage1_flags: Option<Stage1Flags>,
}

impl NullModule {
    /// Creates an empty module.
    pub fn new() -> Self {
        Self::default()
    }

    /// The stage1 flags recorded on this module, if any.
    pub fn stage1_flags(&self) -> Option<Stage1Flags> {
        self.stage1_flags
    }
}

impl Module for NullModule {
    fn bump_generation(&mut self) {}

    fn unload_root_source(&mut self) {}

    fn analyze_root(&mut self) -> Result<Vec<ModuleJob>, ModuleError> {
        Ok(Vec::new())
    }

    fn decl_state(&self, _decl: DeclId) -> DeclState {
        DeclState::Unreferenced
    }

    fn set_decl_state(&mut self, _decl: DeclId, _state: DeclState) {}

    fn ensure_decl_analyzed(&mut self, _decl: DeclId) -> Result<(), ModuleError> {
        Ok(())
    }

    fn is_queued_function(&self, _decl: DeclId) -> bool {
        false
    }

    fn analyze_body_and_liveness(&mut self, _decl: DeclId) -> Result<(), ModuleError> {
        Ok(())
    }

    fn record_retryable_failure(&mut self, _decl: DeclId, _message: String) {}

    fn take_deletion_candidates(&mut self) -> Vec<DeclId> {
        Vec::new()
    }

    fn dependant_count(&self, _decl: DeclId) -> usize {
        0
    }

    fn delete_decl(&mut self, _decl: DeclId) {}

    fn clear_deletion_flag(&mut self, _decl: DeclId) {}

    fn error_count(&self) -> usize {
        0
    }

    fn errors(&self) -> Vec<Diagnostic> {
        Vec::new()
    }

    fn set_stage1_flags(&mut self, flags: Stage1Flags) {
        self.stage1_flags = Some(flags);
    }
}
