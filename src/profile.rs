use std::fmt;

use clap::ValueEnum;
use qat_ir::pass::{ModulePass, PassManager, PipelineReport};
use qat_ir::validation::validate_all;
use qat_ir::{IrContext, IrModule};
use qat_rules::SharedAllocationManager;

use crate::error::QatError;
use crate::validator::ProfileValidator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProfileKind {
    /// Rules as configured, no profile validation.
    Generic,
    /// Every rule group on; output restricted to base-profile instructions.
    Base,
}

impl ProfileKind {
    pub fn name(self) -> &'static str {
        match self {
            ProfileKind::Generic => "generic",
            ProfileKind::Base => "base",
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A target profile: the pipeline that adapts a module to it, the allocation
/// state that pipeline draws from, and an optional validator for the result.
pub struct Profile {
    kind: ProfileKind,
    qubit_allocation: SharedAllocationManager,
    result_allocation: SharedAllocationManager,
    pipeline: PassManager,
    validator: Option<ProfileValidator>,
}

impl Profile {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn kind(&self) -> ProfileKind {
        self.kind
    }

    pub fn qubit_allocation(&self) -> &SharedAllocationManager {
        &self.qubit_allocation
    }

    pub fn result_allocation(&self) -> &SharedAllocationManager {
        &self.result_allocation
    }

    pub fn pipeline(&self) -> &PassManager {
        &self.pipeline
    }

    pub fn validator(&self) -> Option<&ProfileValidator> {
        self.validator.as_ref()
    }

    /// Check the IR after every pass of [`Profile::apply`].
    pub fn set_verify_each(&mut self, verify: bool) {
        self.pipeline.set_verification(verify);
    }

    /// Run the pipeline over `module`.
    pub fn apply(
        &mut self,
        ctx: &mut IrContext,
        module: IrModule,
    ) -> Result<PipelineReport, QatError> {
        let _span = tracing::info_span!("profile", name = self.name()).entered();
        let report = self.pipeline.run(ctx, module)?;
        tracing::info!(
            qubits = self.qubit_allocation.peak(),
            results = self.result_allocation.peak(),
            "profile applied"
        );
        Ok(report)
    }

    /// Check that `module` is well formed and, if the profile has a
    /// validator, that it only uses what the profile allows.
    pub fn validate(&self, ctx: &IrContext, module: IrModule) -> Result<(), QatError> {
        let structural = validate_all(ctx, module);
        if !structural.is_ok() {
            return Err(QatError::Malformed(structural.to_string()));
        }
        let Some(validator) = &self.validator else {
            return Ok(());
        };
        let violations = validator.verify(ctx, module);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(QatError::Validation {
                profile: self.name().to_owned(),
                violations,
            })
        }
    }
}

/// Assembles a [`Profile`]; handed to each component's setup function.
pub struct ProfileBuilder {
    kind: ProfileKind,
    qubit_allocation: SharedAllocationManager,
    result_allocation: SharedAllocationManager,
    pipeline: PassManager,
    validator: Option<ProfileValidator>,
}

impl ProfileBuilder {
    /// Start with fresh, unbounded allocation managers.
    pub fn new(kind: ProfileKind) -> Self {
        Self {
            kind,
            qubit_allocation: SharedAllocationManager::new_dynamic(false),
            result_allocation: SharedAllocationManager::new_dynamic(false),
            pipeline: PassManager::new(),
            validator: None,
        }
    }

    pub fn kind(&self) -> ProfileKind {
        self.kind
    }

    pub fn qubit_allocation(&self) -> &SharedAllocationManager {
        &self.qubit_allocation
    }

    pub fn result_allocation(&self) -> &SharedAllocationManager {
        &self.result_allocation
    }

    pub fn set_qubit_allocation(&mut self, manager: SharedAllocationManager) {
        self.qubit_allocation = manager;
    }

    pub fn set_result_allocation(&mut self, manager: SharedAllocationManager) {
        self.result_allocation = manager;
    }

    pub fn add_pass(&mut self, pass: impl ModulePass + 'static) {
        self.pipeline.add_pass(pass);
    }

    pub fn set_validator(&mut self, validator: ProfileValidator) {
        self.validator = Some(validator);
    }

    pub fn build(self) -> Profile {
        Profile {
            kind: self.kind,
            qubit_allocation: self.qubit_allocation,
            result_allocation: self.result_allocation,
            pipeline: self.pipeline,
            validator: self.validator,
        }
    }
}
