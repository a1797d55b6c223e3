//! Module passes and the pipeline that runs them.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

use derive_more::Display;

use crate::context::IrContext;
use crate::module::IrModule;
use crate::validation;

pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

#[derive(Debug, Display)]
pub enum PassError {
    #[display("pass `{pass}` failed: {source}")]
    Failed { pass: String, source: BoxError },
    #[display("IR validation failed after `{pass}`:\n{report}")]
    Invalid { pass: String, report: String },
}

impl PassError {
    pub fn failed(pass: impl Into<String>, source: impl Into<BoxError>) -> Self {
        PassError::Failed {
            pass: pass.into(),
            source: source.into(),
        }
    }

    /// The error reported by the pass itself, for downcasting.
    pub fn pass_error(&self) -> Option<&(dyn Error + Send + Sync + 'static)> {
        match self {
            PassError::Failed { source, .. } => Some(source.as_ref()),
            PassError::Invalid { .. } => None,
        }
    }
}

impl Error for PassError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PassError::Failed { source, .. } => Some(source.as_ref()),
            PassError::Invalid { .. } => None,
        }
    }
}

/// What a pass did to the module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassOutcome {
    pub modified: bool,
    /// Named counters, reported in the pipeline summary.
    pub statistics: BTreeMap<&'static str, usize>,
}

impl PassOutcome {
    pub fn unchanged() -> Self {
        Self::default()
    }

    pub fn with_stat(mut self, name: &'static str, value: usize) -> Self {
        self.statistics.insert(name, value);
        self
    }
}

/// A transformation over a whole module.
pub trait ModulePass {
    fn name(&self) -> &str;

    fn run(&mut self, ctx: &mut IrContext, module: IrModule) -> Result<PassOutcome, PassError>;
}

/// Outcomes of a pipeline run, in pass order.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub passes: Vec<(String, PassOutcome)>,
}

impl PipelineReport {
    pub fn modified(&self) -> bool {
        self.passes.iter().any(|(_, outcome)| outcome.modified)
    }

    pub fn outcome(&self, pass: &str) -> Option<&PassOutcome> {
        self.passes
            .iter()
            .find(|(name, _)| name == pass)
            .map(|(_, outcome)| outcome)
    }
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, outcome) in &self.passes {
            write!(f, "{name}: {}", if outcome.modified { "modified" } else { "unchanged" })?;
            for (stat, value) in &outcome.statistics {
                write!(f, ", {stat}={value}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Ordered list of passes run once over a module.
#[derive(Default)]
pub struct PassManager {
    passes: Vec<Box<dyn ModulePass>>,
    verify_each: bool,
}

impl PassManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the module after every pass and fail on the first broken one.
    pub fn with_verification(mut self, verify_each: bool) -> Self {
        self.verify_each = verify_each;
        self
    }

    pub fn set_verification(&mut self, verify_each: bool) {
        self.verify_each = verify_each;
    }

    pub fn add_pass(&mut self, pass: impl ModulePass + 'static) {
        self.passes.push(Box::new(pass));
    }

    pub fn add_boxed_pass(&mut self, pass: Box<dyn ModulePass>) {
        self.passes.push(pass);
    }

    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn run(
        &mut self,
        ctx: &mut IrContext,
        module: IrModule,
    ) -> Result<PipelineReport, PassError> {
        let mut report = PipelineReport::default();
        for pass in &mut self.passes {
            let name = pass.name().to_owned();
            let _span = tracing::info_span!("pass", name = %name).entered();

            let outcome = pass.run(ctx, module)?;
            tracing::debug!(
                modified = outcome.modified,
                stats = ?outcome.statistics,
                "pass finished"
            );

            if self.verify_each {
                let result = validation::validate_all(ctx, module);
                if !result.is_ok() {
                    return Err(PassError::Invalid {
                        pass: name,
                        report: result.to_string(),
                    });
                }
            }
            report.passes.push((name, outcome));
        }
        Ok(report)
    }
}
