//! Command-line interface for the QIR adaptation tool.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Parser;
use qat_ir::IrContext;
use qat_ir::parser::parse_module;
use qat_ir::printer::print_module;
use qat_ir::validation::validate_all;
use qat_rules::FactoryConfig;

use crate::error::QatError;
use crate::generator::{AllocationConfig, ProfileGenerator};
use crate::profile::ProfileKind;

#[derive(Parser, Debug)]
#[command(name = "qat")]
#[command(about = "Adapt quantum IR modules to a target execution profile", long_about = None)]
pub struct Cli {
    /// Module to adapt or validate
    #[arg(required_unless_present = "dump_config")]
    pub input: Option<PathBuf>,

    /// Rewrite the module into the profile (the default action)
    #[arg(long)]
    pub generate: bool,

    /// Check the module against the profile
    #[arg(long)]
    pub validate: bool,

    #[arg(long, value_enum, default_value_t = ProfileKind::Generic)]
    pub profile: ProfileKind,

    /// Write output here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    pub dump_config: bool,

    /// Check IR well-formedness on input and after every pass
    #[arg(long)]
    pub verify_module: bool,

    #[arg(long)]
    pub qubit_limit: Option<u64>,

    #[arg(long)]
    pub result_limit: Option<u64>,

    /// Fail on instructions no rule handles
    #[arg(long)]
    pub strict: bool,

    /// Log debug output to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    fn configure(&self, generator: &mut ProfileGenerator) -> Result<(), QatError> {
        let config = generator.config_mut();
        if let Some(path) = &self.config {
            config.load_file(path)?;
        }
        if let Some(allocation) = config.get_mut::<AllocationConfig>("allocation") {
            if self.qubit_limit.is_some() {
                allocation.qubit_limit = self.qubit_limit;
            }
            if self.result_limit.is_some() {
                allocation.result_limit = self.result_limit;
            }
        }
        if self.strict {
            if let Some(rules) = config.get_mut::<FactoryConfig>("transformation-rules") {
                rules.strict = true;
            }
        }
        Ok(())
    }
}

/// Run the command line, writing results to `-o` or to `stdout`.
pub fn run(cli: &Cli, stdout: &mut dyn Write) -> Result<(), QatError> {
    let mut generator = ProfileGenerator::with_defaults();
    cli.configure(&mut generator)?;

    if cli.dump_config {
        let text = generator.config().to_toml()?;
        return emit(cli.output.as_deref(), stdout, &text);
    }

    let Some(input) = &cli.input else {
        return Ok(());
    };
    let source = std::fs::read_to_string(input).map_err(|e| QatError::io(input, e))?;
    let mut ctx = IrContext::new();
    let module = parse_module(&mut ctx, &input.display().to_string(), &source)?;
    tracing::debug!(input = %input.display(), "module parsed");

    if cli.verify_module {
        let result = validate_all(&ctx, module);
        if !result.is_ok() {
            return Err(QatError::Malformed(result.to_string()));
        }
    }

    let mut profile = generator.new_profile(cli.profile)?;
    profile.set_verify_each(cli.verify_module);

    let generate = cli.generate || !cli.validate;
    if generate {
        let report = profile.apply(&mut ctx, module)?;
        tracing::debug!(%report, "pipeline finished");
    }
    if cli.validate {
        profile.validate(&ctx, module)?;
        tracing::info!(profile = profile.name(), "module is valid");
    }
    if generate {
        emit(cli.output.as_deref(), stdout, &print_module(&ctx, module.op()))?;
    }
    Ok(())
}

fn emit(output: Option<&Path>, stdout: &mut dyn Write, text: &str) -> Result<(), QatError> {
    match output {
        Some(path) => std::fs::write(path, text).map_err(|e| QatError::io(path, e)),
        None => stdout
            .write_all(text.as_bytes())
            .map_err(|e| QatError::io("<stdout>", e)),
    }
}
