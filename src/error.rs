use derive_more::{Display, Error, From};
use qat_ir::ParseError;
use qat_ir::pass::PassError;
use qat_rules::RuleError;

use crate::validator::Violation;

#[derive(Debug, Display, Error, From)]
pub enum QatError {
    #[display("cannot access {path}: {source}")]
    Io { path: String, source: std::io::Error },

    #[display("{_0}")]
    #[from]
    Parse(ParseError),

    #[display("{_0}")]
    #[from]
    Pass(PassError),

    #[display("{_0}")]
    #[from]
    Rule(RuleError),

    #[display("invalid configuration: {_0}")]
    #[from]
    ConfigParse(toml::de::Error),

    #[display("cannot write configuration: {_0}")]
    #[from]
    ConfigWrite(toml::ser::Error),

    #[display("unknown configuration section `{_0}`")]
    UnknownSection(#[error(not(source))] String),

    #[display("module is not well formed:\n{_0}")]
    Malformed(#[error(not(source))] String),

    #[display("module violates profile `{profile}`: {}", display_violations(violations))]
    Validation {
        profile: String,
        #[error(not(source))]
        violations: Vec<Violation>,
    },
}

impl QatError {
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        QatError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

fn display_violations(violations: &[Violation]) -> String {
    let mut out = format!("{} violation(s)", violations.len());
    for violation in violations {
        out.push_str("\n  ");
        out.push_str(&violation.to_string());
    }
    out
}
