//! Error types for grammar compilation and parsing.

use thiserror::Error;

/// Errors produced while turning grammar source into a runnable parser.
#[derive(Error, Debug)]
pub enum Error {
    /// The grammar source itself failed to parse. The message is already
    /// formatted as `<path>:<line> Unexpected <thing> at column <col>`.
    #[error("{0}")]
    GrammarParse(String),

    /// One or more static analysis checks failed.
    #[error("{}", format_analysis_errors(.0))]
    Analysis(Vec<String>),
}

/// A fatal error raised while evaluating host expressions, built-in
/// functions, or externs. Host errors abort the parse; PEG-level match
/// failures never use this type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HostError {
    /// Raised by the `throw()` built-in.
    #[error("{0}")]
    User(String),

    /// Bad arguments to a built-in, arithmetic failure, unresolved name,
    /// exceeded recursion ceiling, and similar runtime faults.
    #[error("{0}")]
    Runtime(String),
}

impl HostError {
    pub fn runtime(msg: impl Into<String>) -> HostError {
        HostError::Runtime(msg.into())
    }
}

fn format_analysis_errors(errors: &[String]) -> String {
    let mut s = String::from("Errors were found:\n  ");
    s.push_str(&errors.join("\n  "));
    s.push('\n');
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_error_formatting() {
        let err = Error::Analysis(vec![
            "Unknown rule \"foo\"".to_string(),
            "Unknown variable \"$2\" referenced".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "Errors were found:\n  Unknown rule \"foo\"\n  Unknown variable \"$2\" referenced\n"
        );
    }
}
