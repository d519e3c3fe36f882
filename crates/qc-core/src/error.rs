use std::path::PathBuf;

use thiserror::Error;

/// Fatal conditions the command line must tell apart from plain I/O failures.
#[derive(Debug, Error)]
pub enum QcError {
    #[error("illegal parameter '{param}': {message}")]
    IllegalParameter { param: String, message: String },
    #[error("missing information: {0}")]
    MissingInformation(String),
    #[error("{}: {message}", path.display())]
    Format { path: PathBuf, message: String },
}

impl QcError {
    pub fn illegal(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::IllegalParameter {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable code used by the `--json` output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::IllegalParameter { .. } => "illegal_parameters",
            Self::MissingInformation(_) => "missing_information",
            Self::Format { .. } => "input_file_corrupt",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::IllegalParameter { .. } => 6,
            Self::MissingInformation(_) => 9,
            Self::Format { .. } => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn illegal_parameter_names_the_offending_input() {
        let err = QcError::illegal("in_trafo", "invalid number of files, expected 3");
        let msg = err.to_string();
        assert!(msg.contains("in_trafo"), "{}", msg);
        assert!(msg.contains("expected 3"), "{}", msg);
        assert_eq!(err.exit_code(), 6);
    }

    #[test]
    fn codes_are_distinct() {
        let errs = [
            QcError::illegal("x", "y"),
            QcError::MissingInformation("z".into()),
            QcError::Format {
                path: PathBuf::from("a.json"),
                message: "eof".into(),
            },
        ];
        let mut codes: Vec<i32> = errs.iter().map(|e| e.exit_code()).collect();
        codes.dedup();
        assert_eq!(codes.len(), 3);
        assert!(errs[2].to_string().starts_with("a.json"));
    }

    #[test]
    fn survives_anyhow_round_trip() {
        let err: anyhow::Error = QcError::MissingInformation("no MS2 spectra".into()).into();
        let err = err.context("metric 'MS2 ID Rate' failed");
        let found = err.chain().find_map(|e| e.downcast_ref::<QcError>());
        assert!(matches!(found, Some(QcError::MissingInformation(_))));
    }
}
