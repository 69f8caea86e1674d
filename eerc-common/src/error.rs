use std::{fmt, io, path::PathBuf};

use eerc_circuit::UnknownOperation;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Which half of an input document a value belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputSection {
    Public,
    Private,
}

impl InputSection {
    /// Field name used in the JSON input document.
    pub fn json_key(&self) -> &'static str {
        match self {
            InputSection::Public => "PubIns",
            InputSection::Private => "PrivIns",
        }
    }
}

impl fmt::Display for InputSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSection::Public => f.write_str("public"),
            InputSection::Private => f.write_str("private"),
        }
    }
}

/// Every way a proof request can fail. Each stage fails fast; nothing is retried.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to read input file {}: {source}", path.display())]
    InputRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed input document: {0}")]
    InputParse(String),

    #[error("unknown operation '{0}'")]
    UnknownOperation(String),

    #[error("{section} input count mismatch: circuit declares {expected} slots, got {actual}")]
    InputShapeMismatch {
        section: InputSection,
        expected: usize,
        actual: usize,
    },

    #[error("{section} input #{index} out of range: {reason}")]
    InputRange {
        section: InputSection,
        index: usize,
        reason: String,
    },

    #[error("circuit compilation failed: {0}")]
    Compilation(String),

    #[error("failed to load persisted artifacts: {0}")]
    KeyLoad(String),

    #[error("proving failed: {0}")]
    Proving(String),

    #[error("proof encoding failed: {0}")]
    Encoding(String),

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("artifact export failed: {0}")]
    Export(String),
}

/// Payload-free discriminant of [`PipelineError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    InputRead,
    InputParse,
    UnknownOperation,
    InputShapeMismatch,
    InputRange,
    Compilation,
    KeyLoad,
    Proving,
    Encoding,
    Write,
    Export,
}

impl FailureKind {
    pub fn error_code(&self) -> &'static str {
        match self {
            FailureKind::InputRead => "INPUT_READ",
            FailureKind::InputParse => "INPUT_PARSE",
            FailureKind::UnknownOperation => "UNKNOWN_OPERATION",
            FailureKind::InputShapeMismatch => "INPUT_SHAPE_MISMATCH",
            FailureKind::InputRange => "INPUT_RANGE",
            FailureKind::Compilation => "COMPILATION",
            FailureKind::KeyLoad => "KEY_LOAD",
            FailureKind::Proving => "PROVING",
            FailureKind::Encoding => "ENCODING",
            FailureKind::Write => "WRITE",
            FailureKind::Export => "EXPORT",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.error_code())
    }
}

impl PipelineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::InputRead { .. } => FailureKind::InputRead,
            PipelineError::InputParse(_) => FailureKind::InputParse,
            PipelineError::UnknownOperation(_) => FailureKind::UnknownOperation,
            PipelineError::InputShapeMismatch { .. } => FailureKind::InputShapeMismatch,
            PipelineError::InputRange { .. } => FailureKind::InputRange,
            PipelineError::Compilation(_) => FailureKind::Compilation,
            PipelineError::KeyLoad(_) => FailureKind::KeyLoad,
            PipelineError::Proving(_) => FailureKind::Proving,
            PipelineError::Encoding(_) => FailureKind::Encoding,
            PipelineError::Write { .. } => FailureKind::Write,
            PipelineError::Export(_) => FailureKind::Export,
        }
    }

    /// Stable machine-readable code, e.g. `INPUT_SHAPE_MISMATCH`.
    pub fn error_code(&self) -> &'static str {
        self.kind().error_code()
    }
}

impl From<UnknownOperation> for PipelineError {
    fn from(err: UnknownOperation) -> Self {
        PipelineError::UnknownOperation(err.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_kinds() {
        let err = PipelineError::InputShapeMismatch {
            section: InputSection::Private,
            expected: 2,
            actual: 3,
        };
        assert_eq!(err.kind(), FailureKind::InputShapeMismatch);
        assert_eq!(err.error_code(), "INPUT_SHAPE_MISMATCH");
        assert_eq!(
            err.to_string(),
            "private input count mismatch: circuit declares 2 slots, got 3"
        );
    }

    #[test]
    fn unknown_operation_converts() {
        let err: PipelineError = UnknownOperation("mint".into()).into();
        assert_eq!(err.kind(), FailureKind::UnknownOperation);
        assert!(err.to_string().contains("mint"));
    }
}
