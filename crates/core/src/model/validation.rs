use thiserror::Error;

use crate::model::catalog::QuestionKind;
use crate::model::ids::{KpiId, QuestionId, UploadId};

/// Input rejected before it reaches the response store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("{question} expects a {expected} answer")]
    WrongAnswerType {
        question: QuestionId,
        expected: QuestionKind,
    },

    #[error("{option:?} is not an option of {question}")]
    UnknownOption { question: QuestionId, option: String },

    #[error("{option:?} was selected more than once for {question}")]
    DuplicateOption { question: QuestionId, option: String },

    #[error("{kpi} has unanswered required questions: {}", join_ids(.questions))]
    RequiredUnanswered {
        kpi: KpiId,
        questions: Vec<QuestionId>,
    },

    #[error("file name cannot be empty")]
    EmptyFileName,

    #[error("{upload} does not accept .{extension} files (allowed: {})", .allowed.join(", "))]
    ExtensionNotAllowed {
        upload: UploadId,
        extension: String,
        allowed: Vec<String>,
    },

    #[error("{upload} accepts files up to {max_bytes} bytes, got {size_bytes}")]
    FileTooLarge {
        upload: UploadId,
        size_bytes: u64,
        max_bytes: u64,
    },
}

fn join_ids(ids: &[QuestionId]) -> String {
    ids.iter()
        .map(QuestionId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_unanswered_lists_question_ids() {
        let err = ValidationError::RequiredUnanswered {
            kpi: KpiId::new("env-energy"),
            questions: vec![QuestionId::new("q1"), QuestionId::new("q2")],
        };
        assert_eq!(
            err.to_string(),
            "env-energy has unanswered required questions: q1, q2"
        );
    }
}
