use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::question::Question;

/// Body of a question creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQuestionRequest {
    pub question: QuestionSpec,
}

/// A question specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSpec {
    pub option_one_text: String,
    pub option_two_text: String,
    /// ID of the authoring user.
    pub author: String,
}

impl QuestionSpec {
    /// Reject specs with blank fields.
    pub fn validate(&self) -> Result<()> {
        let blank = [
            ("optionOneText", &self.option_one_text),
            ("optionTwoText", &self.option_two_text),
            ("author", &self.author),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect::<Vec<_>>();
        if blank.is_empty() {
            Ok(())
        } else {
            Err(Error::validation(format!(
                "Missing question fields: {}",
                blank.join(", ")
            )))
        }
    }

    /// Convert this spec into a new question with a fresh ID.
    pub fn into_question(self) -> Question {
        Question::new(self.option_one_text, self.option_two_text, self.author)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_fields_are_reported() {
        assert!(QuestionSpec::example().validate().is_ok());

        let spec = QuestionSpec {
            option_one_text: " ".to_string(),
            author: String::new(),
            ..QuestionSpec::example()
        };
        match spec.validate() {
            Err(Error::Validation(msg)) => {
                assert!(msg.contains("optionOneText"));
                assert!(msg.contains("author"));
                assert!(!msg.contains("optionTwoText"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn into_question_keeps_texts() {
        let question = QuestionSpec::example().into_question();
        assert_eq!(question.option_one.text, "Tea");
        assert_eq!(question.option_two.text, "Coffee");
        assert_eq!(question.author, "u1");
    }
}
