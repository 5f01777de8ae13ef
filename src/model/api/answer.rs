use serde::{Deserialize, Serialize};

use crate::model::question::Choice;

/// Body of a voting request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSpec {
    /// The question being answered.
    pub qid: String,
    pub answer: Choice,
    /// The voting user.
    pub authed_user_id: String,
}

#[cfg(test)]
mod examples {
    use super::*;

    impl AnswerSpec {
        pub fn example(qid: &str, answer: Choice) -> Self {
            Self {
                qid: qid.to_string(),
                answer,
                authed_user_id: "u1".to_string(),
            }
        }
    }
}
