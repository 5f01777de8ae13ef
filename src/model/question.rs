use std::fmt::{Display, Formatter};

use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

use crate::model::store::Record;

/// Length of generated question IDs.
pub const QUESTION_ID_LENGTH: usize = 20;

/// Which of the two options of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Choice {
    OptionOne,
    OptionTwo,
}

impl Display for Choice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OptionOne => write!(f, "optionOne"),
            Self::OptionTwo => write!(f, "optionTwo"),
        }
    }
}

/// One of the two choices of a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub text: String,
    /// IDs of the users who picked this option, in voting order.
    pub votes: Vec<String>,
}

impl QuestionOption {
    fn new(text: String) -> Self {
        Self {
            text,
            votes: Vec::new(),
        }
    }
}

/// A two-option question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    /// Creation time, in milliseconds since the epoch.
    pub timestamp: i64,
    /// ID of the authoring user.
    pub author: String,
    pub option_one: QuestionOption,
    pub option_two: QuestionOption,
}

impl Question {
    /// Create a question with a fresh ID, timestamped now, with no votes.
    pub fn new(option_one_text: String, option_two_text: String, author: String) -> Self {
        Self {
            id: generate_id(),
            timestamp: Utc::now().timestamp_millis(),
            author,
            option_one: QuestionOption::new(option_one_text),
            option_two: QuestionOption::new(option_two_text),
        }
    }

    pub fn option(&self, choice: Choice) -> &QuestionOption {
        match choice {
            Choice::OptionOne => &self.option_one,
            Choice::OptionTwo => &self.option_two,
        }
    }

    fn option_mut(&mut self, choice: Choice) -> &mut QuestionOption {
        match choice {
            Choice::OptionOne => &mut self.option_one,
            Choice::OptionTwo => &mut self.option_two,
        }
    }

    /// The option the given user voted for, if any.
    pub fn vote_of(&self, user_id: &str) -> Option<Choice> {
        [Choice::OptionOne, Choice::OptionTwo]
            .into_iter()
            .find(|choice| self.option(*choice).votes.iter().any(|v| v == user_id))
    }

    /// Record the user's vote for `choice`, replacing any earlier vote they
    /// cast on this question. Returns the choice they previously held.
    pub fn cast_vote(&mut self, user_id: &str, choice: Choice) -> Option<Choice> {
        let previous = self.vote_of(user_id);
        if previous == Some(choice) {
            return previous;
        }
        self.option_one.votes.retain(|v| v != user_id);
        self.option_two.votes.retain(|v| v != user_id);
        self.option_mut(choice).votes.push(user_id.to_string());
        previous
    }
}

impl Record for Question {
    const COLLECTION: &'static str = "questions";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Generate a random alphanumeric question ID.
pub fn generate_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(QUESTION_ID_LENGTH)
        .map(char::from)
        .collect()
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Question {
        pub fn example() -> Self {
            Self::new("Tea".to_string(), "Coffee".to_string(), "u1".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use rocket::serde::json::serde_json::{self, json};

    use super::*;

    #[test]
    fn new_question_has_no_votes() {
        let question = Question::example();
        assert_eq!(question.id.len(), QUESTION_ID_LENGTH);
        assert!(question.id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(question.option_one.votes.is_empty());
        assert!(question.option_two.votes.is_empty());
        assert!(question.timestamp > 0);
    }

    #[test]
    fn ids_do_not_repeat() {
        let ids = (0..1000)
            .map(|_| generate_id())
            .collect::<std::collections::HashSet<_>>();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn serializes_in_client_shape() {
        let mut question = Question::example();
        question.id = "q1".to_string();
        question.timestamp = 42;
        question.cast_vote("u2", Choice::OptionTwo);

        assert_eq!(
            serde_json::to_value(&question).unwrap(),
            json!({
                "id": "q1",
                "timestamp": 42,
                "author": "u1",
                "optionOne": { "text": "Tea", "votes": [] },
                "optionTwo": { "text": "Coffee", "votes": ["u2"] },
            })
        );
    }

    #[test]
    fn repeat_vote_moves_instead_of_duplicating() {
        let mut question = Question::example();

        assert_eq!(question.cast_vote("u2", Choice::OptionOne), None);
        assert_eq!(question.vote_of("u2"), Some(Choice::OptionOne));

        // Same answer again is a no-op.
        assert_eq!(
            question.cast_vote("u2", Choice::OptionOne),
            Some(Choice::OptionOne)
        );
        assert_eq!(question.option_one.votes, vec!["u2"]);

        // Changing the answer moves the vote.
        assert_eq!(
            question.cast_vote("u2", Choice::OptionTwo),
            Some(Choice::OptionOne)
        );
        assert!(question.option_one.votes.is_empty());
        assert_eq!(question.option_two.votes, vec!["u2"]);
    }

    #[test]
    fn votes_keep_order() {
        let mut question = Question::example();
        for user in ["a", "b", "c"] {
            question.cast_vote(user, Choice::OptionOne);
        }
        assert_eq!(question.option_one.votes, vec!["a", "b", "c"]);
    }

    #[test]
    fn choice_names() {
        assert_eq!(Choice::OptionOne.to_string(), "optionOne");
        assert_eq!(
            serde_json::from_value::<Choice>(json!("optionTwo")).unwrap(),
            Choice::OptionTwo
        );
        assert!(serde_json::from_value::<Choice>(json!("optionThree")).is_err());
    }
}
