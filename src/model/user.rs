use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{question::Choice, store::Record};

/// A user profile. The ID is the identity provider's subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    /// Maps question IDs to the option this user picked.
    pub answers: HashMap<String, Choice>,
    /// IDs of the questions this user authored, oldest first.
    pub questions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl User {
    /// A fresh profile with no answers and no questions.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            answers: HashMap::new(),
            questions: Vec::new(),
            username: None,
            avatar_url: None,
        }
    }
}

impl Record for User {
    const COLLECTION: &'static str = "users";

    fn id(&self) -> &str {
        &self.id
    }
}


#[cfg(test)]
pub use examples::EXAMPLE_USER_ID;
