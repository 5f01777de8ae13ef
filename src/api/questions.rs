use std::collections::HashMap;

use rocket::{
    serde::json::{Error as JsonError, Json},
    Route,
};

use crate::error::Result;
use crate::model::{
    api::question::NewQuestionRequest, auth::AuthToken, question::Question, store::Coll,
    user::User,
};

pub fn routes() -> Vec<Route> {
    routes![save_question, get_questions]
}

#[post("/save-question", data = "<request>", format = "json")]
async fn save_question(
    token: AuthToken,
    request: std::result::Result<Json<NewQuestionRequest>, JsonError<'_>>,
    questions: Coll<Question>,
    users: Coll<User>,
) -> Result<Json<Question>> {
    let spec = request?.0.question;
    spec.validate()?;

    // The author must have a profile to link the question to.
    users.find(&spec.author).await?;

    let question = spec.into_question();
    questions.create(&question).await?;
    info!(
        "{} created question {} for {}",
        token.user_id(),
        question.id,
        question.author
    );

    // Not transactional with the insert above: a failure here leaves the
    // question without a back-reference.
    users
        .modify(&question.author, |author| {
            if !author.questions.contains(&question.id) {
                author.questions.push(question.id.clone());
            }
            Ok(())
        })
        .await?;

    Ok(Json(question))
}

#[get("/get-questions")]
async fn get_questions(
    _token: AuthToken,
    questions: Coll<Question>,
) -> Result<Json<HashMap<String, Question>>> {
    let questions = questions.all().await?;
    debug!("Returning {} questions", questions.len());
    Ok(Json(questions))
}
