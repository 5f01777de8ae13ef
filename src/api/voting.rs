use rocket::{
    serde::json::{Error as JsonError, Json},
    Route,
};

use crate::error::Result;
use crate::model::{
    api::answer::AnswerSpec, auth::AuthToken, question::Question, store::Coll, user::User,
};

pub fn routes() -> Vec<Route> {
    routes![save_question_answer]
}

#[post("/save-question-answer", data = "<answer>", format = "json")]
async fn save_question_answer(
    _token: AuthToken,
    answer: std::result::Result<Json<AnswerSpec>, JsonError<'_>>,
    questions: Coll<Question>,
    users: Coll<User>,
) -> Result<()> {
    let AnswerSpec {
        qid,
        answer,
        authed_user_id,
    } = answer?.0;

    // Both records must exist before either is touched.
    questions.find(&qid).await?;
    users.find(&authed_user_id).await?;

    // Record the vote.
    let mut previous = None;
    questions
        .modify(&qid, |question| {
            previous = question.cast_vote(&authed_user_id, answer);
            Ok(())
        })
        .await?;
    match previous {
        Some(previous) if previous != answer => {
            info!("{authed_user_id} changed their answer to {qid} from {previous} to {answer}")
        }
        Some(_) => debug!("{authed_user_id} repeated their answer to {qid}"),
        None => info!("{authed_user_id} answered {answer} to {qid}"),
    }

    // Record the answer. Separate document, so not atomic with the vote.
    users
        .modify(&authed_user_id, |user| {
            user.answers.insert(qid.clone(), answer);
            Ok(())
        })
        .await?;

    Ok(())
}
