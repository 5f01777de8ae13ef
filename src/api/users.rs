use std::collections::HashMap;

use rand::{distributions::Alphanumeric, Rng};
use rocket::{
    form::{Errors as FormErrors, Form},
    serde::json::Json,
    Route, State,
};
use uuid::Uuid;

use crate::config::Config;
use crate::error::Result;
use crate::model::{
    api::profile::{content_type, file_extension, sanitize, ProfileUpdate},
    auth::AuthToken,
    storage::{wait_until_finalized, Storage, Upload, UploadError},
    store::Coll,
    user::User,
};

/// Length of the random segment that keeps concurrent uploads apart.
const UPLOAD_SUFFIX_LENGTH: usize = 12;

/// Prefix of every avatar object key.
const AVATAR_KEY_PREFIX: &str = "avatars";

pub fn routes() -> Vec<Route> {
    routes![get_users, update_user_profile]
}

#[get("/get-users")]
async fn get_users(_token: AuthToken, users: Coll<User>) -> Result<Json<HashMap<String, User>>> {
    let users = users.all().await?;
    debug!("Returning {} users", users.len());
    Ok(Json(users))
}

#[post("/update-user-profile/<user_id>", data = "<update>")]
async fn update_user_profile(
    _token: AuthToken,
    user_id: &str,
    update: std::result::Result<Form<ProfileUpdate<'_>>, FormErrors<'_>>,
    users: Coll<User>,
    storage: &State<Storage>,
    config: &State<Config>,
) -> Result<()> {
    let mut update = update?;

    // Don't upload anything for a profile that doesn't exist.
    users.find(user_id).await?;

    let file = update.avatar.as_mut().ok_or(UploadError::MissingFile)?;
    let content_type = content_type(file);
    let suffix = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(UPLOAD_SUFFIX_LENGTH)
        .map(char::from)
        .collect::<String>();
    let mut file_name = format!("{}-{suffix}", sanitize(user_id));
    if let Some(ext) = file_extension(file) {
        file_name = format!("{file_name}.{ext}");
    }

    // Stage the upload.
    let path = config.upload_dir().join(&file_name);
    file.move_copy_to(&path).await?;
    debug!("Staged avatar for {user_id} at {}", path.display());

    // Send it to storage, then clean up whatever happened.
    let key = format!("{AVATAR_KEY_PREFIX}-{file_name}");
    let download_token = Uuid::new_v4().to_string();
    let uploaded = storage
        .upload(Upload {
            path: &path,
            key: &key,
            content_type: &content_type,
            download_token: &download_token,
        })
        .await;
    if let Err(e) = rocket::tokio::fs::remove_file(&path).await {
        warn!("Failed to remove staged upload {}: {e}", path.display());
    }
    let object = uploaded?;

    wait_until_finalized(
        &***storage,
        &object,
        config.storage_poll_interval(),
        config.storage_poll_attempts(),
    )
    .await?;
    let avatar_url = object.download_url();
    info!("Stored avatar for {user_id} as {}", object.name);

    let username = update.username.take();
    users
        .modify(user_id, |user| {
            user.avatar_url = Some(avatar_url.clone());
            if let Some(username) = &username {
                user.username = Some(username.clone());
            }
            Ok(())
        })
        .await?;

    Ok(())
}
