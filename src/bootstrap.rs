//! Profile creation for newly registered accounts.

use crate::error::{Error, Result};
use crate::model::{
    store::{Coll, StoreError},
    user::User,
};

/// Create the empty profile for a new account.
///
/// Account creation events may be delivered more than once, so an existing
/// profile is left untouched and returned as is.
pub async fn create_profile(users: &Coll<User>, user_id: &str) -> Result<User> {
    let user = User::new(user_id);
    match users.create(&user).await {
        Ok(()) => {
            info!("Created profile for {user_id}");
            Ok(user)
        }
        Err(Error::Store(StoreError::AlreadyExists { .. })) => {
            warn!("Profile for {user_id} already exists, leaving it alone");
            Ok(users.find(user_id).await?.data)
        }
        Err(e) => Err(e),
    }
}
