use rocket::{Catcher, Request, Route};

pub mod questions;
pub mod users;
pub mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(questions::routes());
    routes.extend(voting::routes());
    routes.extend(users::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![unauthorized]
}

/// Every authentication failure looks the same to the client.
#[catch(403)]
fn unauthorized(_req: &Request<'_>) -> &'static str {
    "Unauthorized"
}
