use rocket::{
    fairing::{Fairing, Info, Kind},
    http::{Header, Method, Status},
    Request, Response, Route,
};

const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";
const DEFAULT_ALLOWED_HEADERS: &str = "Authorization, Content-Type, Accept, X-Requested-With";
const MAX_AGE_SECS: u32 = 60 * 60;

pub fn routes() -> Vec<Route> {
    routes![preflight]
}

/// Answer CORS preflights for any path. The fairing fills in the headers.
#[options("/<_..>")]
fn preflight() -> Status {
    Status::NoContent
}

/// A fairing that allows cross-origin requests from any origin.
///
/// The request `Origin` is reflected rather than answered with `*` so that
/// credentialed requests (the `__session` cookie) are permitted.
#[derive(Debug, Copy, Clone)]
pub struct CorsFairing;

#[rocket::async_trait]
impl Fairing for CorsFairing {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        let origin = match req.headers().get_one("Origin") {
            Some(origin) => origin.to_string(),
            None => return,
        };
        res.set_header(Header::new("Access-Control-Allow-Origin", origin));
        res.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
        res.adjoin_header(Header::new("Vary", "Origin"));

        if req.method() == Method::Options {
            let headers = req
                .headers()
                .get_one("Access-Control-Request-Headers")
                .unwrap_or(DEFAULT_ALLOWED_HEADERS)
                .to_string();
            res.set_header(Header::new("Access-Control-Allow-Methods", ALLOWED_METHODS));
            res.set_header(Header::new("Access-Control-Allow-Headers", headers));
            res.set_header(Header::new(
                "Access-Control-Max-Age",
                MAX_AGE_SECS.to_string(),
            ));
        }
    }
}
