use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use rocket::{
    fairing::{Fairing, Info, Kind},
    http::{Method, Status, StatusClass},
    Data, Orbit, Request, Response, Rocket,
};

/// Sequence number of a request, for matching responses to requests in the logs.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct RequestId(pub usize);

impl RequestId {
    /// The next unused ID. Wraps around on overflow.
    pub fn next() -> RequestId {
        static NEXT_ID: AtomicUsize = AtomicUsize::new(0);
        RequestId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bookkeeping attached to a request when it arrives.
struct Arrival {
    id: RequestId,
    at: Instant,
}

impl Arrival {
    fn now() -> Self {
        Self {
            id: RequestId::next(),
            at: Instant::now(),
        }
    }
}

/// The user a request was authenticated as, once the auth guard has run.
pub(crate) struct Subject(pub Option<String>);

/// Remember who the request was authenticated as, for the response log line.
pub(crate) fn record_subject(req: &Request<'_>, user_id: &str) {
    req.local_cache(|| Subject(Some(user_id.to_string())));
}

/// The log line for a finished request.
fn response_line(
    id: RequestId,
    status: Status,
    route: &str,
    subject: Option<&str>,
    elapsed_ms: u128,
) -> String {
    let subject = subject.map(|user_id| format!(" as {user_id}")).unwrap_or_default();
    format!("<-rsp{id} {status} {route}{subject} in {elapsed_ms}ms")
}

/// A rocket fairing that logs every request and response, with the
/// authenticated user and the time taken.
#[derive(Debug, Copy, Clone)]
pub struct LoggerFairing;

#[rocket::async_trait]
impl Fairing for LoggerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Logger",
            kind: Kind::Liftoff | Kind::Request | Kind::Response | Kind::Shutdown,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let config = rocket.config();
        let scheme = if config.tls_enabled() { "https" } else { "http" };
        info!(
            "Listening on {scheme}://{}:{}{}",
            config.address,
            config.port,
            crate::BASE_PATH
        );
    }

    async fn on_request(&self, req: &mut Request<'_>, _data: &mut Data<'_>) {
        let id = req.local_cache(Arrival::now).id;
        // Preflights are noise at info level.
        if req.method() == Method::Options {
            debug!("->req{id} {} {}", req.method(), req.uri());
        } else {
            info!("->req{id} {} {}", req.method(), req.uri());
        }
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        let arrival = req.local_cache(Arrival::now);
        let elapsed = arrival.at.elapsed().as_millis();
        let route = req
            .route()
            .map(|route| match &route.name {
                Some(name) => format!("{name} ({})", route.uri),
                None => route.uri.to_string(),
            })
            .unwrap_or_else(|| "UNKNOWN ROUTE".to_string());
        let subject = req.local_cache(|| Subject(None)).0.as_deref();

        let status = res.status();
        let line = response_line(arrival.id, status, &route, subject, elapsed);
        match status.class() {
            StatusClass::ServerError => error!("{line}"),
            StatusClass::ClientError => warn!("{line}"),
            _ => info!("{line}"),
        }
    }

    async fn on_shutdown(&self, _rocket: &Rocket<Orbit>) {
        warn!("Shutdown requested, stopping gracefully...");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_increase() {
        let first = RequestId::next();
        let second = RequestId::next();
        assert!(second > first);
    }

    #[test]
    fn response_line_names_the_subject() {
        let line = response_line(
            RequestId(7),
            Status::Ok,
            "get_users (/api/get-users)",
            Some("u1"),
            12,
        );
        assert_eq!(line, "<-rsp7 200 OK get_users (/api/get-users) as u1 in 12ms");
    }

    #[test]
    fn anonymous_response_line_has_no_subject() {
        let line = response_line(RequestId(8), Status::Forbidden, "UNKNOWN ROUTE", None, 0);
        assert_eq!(line, "<-rsp8 403 Forbidden UNKNOWN ROUTE in 0ms");
    }
}
