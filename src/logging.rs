use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use log::LevelFilter;
use rocket::{
    fairing::{Fairing, Info, Kind},
    http::StatusClass,
    Data, Orbit, Request, Response, Rocket,
};

/// Per-request bookkeeping, kept in the request-local cache.
#[derive(Debug, Copy, Clone)]
struct RequestInfo {
    id: usize,
    received: Instant,
}

impl RequestInfo {
    /// Take the next ID. Wraps around to zero if you somehow exceed a usize.
    fn next() -> Self {
        static REQUEST_ID_COUNTER: AtomicUsize = AtomicUsize::new(0);
        Self {
            id: REQUEST_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
            received: Instant::now(),
        }
    }
}

impl Display for RequestInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// A rocket fairing that does global logging: launch, every request and
/// response with its latency, and shutdown.
///
/// Set `quiet_rocket` to silence Rocket's own logging once the server is up.
#[derive(Debug, Copy, Clone)]
pub struct LoggerFairing {
    pub quiet_rocket: bool,
}

#[rocket::async_trait]
impl Fairing for LoggerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Logger",
            kind: Kind::Liftoff | Kind::Request | Kind::Response | Kind::Shutdown,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let protocol = if rocket.config().tls_enabled() {
            "https"
        } else {
            "http"
        };
        let ip = &rocket.config().address;
        let port = &rocket.config().port;
        info!("Server launched on {protocol}://{ip}:{port}");
        if self.quiet_rocket {
            log4rs_dynamic_filters::DynamicLevelFilter::set("rocket", LevelFilter::Off);
        }
    }

    async fn on_request(&self, req: &mut Request<'_>, _data: &mut Data<'_>) {
        let info = req.local_cache(RequestInfo::next);
        info!("->req{info} {} {}", req.method(), req.uri());
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        let info = req.local_cache(RequestInfo::next);
        let elapsed_ms = info.received.elapsed().as_millis();
        let code = res.status();
        let route = match req.route() {
            Some(r) => match r.name {
                Some(ref name) => format!("{name} ({})", r.uri),
                None => r.uri.to_string(),
            },
            None => "UNKNOWN ROUTE".to_string(),
        };
        let log_msg = format!("<-rsp{info} {code} {route} in {elapsed_ms}ms");
        match code.class() {
            StatusClass::ServerError => error!("{log_msg}"),
            StatusClass::ClientError => warn!("{log_msg}"),
            _ => info!("{log_msg}"),
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
    fn request_ids_are_distinct() {
        let first = RequestInfo::next();
        let second = RequestInfo::next();
        assert_ne!(first.id, second.id);
        assert!(second.received >= first.received);
    }
}
