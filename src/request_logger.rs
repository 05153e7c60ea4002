use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;
use rocket::{Data, Request, Response};
use std::time::Instant;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Correlation id of the request being served.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Fairing to log one line per HTTP request with timing and request id
pub struct RequestLogger;

#[rocket::async_trait]
impl Fairing for RequestLogger {
    fn info(&self) -> Info {
        Info {
            name: "Request Logger",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _: &mut Data<'_>) {
        request.local_cache(Instant::now);
        let incoming = request
            .headers()
            .get_one(REQUEST_ID_HEADER)
            .filter(|id| is_acceptable_id(id))
            .map(str::to_string);
        request.local_cache(|| RequestId(incoming.unwrap_or_else(|| Uuid::new_v4().to_string())));
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let duration = request.local_cache(Instant::now).elapsed();
        let request_id = request
            .local_cache(|| RequestId(Uuid::new_v4().to_string()))
            .0
            .clone();

        log::info!(
            "{} {} -> {} ({:.2}ms) [{}]",
            request.method(),
            request.uri().path(),
            response.status().code,
            duration.as_secs_f64() * 1000.0,
            request_id
        );

        response.set_header(Header::new(REQUEST_ID_HEADER, request_id));
    }
}

/// Client-supplied ids are echoed only when short and printable.
fn is_acceptable_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_uuid_like_ids() {
        assert!(is_acceptable_id("3f0e4c1a-7d4e-4b8a-9a51-1c2d3e4f5a6b"));
        assert!(is_acceptable_id("req_42.retry"));
    }

    #[test]
    fn rejects_unprintable_or_oversized_ids() {
        assert!(!is_acceptable_id(""));
        assert!(!is_acceptable_id("has space"));
        assert!(!is_acceptable_id("line\nbreak"));
        assert!(!is_acceptable_id(&"a".repeat(129)));
    }
}
