//! Liveness endpoint served on its own port.

use std::net::TcpStream;

use serde::Serialize;
use tracing::{debug, warn};

use courier_config::Protocol;

use crate::queue::RequestQueue;
use crate::registry::MethodRegistry;

use super::http::{HttpResponse, IO_TIMEOUT, RequestHead, StatusCode};
use super::{ConnectionHandler, LISTENER_TARGET};

const HEALTH_PATH: &str = "/healthz";

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    protocol: Protocol,
    methods: usize,
    queued: usize,
}

/// Answers `GET /healthz` with a JSON status document.
///
/// The status turns to `draining` with a 503 once the request queue closes.
#[derive(Debug, Clone)]
pub(crate) struct HealthProbeHandler {
    registry: MethodRegistry,
    queue: RequestQueue,
    protocol: Protocol,
}

impl HealthProbeHandler {
    pub(crate) fn new(registry: MethodRegistry, queue: RequestQueue, protocol: Protocol) -> Self {
        Self {
            registry,
            queue,
            protocol,
        }
    }

    fn respond(&self, head: &RequestHead) -> HttpResponse {
        if head.method() != "GET" || head.path() != HEALTH_PATH {
            return HttpResponse::status_text(StatusCode::NotFound);
        }
        let draining = self.queue.is_closed();
        let body = HealthBody {
            status: if draining { "draining" } else { "ok" },
            protocol: self.protocol,
            methods: self.registry.snapshot().len(),
            queued: self.queue.depth(),
        };
        match serde_json::to_vec(&body) {
            Ok(bytes) => HttpResponse::new(
                if draining {
                    StatusCode::ServiceUnavailable
                } else {
                    StatusCode::Ok
                },
                "application/json",
                bytes,
            ),
            Err(error) => {
                warn!(target: LISTENER_TARGET, error = %error, "failed to encode health body");
                HttpResponse::status_text(StatusCode::InternalServerError)
            }
        }
    }
}

impl ConnectionHandler for HealthProbeHandler {
    fn handle(&self, mut stream: TcpStream) {
        if stream.set_read_timeout(Some(IO_TIMEOUT)).is_err()
            || stream.set_write_timeout(Some(IO_TIMEOUT)).is_err()
        {
            return;
        }
        let response = match RequestHead::read_from(&mut stream) {
            Ok(head) => self.respond(&head),
            Err(error) => match error.response() {
                Some(response) => response,
                None => {
                    debug!(target: LISTENER_TARGET, ?error, "health probe closed early");
                    return;
                }
            },
        };
        if let Err(error) = response.write_to(&mut stream) {
            debug!(target: LISTENER_TARGET, error = %error, "failed to answer health probe");
        }
    }
}
