//! Minimal HTTP/1.1 front end.
//!
//! One request per connection. A `POST` body is one payload; the optional
//! `Authorization: Bearer` header supplies the transport token. The handler
//! blocks until a worker completes the envelope, then writes the reply and
//! closes the connection.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use tracing::{debug, warn};

use crate::queue::{ReplyHandle, RequestEnvelope, RequestQueue};

use super::{ConnectionHandler, LISTENER_TARGET};

const HEADER_END: &[u8] = b"\r\n\r\n";
const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Largest accepted request line plus headers.
pub(crate) const MAX_HEAD_BYTES: usize = 16 * 1024;
/// Largest accepted request body.
pub(crate) const MAX_BODY_BYTES: usize = 1024 * 1024;
/// Read and write deadline applied to every HTTP connection.
pub(crate) const IO_TIMEOUT: Duration = Duration::from_secs(10);

/// Status codes the daemon emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StatusCode {
    Ok,
    NoContent,
    BadRequest,
    NotFound,
    MethodNotAllowed,
    PayloadTooLarge,
    HeaderFieldsTooLarge,
    InternalServerError,
    ServiceUnavailable,
}

impl StatusCode {
    pub(crate) const fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::NoContent => 204,
            Self::BadRequest => 400,
            Self::NotFound => 404,
            Self::MethodNotAllowed => 405,
            Self::PayloadTooLarge => 413,
            Self::HeaderFieldsTooLarge => 431,
            Self::InternalServerError => 500,
            Self::ServiceUnavailable => 503,
        }
    }

    pub(crate) const fn reason(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::NoContent => "No Content",
            Self::BadRequest => "Bad Request",
            Self::NotFound => "Not Found",
            Self::MethodNotAllowed => "Method Not Allowed",
            Self::PayloadTooLarge => "Payload Too Large",
            Self::HeaderFieldsTooLarge => "Request Header Fields Too Large",
            Self::InternalServerError => "Internal Server Error",
            Self::ServiceUnavailable => "Service Unavailable",
        }
    }
}

/// Why a request could not be read.
#[derive(Debug)]
pub(crate) enum ReadError {
    /// The peer closed before sending a complete head.
    Closed,
    /// The head did not fit in [`MAX_HEAD_BYTES`].
    HeadTooLarge,
    /// The declared body exceeds the limit.
    BodyTooLarge,
    /// The request line or a header could not be parsed.
    Malformed(&'static str),
    /// The socket failed or timed out while reading.
    Io(io::Error),
}

impl From<io::Error> for ReadError {
    fn from(error: io::Error) -> Self {
        Self::Io(error)
    }
}

impl ReadError {
    /// Response owed to the client, if the connection is still usable.
    pub(crate) fn response(&self) -> Option<HttpResponse> {
        match self {
            Self::Closed | Self::Io(_) => None,
            Self::HeadTooLarge => Some(HttpResponse::status_text(StatusCode::HeaderFieldsTooLarge)),
            Self::BodyTooLarge => Some(HttpResponse::status_text(StatusCode::PayloadTooLarge)),
            Self::Malformed(reason) => Some(HttpResponse::text(
                StatusCode::BadRequest,
                format!("Bad Request: {reason}"),
            )),
        }
    }
}

/// Parsed request line and headers plus any body bytes read along with them.
#[derive(Debug)]
pub(crate) struct RequestHead {
    method: String,
    target: String,
    headers: Vec<(String, String)>,
    leftover: Vec<u8>,
}

impl RequestHead {
    /// Reads up to the blank line that ends the headers.
    pub(crate) fn read_from(stream: &mut impl Read) -> Result<Self, ReadError> {
        let mut buffer = Vec::new();
        let mut chunk = [0_u8; 4096];
        let header_end = loop {
            if let Some(position) = find_header_end(&buffer) {
                break position;
            }
            if buffer.len() > MAX_HEAD_BYTES {
                return Err(ReadError::HeadTooLarge);
            }
            let read = match stream.read(&mut chunk) {
                Ok(read) => read,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error) => return Err(ReadError::Io(error)),
            };
            if read == 0 {
                return Err(ReadError::Closed);
            }
            buffer.extend_from_slice(&chunk[..read]);
        };
        if header_end > MAX_HEAD_BYTES {
            return Err(ReadError::HeadTooLarge);
        }
        let head = std::str::from_utf8(&buffer[..header_end])
            .map_err(|_| ReadError::Malformed("headers are not UTF-8"))?;
        let mut lines = head.split("\r\n");
        let mut request_line = lines.next().unwrap_or_default().split_whitespace();
        let (Some(method), Some(target), Some(_version)) =
            (request_line.next(), request_line.next(), request_line.next())
        else {
            return Err(ReadError::Malformed("invalid request line"));
        };
        let headers = lines
            .map(|line| {
                line.split_once(':')
                    .map(|(name, value)| (name.trim().to_owned(), value.trim().to_owned()))
                    .ok_or(ReadError::Malformed("invalid header line"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            method: method.to_owned(),
            target: target.to_owned(),
            headers,
            leftover: buffer[header_end + HEADER_END.len()..].to_vec(),
        })
    }

    pub(crate) fn method(&self) -> &str {
        &self.method
    }

    /// Request target without its query string.
    pub(crate) fn path(&self) -> &str {
        self.target
            .split_once('?')
            .map_or(self.target.as_str(), |(path, _)| path)
    }

    /// First header called `name`, compared case-insensitively.
    pub(crate) fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Bearer token from the `Authorization` header.
    ///
    /// A value without the `Bearer ` prefix is taken as the token itself.
    pub(crate) fn bearer_token(&self) -> Option<String> {
        let value = self.header("authorization")?;
        let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
        (!token.is_empty()).then(|| token.to_owned())
    }

    /// Reads the body announced by `Content-Length`, at most `limit` bytes.
    pub(crate) fn read_body(
        self,
        stream: &mut impl Read,
        limit: usize,
    ) -> Result<Vec<u8>, ReadError> {
        if self.header("transfer-encoding").is_some() {
            return Err(ReadError::Malformed("chunked bodies are not supported"));
        }
        let length = match self.header("content-length") {
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|_| ReadError::Malformed("invalid Content-Length"))?,
            None => 0,
        };
        if length > limit {
            return Err(ReadError::BodyTooLarge);
        }
        let mut body = self.leftover;
        if body.len() >= length {
            body.truncate(length);
            return Ok(body);
        }
        let already = body.len();
        body.resize(length, 0);
        stream.read_exact(&mut body[already..])?;
        Ok(body)
    }
}

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(HEADER_END.len())
        .position(|window| window == HEADER_END)
}

/// Response about to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HttpResponse {
    status: StatusCode,
    content_type: Option<&'static str>,
    body: Vec<u8>,
}

impl HttpResponse {
    pub(crate) fn new(status: StatusCode, content_type: &'static str, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type: Some(content_type),
            body,
        }
    }

    pub(crate) fn text(status: StatusCode, message: impl Into<String>) -> Self {
        Self::new(status, TEXT_PLAIN, message.into().into_bytes())
    }

    /// Plain-text response whose body is the reason phrase.
    pub(crate) fn status_text(status: StatusCode) -> Self {
        Self::text(status, status.reason())
    }

    pub(crate) fn empty(status: StatusCode) -> Self {
        Self {
            status,
            content_type: None,
            body: Vec::new(),
        }
    }

    pub(crate) fn status(&self) -> StatusCode {
        self.status
    }

    pub(crate) fn write_to(&self, stream: &mut impl Write) -> io::Result<()> {
        let mut head = format!(
            "HTTP/1.1 {} {}\r\nConnection: close\r\n",
            self.status.code(),
            self.status.reason()
        );
        if self.status == StatusCode::MethodNotAllowed {
            head.push_str("Allow: POST\r\n");
        }
        if let Some(content_type) = self.content_type {
            head.push_str(&format!("Content-Type: {content_type}\r\n"));
        }
        if self.status != StatusCode::NoContent {
            head.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        }
        head.push_str("\r\n");
        stream.write_all(head.as_bytes())?;
        stream.write_all(&self.body)?;
        stream.flush()
    }
}

/// Serves one `POST` per connection through the request queue.
#[derive(Debug, Clone)]
pub(crate) struct HttpConnectionHandler {
    queue: RequestQueue,
    content_type: &'static str,
}

impl HttpConnectionHandler {
    /// `content_type` labels successful replies and follows the wire format.
    pub(crate) fn new(queue: RequestQueue, content_type: &'static str) -> Self {
        Self {
            queue,
            content_type,
        }
    }

    fn respond(&self, stream: &mut TcpStream) -> Result<HttpResponse, ReadError> {
        let head = RequestHead::read_from(stream)?;
        if head.method() != "POST" {
            return Ok(HttpResponse::status_text(StatusCode::MethodNotAllowed));
        }
        let token = head.bearer_token();
        let body = head.read_body(stream, MAX_BODY_BYTES)?;
        if body.is_empty() {
            return Ok(HttpResponse::text(
                StatusCode::BadRequest,
                "Bad Request: Body is empty",
            ));
        }

        let (reply, completion) = ReplyHandle::channel();
        if self
            .queue
            .enqueue(RequestEnvelope::new(body, token, reply))
            .is_err()
        {
            return Ok(HttpResponse::status_text(StatusCode::ServiceUnavailable));
        }
        Ok(match completion.recv() {
            Ok(Some(bytes)) => HttpResponse::new(StatusCode::Ok, self.content_type, bytes),
            Ok(None) => HttpResponse::empty(StatusCode::NoContent),
            Err(_) => {
                warn!(target: LISTENER_TARGET, "request completed without a reply");
                HttpResponse::status_text(StatusCode::InternalServerError)
            }
        })
    }
}

impl ConnectionHandler for HttpConnectionHandler {
    fn handle(&self, mut stream: TcpStream) {
        let peer = stream.peer_addr().ok();
        if let Err(error) = stream
            .set_read_timeout(Some(IO_TIMEOUT))
            .and_then(|()| stream.set_write_timeout(Some(IO_TIMEOUT)))
        {
            warn!(target: LISTENER_TARGET, ?peer, error = %error, "failed to set HTTP timeouts");
            return;
        }
        let response = match self.respond(&mut stream) {
            Ok(response) => response,
            Err(error) => {
                debug!(target: LISTENER_TARGET, ?peer, ?error, "unreadable HTTP request");
                match error.response() {
                    Some(response) => response,
                    None => return,
                }
            }
        };
        debug!(
            target: LISTENER_TARGET,
            ?peer,
            status = response.status().code(),
            "HTTP request served"
        );
        if let Err(error) = response.write_to(&mut stream) {
            warn!(target: LISTENER_TARGET, ?peer, error = %error, "failed to write HTTP response");
        }
    }
}
