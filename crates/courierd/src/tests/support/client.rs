//! Minimal clients for driving the front ends from tests.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use serde_json::Value;

pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Persistent newline-delimited connection.
pub struct LineClient {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl LineClient {
    pub fn connect(address: SocketAddr) -> io::Result<Self> {
        let writer = TcpStream::connect(address)?;
        writer.set_read_timeout(Some(CLIENT_TIMEOUT))?;
        let reader = BufReader::new(writer.try_clone()?);
        Ok(Self { reader, writer })
    }

    /// Writes `payload` followed by a newline.
    pub fn send(&mut self, payload: &[u8]) -> io::Result<()> {
        self.writer.write_all(payload)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }

    /// Reads one reply line without its terminator; `None` on EOF.
    pub fn read_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut line = Vec::new();
        if self.reader.read_until(b'\n', &mut line)? == 0 {
            return Ok(None);
        }
        if line.last() == Some(&b'\n') {
            line.pop();
        }
        Ok(Some(line))
    }

    /// Reads one reply line and parses it as JSON.
    pub fn read_json(&mut self) -> Result<Value, String> {
        let line = self
            .read_line()
            .map_err(|error| format!("read failed: {error}"))?
            .ok_or_else(|| "connection closed before a reply".to_owned())?;
        serde_json::from_slice(&line).map_err(|error| format!("reply is not JSON: {error}"))
    }

    /// Sends JSON text and returns the parsed reply.
    pub fn call(&mut self, payload: &str) -> Result<Value, String> {
        self.send(payload.as_bytes())
            .map_err(|error| format!("send failed: {error}"))?;
        self.read_json()
    }

    /// Whether nothing arrives within `wait`; EOF counts as a reply.
    pub fn stays_silent(&mut self, wait: Duration) -> io::Result<bool> {
        self.writer.set_read_timeout(Some(wait))?;
        let silent = match self.reader.fill_buf() {
            Ok(_) => false,
            Err(error) => matches!(
                error.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ),
        };
        self.writer.set_read_timeout(Some(CLIENT_TIMEOUT))?;
        Ok(silent)
    }
}

/// Parsed HTTP response.
#[derive(Debug)]
pub struct HttpReply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpReply {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn json(&self) -> Result<Value, String> {
        serde_json::from_slice(&self.body).map_err(|error| format!("body is not JSON: {error}"))
    }
}

/// Sends `raw` verbatim and reads the whole response.
pub fn http_exchange(address: SocketAddr, raw: &[u8]) -> Result<HttpReply, String> {
    let mut stream = TcpStream::connect(address).map_err(|error| error.to_string())?;
    stream
        .set_read_timeout(Some(CLIENT_TIMEOUT))
        .map_err(|error| error.to_string())?;
    stream.write_all(raw).map_err(|error| error.to_string())?;
    let mut response = Vec::new();
    stream
        .read_to_end(&mut response)
        .map_err(|error| error.to_string())?;
    parse_response(&response)
}

/// Builds and sends one request.
pub fn http_request(
    address: SocketAddr,
    method: &str,
    path: &str,
    token: Option<&str>,
    body: &[u8],
) -> Result<HttpReply, String> {
    let mut raw = format!("{method} {path} HTTP/1.1\r\nHost: {address}\r\n").into_bytes();
    if let Some(token) = token {
        raw.extend_from_slice(format!("Authorization: Bearer {token}\r\n").as_bytes());
    }
    raw.extend_from_slice(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes());
    raw.extend_from_slice(body);
    http_exchange(address, &raw)
}

fn parse_response(response: &[u8]) -> Result<HttpReply, String> {
    let split = response
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
        .ok_or_else(|| format!("incomplete response: {:?}", String::from_utf8_lossy(response)))?;
    let head = String::from_utf8_lossy(&response[..split]).into_owned();
    let mut lines = head.split("\r\n");
    let status = lines
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse().ok())
        .ok_or_else(|| format!("bad status line in {head:?}"))?;
    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_owned(), value.trim().to_owned()))
        .collect();
    Ok(HttpReply {
        status,
        headers,
        body: response[split + 4..].to_vec(),
    })
}
