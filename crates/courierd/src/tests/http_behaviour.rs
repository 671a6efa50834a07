//! Behavioural tests for the HTTP front end and the health probe.

use std::cell::RefCell;

use courier_config::{Protocol, WireFormat};
use jsonwebtoken::{EncodingKey, Header};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::{Value, json};

use super::support::{DaemonWorld, HttpReply, StepResult, http_request};

const SECRET: &str = "http-suite-secret";

struct HttpWorld {
    daemon: DaemonWorld,
    format: WireFormat,
    token: Option<String>,
    reply: Option<HttpReply>,
}

impl HttpWorld {
    fn new() -> Self {
        let mut daemon = DaemonWorld::new();
        daemon.configure(|loader| {
            loader
                .with_protocol(Protocol::Http)
                .with_auth_secret(SECRET)
                .with_health_probe()
        });
        Self {
            daemon,
            format: WireFormat::Json,
            token: None,
            reply: None,
        }
    }

    fn reply(&self) -> Result<&HttpReply, String> {
        self.reply
            .as_ref()
            .ok_or_else(|| "no response received".to_owned())
    }

    fn send(&mut self, listener: &str, method: &str, path: &str, body: &[u8]) -> StepResult {
        let address = self.daemon.address(listener)?;
        let reply = http_request(address, method, path, self.token.as_deref(), body)?;
        self.reply = Some(reply);
        Ok(())
    }

    fn decoded_body(&self) -> Result<Value, String> {
        let reply = self.reply()?;
        match self.format {
            WireFormat::Json => reply.json(),
            WireFormat::Msgpack => rmp_serde::from_slice(&reply.body)
                .map_err(|error| format!("body is not MessagePack: {error}")),
        }
    }
}

fn signed_token(role: &str) -> Result<String, String> {
    jsonwebtoken::encode(
        &Header::default(),
        &json!({"role": role}),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .map_err(|error| error.to_string())
}

fn request_body(name: &str) -> Result<Value, String> {
    let body = match name {
        "add" => json!({"method": "math.add", "params": {"a": 1, "b": 2}, "id": 7}),
        "whoami" => json!({"method": "auth.whoami", "params": {}, "id": 1}),
        "notification" => json!({"method": "system.ping", "params": {}}),
        "token batch" => json!([
            {"method": "auth.whoami", "params": {}, "id": 1},
            {"method": "auth.whoami", "params": {}, "id": 2, "token": signed_token("auditor")?},
        ]),
        other => return Err(format!("unknown request '{other}'")),
    };
    Ok(body)
}

#[fixture]
fn world() -> RefCell<HttpWorld> {
    RefCell::new(HttpWorld::new())
}

#[given("the daemon speaks MessagePack")]
fn given_msgpack(world: &RefCell<HttpWorld>) {
    let mut world = world.borrow_mut();
    world.format = WireFormat::Msgpack;
    world
        .daemon
        .configure(|loader| loader.with_format(WireFormat::Msgpack));
}

#[given("an HTTP daemon is running")]
fn given_http_daemon(world: &RefCell<HttpWorld>) -> StepResult {
    world.borrow_mut().daemon.start_and_wait("http").map(drop)
}

#[given("the client holds a token for {role}")]
fn given_token(world: &RefCell<HttpWorld>, role: String) -> StepResult {
    let token = signed_token(&role)?;
    world.borrow_mut().token = Some(token);
    Ok(())
}

#[when("the client posts the {name} request")]
fn when_client_posts(world: &RefCell<HttpWorld>, name: String) -> StepResult {
    let mut world = world.borrow_mut();
    let body = request_body(&name)?;
    let bytes = match world.format {
        WireFormat::Json => serde_json::to_vec(&body).map_err(|error| error.to_string())?,
        WireFormat::Msgpack => {
            rmp_serde::to_vec_named(&body).map_err(|error| error.to_string())?
        }
    };
    world.send("http", "POST", "/", &bytes)
}

#[when("the client posts an empty body")]
fn when_client_posts_empty(world: &RefCell<HttpWorld>) -> StepResult {
    world.borrow_mut().send("http", "POST", "/", b"")
}

#[when("the client sends a GET request")]
fn when_client_gets(world: &RefCell<HttpWorld>) -> StepResult {
    world.borrow_mut().send("http", "GET", "/", b"")
}

#[when("the health probe is queried")]
fn when_health_queried(world: &RefCell<HttpWorld>) -> StepResult {
    world.borrow_mut().send("health", "GET", "/healthz", b"")
}

#[when("an unknown health path is queried")]
fn when_unknown_health_path(world: &RefCell<HttpWorld>) -> StepResult {
    world.borrow_mut().send("health", "GET", "/metrics", b"")
}

#[then("the response status is {status}")]
fn then_status(world: &RefCell<HttpWorld>, status: u16) -> StepResult {
    let world = world.borrow();
    let reply = world.reply()?;
    if reply.status == status {
        Ok(())
    } else {
        Err(format!("expected status {status}, got {reply:?}"))
    }
}

#[then("the response body is empty")]
fn then_body_empty(world: &RefCell<HttpWorld>) -> StepResult {
    let world = world.borrow();
    let reply = world.reply()?;
    if reply.body.is_empty() {
        Ok(())
    } else {
        Err(format!("unexpected body {:?}", String::from_utf8_lossy(&reply.body)))
    }
}

#[then("the response content type is {content_type}")]
fn then_content_type(world: &RefCell<HttpWorld>, content_type: String) {
    let world = world.borrow();
    let reply = world.reply().expect("response");
    assert_eq!(reply.header("Content-Type"), Some(content_type.as_str()));
}

#[then("the response allows only POST")]
fn then_allow_header(world: &RefCell<HttpWorld>) {
    let world = world.borrow();
    let reply = world.reply().expect("response");
    assert_eq!(reply.header("Allow"), Some("POST"));
}

#[then("the result is {result}")]
fn then_result(world: &RefCell<HttpWorld>, result: String) -> StepResult {
    let expected: Value = serde_json::from_str(&result).map_err(|error| error.to_string())?;
    let body = world.borrow().decoded_body()?;
    match body.get("result") {
        Some(actual) if *actual == expected => Ok(()),
        _ => Err(format!("expected result {expected}, got {body}")),
    }
}

#[then("the batch roles are {first} and {second}")]
fn then_batch_roles(world: &RefCell<HttpWorld>, first: String, second: String) -> StepResult {
    let body = world.borrow().decoded_body()?;
    let roles: Vec<Option<&str>> = body
        .as_array()
        .ok_or_else(|| format!("expected an array, got {body}"))?
        .iter()
        .map(|response| response.pointer("/result/role").and_then(Value::as_str))
        .collect();
    if roles == [Some(first.as_str()), Some(second.as_str())] {
        Ok(())
    } else {
        Err(format!("unexpected roles {roles:?} in {body}"))
    }
}

#[then("the health status is {status}")]
fn then_health_status(world: &RefCell<HttpWorld>, status: String) -> StepResult {
    let body = world.borrow().reply()?.json()?;
    let expected = json!({"status": status, "protocol": "http", "methods": 4, "queued": 0});
    if body == expected {
        Ok(())
    } else {
        Err(format!("expected {expected}, got {body}"))
    }
}

#[scenario(path = "tests/features/daemon_http.feature")]
fn daemon_http(#[from(world)] world: RefCell<HttpWorld>) {
    drop(world);
}
