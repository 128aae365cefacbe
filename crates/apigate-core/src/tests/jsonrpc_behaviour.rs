//! Behavioural tests for the JSON-RPC adapter.

use std::cell::RefCell;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::{Value, json};

use super::support::{Harness, strip_quotes};
use crate::jsonrpc::{JsonRpcEndpoint, JsonRpcReply};

struct WireWorld {
    harness: Harness,
    endpoint: Option<JsonRpcEndpoint>,
    reply: Option<Option<Value>>,
}

impl WireWorld {
    fn reply(&self) -> Option<&Value> {
        self.reply
            .as_ref()
            .expect("a body was handled")
            .as_ref()
    }

    fn single(&self) -> &Value {
        let reply = self.reply().expect("a reply was written");
        assert!(reply.is_object(), "expected a single response: {reply}");
        reply
    }
}

#[fixture]
fn world() -> RefCell<WireWorld> {
    RefCell::new(WireWorld {
        harness: Harness::new(),
        endpoint: None,
        reply: None,
    })
}

#[given("a JSON-RPC endpoint")]
fn given_endpoint(world: &RefCell<WireWorld>) {
    let mut world = world.borrow_mut();
    let dispatcher = world.harness.dispatcher.clone();
    world.endpoint = Some(JsonRpcEndpoint::new(dispatcher));
}

#[when("the body {body} is handled")]
fn when_body_handled(world: &RefCell<WireWorld>, body: String) {
    let mut world = world.borrow_mut();
    let body = body.trim_matches('\'');
    let request = world.harness.request();
    let endpoint = world.endpoint.as_ref().expect("endpoint configured");
    let reply = endpoint
        .handle(&request, body.as_bytes())
        .map(|reply: JsonRpcReply| serde_json::to_value(reply).expect("serialise reply"));
    world.reply = Some(reply);
}

#[then("the reply is a single response with id {id}")]
fn then_single_with_id(world: &RefCell<WireWorld>, id: String) {
    let world = world.borrow();
    let expected: Value = serde_json::from_str(&id).expect("id is JSON");
    let response = world.single();
    assert_eq!(response["jsonrpc"], json!("2.0"));
    assert_eq!(response["id"], expected);
}

#[then("the response result is \"{result}\"")]
fn then_result(world: &RefCell<WireWorld>, result: String) {
    let world = world.borrow();
    let response = world.single();
    assert_eq!(response["result"], json!(strip_quotes(&result)));
    assert!(response.get("error").is_none());
}

#[then("the reply is a single error with code {code}")]
fn then_single_error(world: &RefCell<WireWorld>, code: String) {
    let world = world.borrow();
    let expected: i64 = code.parse().expect("numeric code");
    let response = world.single();
    assert_eq!(response["error"]["code"], json!(expected), "{response}");
    assert!(response.get("result").is_none());
}

#[then("the reply is a batch of {count} responses")]
fn then_batch(world: &RefCell<WireWorld>, count: usize) {
    let world = world.borrow();
    let reply = world.reply().expect("a reply was written");
    let members = reply.as_array().expect("batch reply");
    assert_eq!(members.len(), count);
    let ids: Vec<_> = members.iter().map(|member| member["id"].clone()).collect();
    assert!(!ids.contains(&Value::Null), "notifications must not be answered");
}

#[then("there is no reply")]
fn then_no_reply(world: &RefCell<WireWorld>) {
    assert!(world.borrow().reply().is_none());
}

#[scenario(path = "tests/features/jsonrpc.feature")]
fn json_rpc_adapter(#[from(world)] world: RefCell<WireWorld>) {
    drop(world);
}
