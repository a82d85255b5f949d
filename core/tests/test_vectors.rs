//! Verify every façade operation against JSON test vectors in `test-vectors/`.
//!
//! Each vector names an operation, its arguments, and the request expected
//! on the wire. Requests are captured by an in-memory transport, so no
//! network is involved. Comparing parsed JSON (not raw strings) avoids
//! false negatives from field ordering.

use std::sync::{Arc, Mutex};

use customerio::{
    ApiClient, Attributes, HttpMethod, HttpRequest, HttpResponse, IdentifierType, SendEmailRequest, SendPushRequest,
    TrackClient, Transport, TransportError,
};
use serde_json::Value;

/// Answers 200 `{}` to everything and keeps what it was sent.
#[derive(Default)]
struct Recorder {
    requests: Mutex<Vec<HttpRequest>>,
}

impl Recorder {
    fn take(&self) -> Vec<HttpRequest> {
        std::mem::take(&mut *self.requests.lock().unwrap())
    }
}

impl Transport for Recorder {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(HttpResponse {
            status: 200,
            body: "{}".to_string(),
        })
    }
}

fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        "PUT" => HttpMethod::Put,
        "DELETE" => HttpMethod::Delete,
        other => panic!("unknown method: {other}"),
    }
}

fn attrs(v: &Value) -> Attributes {
    v.as_object()
        .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}

fn rows(v: &Value) -> Vec<Attributes> {
    v.as_array().unwrap().iter().map(attrs).collect()
}

fn s<'a>(args: &'a Value, key: &str) -> &'a str {
    args[key].as_str().unwrap_or_else(|| panic!("missing string arg {key}"))
}

fn check(name: &str, base_url: &str, expected: &Value, actual: &[HttpRequest]) {
    assert_eq!(actual.len(), 1, "{name}: exactly one request");
    let req = &actual[0];
    assert_eq!(req.method, parse_method(s(expected, "method")), "{name}: method");
    assert_eq!(req.url, format!("{base_url}{}", s(expected, "path")), "{name}: url");

    let body = req
        .body
        .as_deref()
        .map(|b| serde_json::from_str::<Value>(b).unwrap())
        .unwrap_or(Value::Null);
    assert_eq!(body, expected["body"], "{name}: body");

    if req.body.is_some() {
        assert_eq!(req.header("content-type"), Some("application/json"), "{name}: content type");
    }
    assert_eq!(req.header("user-agent"), Some(customerio::USER_AGENT), "{name}: user agent");
}

// ---------------------------------------------------------------------------
// Track API
// ---------------------------------------------------------------------------

#[test]
fn track_test_vectors() {
    let raw = include_str!("../../test-vectors/track.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();
    let base_url = s(&vectors, "base_url");

    let recorder = Arc::new(Recorder::default());
    let client = TrackClient::builder("siteid", "apikey")
        .transport(recorder.clone())
        .build()
        .unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = s(case, "name");
        let args = &case["args"];

        let result = match s(case, "operation") {
            "identify" => client.identify(s(args, "id"), attrs(&args["attributes"])),
            "track" => client.track(s(args, "customer_id"), s(args, "name"), attrs(&args["data"])),
            "pageview" => client.pageview(s(args, "customer_id"), s(args, "page"), attrs(&args["data"])),
            "backfill" => {
                let timestamp = &args["timestamp"];
                let data = attrs(&args["data"]);
                match timestamp.as_i64() {
                    Some(ts) => client.backfill(s(args, "customer_id"), s(args, "name"), ts, data),
                    None => client.backfill(s(args, "customer_id"), s(args, "name"), s(args, "timestamp"), data),
                }
            }
            "track_anonymous" => client.track_anonymous(s(args, "anonymous_id"), s(args, "name"), attrs(&args["data"])),
            "delete" => client.delete(s(args, "customer_id")),
            "add_device" => client.add_device(
                s(args, "customer_id"),
                s(args, "device_id"),
                s(args, "platform"),
                attrs(&args["data"]),
            ),
            "delete_device" => client.delete_device(s(args, "customer_id"), s(args, "device_id")),
            "suppress" => client.suppress(s(args, "customer_id")),
            "unsuppress" => client.unsuppress(s(args, "customer_id")),
            "merge_customers" => client.merge_customers(
                s(args, "primary_type").parse::<IdentifierType>().unwrap(),
                s(args, "primary_id"),
                s(args, "secondary_type").parse::<IdentifierType>().unwrap(),
                s(args, "secondary_id"),
            ),
            "add_to_segment" | "remove_from_segment" => {
                let ids: Vec<&str> = args["customer_ids"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .map(|v| v.as_str().unwrap())
                    .collect();
                if s(case, "operation") == "add_to_segment" {
                    client.add_to_segment(s(args, "segment_id"), ids)
                } else {
                    client.remove_from_segment(s(args, "segment_id"), ids)
                }
            }
            other => panic!("{name}: unknown operation {other}"),
        };

        result.unwrap_or_else(|e| panic!("{name}: {e}"));
        let sent = recorder.take();
        check(name, base_url, &case["expected_request"], &sent);
        assert_eq!(sent[0].header("authorization"), Some("Basic c2l0ZWlkOmFwaWtleQ=="), "{name}: auth");
    }
}

// ---------------------------------------------------------------------------
// App API
// ---------------------------------------------------------------------------

#[test]
fn app_test_vectors() {
    let raw = include_str!("../../test-vectors/app.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();
    let base_url = s(&vectors, "base_url");

    let recorder = Arc::new(Recorder::default());
    let client = ApiClient::builder("app_api_key")
        .transport(recorder.clone())
        .build()
        .unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = s(case, "name");
        let args = &case["args"];

        let result = match s(case, "operation") {
            "send_email" => {
                let mut req = SendEmailRequest::new(args["transactional_message_id"].as_u64().unwrap())
                    .subject(s(args, "subject"));
                for (k, v) in args["identifiers"].as_object().unwrap() {
                    req.add_identifier(k, v.as_str().unwrap()).unwrap();
                }
                client.send_email(&req).map(|_| ())
            }
            "send_push" => {
                let mut req = SendPushRequest::new(args["transactional_message_id"].as_u64().unwrap())
                    .title(s(args, "title"));
                for (k, v) in args["identifiers"].as_object().unwrap() {
                    req.add_identifier(k, v.as_str().unwrap()).unwrap();
                }
                client.send_push(&req).map(|_| ())
            }
            "list_collections" => client.list_collections().map(|_| ()),
            "create_collection" => client.create_collection(s(args, "name"), rows(&args["data"])).map(|_| ()),
            "get_collection" => client.get_collection(s(args, "id")).map(|_| ()),
            "update_collection" => client
                .update_collection(s(args, "id"), args["name"].as_str(), None)
                .map(|_| ()),
            "delete_collection" => client.delete_collection(s(args, "id")),
            "get_collection_content" => client.get_collection_content(s(args, "id")).map(|_| ()),
            "replace_collection_content" => client
                .replace_collection_content(s(args, "id"), rows(&args["data"]))
                .map(|_| ()),
            other => panic!("{name}: unknown operation {other}"),
        };

        result.unwrap_or_else(|e| panic!("{name}: {e}"));
        let sent = recorder.take();
        check(name, base_url, &case["expected_request"], &sent);
        assert_eq!(sent[0].header("authorization"), Some("Bearer app_api_key"), "{name}: auth");
    }
}

// ---------------------------------------------------------------------------
// Validation: rejected before anything reaches the transport
// ---------------------------------------------------------------------------

#[test]
fn blank_identifiers_never_reach_the_wire() {
    let recorder = Arc::new(Recorder::default());
    let client = TrackClient::builder("siteid", "apikey")
        .transport(recorder.clone())
        .build()
        .unwrap();

    let cases = [
        (client.identify("", Attributes::new()), "id cannot be blank in identify"),
        (client.track("  ", "x", Attributes::new()), "customer_id cannot be blank in track"),
        (client.add_device("1", "", "ios", Attributes::new()), "device_id cannot be blank in add_device"),
        (client.add_device("1", "d1", "", Attributes::new()), "platform cannot be blank in add_device"),
        (client.delete_device("1", ""), "device_id cannot be blank in delete_device"),
        (client.track_anonymous("anon", "", Attributes::new()), "name cannot be blank in track_anonymous"),
        (
            client.add_to_segment("5", Vec::<&str>::new()),
            "customer_ids cannot be blank in add_to_segment",
        ),
    ];
    for (result, message) in cases {
        let err = result.unwrap_err();
        assert!(err.is_validation(), "{message}");
        assert_eq!(err.to_string(), message);
    }
    assert!(recorder.take().is_empty());
}

#[test]
fn unparseable_backfill_timestamp_is_rejected() {
    let recorder = Arc::new(Recorder::default());
    let client = TrackClient::builder("siteid", "apikey")
        .transport(recorder.clone())
        .build()
        .unwrap();

    let err = client.backfill("1", "signup", "last tuesday", Attributes::new()).unwrap_err();
    assert!(matches!(err, customerio::Error::InvalidTimestamp { .. }));
    assert!(recorder.take().is_empty());
}

#[test]
fn segment_ids_accept_numbers() {
    let recorder = Arc::new(Recorder::default());
    let client = TrackClient::builder("siteid", "apikey")
        .transport(recorder.clone())
        .build()
        .unwrap();

    client.add_to_segment(5, [1, 2]).unwrap();
    let sent = recorder.take();
    assert!(sent[0].url.ends_with("/segments/5/add_customers"));
    let body: Value = serde_json::from_str(sent[0].body.as_deref().unwrap()).unwrap();
    assert_eq!(body, serde_json::json!({ "ids": ["1", "2"] }));
}
