//! Verify request building and response interpretation against the JSON
//! test vectors stored in `test-vectors/`.
//!
//! Comparing parsed JSON (not raw strings) avoids false negatives from
//! field-ordering differences.

use astro_portal_core::{
    build_request, interpret, ApiError, ArtifactKind, Configuration, ExpectedKind, HttpMethod,
    HttpResponse, Operation, Payload, UserDraft, UserId,
};
use serde_json::Value;

fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        "PUT" => HttpMethod::Put,
        other => panic!("unknown method: {other}"),
    }
}

fn user_id(value: &Value) -> UserId {
    serde_json::from_value(value.clone()).unwrap()
}

fn parse_operation(op: &Value) -> Operation {
    match op["kind"].as_str().unwrap() {
        "list_users" => Operation::ListUsers,
        "get_user" => Operation::GetUser(user_id(&op["id"])),
        "upsert_user" => {
            let draft: UserDraft = serde_json::from_value(op["draft"].clone()).unwrap();
            Operation::UpsertUser(draft)
        }
        "get_placements" => Operation::GetPlacements(user_id(&op["id"])),
        "get_big_three" => Operation::GetBigThree(user_id(&op["id"])),
        "generate_booklet" => Operation::GenerateBooklet(user_id(&op["id"])),
        "generate_calendar" => Operation::GenerateCalendar {
            id: user_id(&op["id"]),
            year: op.get("year").and_then(Value::as_u64).map(|y| y as u16),
        },
        "health_check" => Operation::HealthCheck,
        other => panic!("unknown operation: {other}"),
    }
}

fn parse_expected_kind(s: &str) -> ExpectedKind {
    match s {
        "users" => ExpectedKind::Users,
        "user" => ExpectedKind::User,
        "placements" => ExpectedKind::Placements,
        "big_three" => ExpectedKind::BigThree,
        "health" => ExpectedKind::Health,
        "booklet" => ExpectedKind::Artifact {
            kind: ArtifactKind::Booklet,
            user_id: UserId::Int(1),
        },
        other => panic!("unknown expected kind: {other}"),
    }
}

fn payload_json(payload: &Payload) -> Value {
    match payload {
        Payload::Users(users) => serde_json::to_value(users).unwrap(),
        Payload::User(user) => serde_json::to_value(user).unwrap(),
        Payload::Placements(set) => serde_json::to_value(set).unwrap(),
        Payload::BigThree(big) => serde_json::to_value(big).unwrap(),
        Payload::Health(value) => value.clone(),
        Payload::Artifact(_) => panic!("artifacts are not JSON"),
    }
}

fn variant_name(err: &ApiError) -> &'static str {
    match err {
        ApiError::Unreachable { .. } => "Unreachable",
        ApiError::Http { .. } => "Http",
        ApiError::MalformedResponse { .. } => "MalformedResponse",
        ApiError::Unsupported { .. } => "Unsupported",
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[test]
fn request_test_vectors() {
    let raw = include_str!("../../test-vectors/requests.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();
    let base_url = vectors["base_url"].as_str().unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let mut config = Configuration::new(base_url).unwrap();
        if let Some(token) = case.get("credential").and_then(Value::as_str) {
            config = config.with_credential(token);
        }
        let operation = parse_operation(&case["operation"]);
        let result = build_request(&operation, &config);

        if let Some(expected_error) = case.get("expected_error") {
            let err = result.unwrap_err();
            assert_eq!(variant_name(&err), expected_error.as_str().unwrap(), "{name}: error");
            continue;
        }

        let req = result.unwrap();
        let expected = &case["expected_request"];
        assert_eq!(req.method, parse_method(expected["method"].as_str().unwrap()), "{name}: method");
        assert_eq!(req.url, format!("{base_url}{}", expected["path"].as_str().unwrap()), "{name}: url");

        let expected_headers: Vec<(String, String)> = expected["headers"]
            .as_array()
            .unwrap()
            .iter()
            .map(|h| {
                let pair = h.as_array().unwrap();
                (pair[0].as_str().unwrap().to_string(), pair[1].as_str().unwrap().to_string())
            })
            .collect();
        assert_eq!(req.headers, expected_headers, "{name}: headers");

        match req.body.as_deref() {
            Some(body) => {
                let body: Value = serde_json::from_str(body).unwrap();
                assert_eq!(body, expected["body"], "{name}: body");
            }
            None => assert!(expected["body"].is_null(), "{name}: body should be None"),
        }
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[test]
fn response_test_vectors() {
    let raw = include_str!("../../test-vectors/responses.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let expected_kind = parse_expected_kind(case["expected_kind"].as_str().unwrap());
        let sim = &case["simulated_response"];
        let response = HttpResponse {
            status: sim["status"].as_u64().unwrap() as u16,
            headers: sim["content_type"]
                .as_str()
                .map(|ct| vec![("content-type".to_string(), ct.to_string())])
                .unwrap_or_default(),
            body: sim["body"].as_str().unwrap().as_bytes().to_vec(),
        };

        let result = interpret(Ok(response), &expected_kind);

        if let Some(expected_error) = case.get("expected_error") {
            let err = result.unwrap_err();
            assert_eq!(variant_name(&err), expected_error["variant"].as_str().unwrap(), "{name}: variant");
            assert_eq!(
                err.status().map(u64::from),
                expected_error["status"].as_u64(),
                "{name}: status"
            );
            if let Some(message) = expected_error.get("message").and_then(Value::as_str) {
                assert_eq!(err.to_string(), message, "{name}: message");
            }
            if variant_name(&err) == "MalformedResponse" {
                assert!(err.to_string().starts_with("malformed response"), "{name}: reason");
            }
        } else {
            let payload = result.unwrap_or_else(|e| panic!("{name}: unexpected error {e}"));
            assert_eq!(payload_json(&payload), case["expected_result"], "{name}: parsed result");
        }
    }
}
