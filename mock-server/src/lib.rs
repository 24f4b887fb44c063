use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::info;

pub const SIGNS: [&str; 12] = [
    "Aries",
    "Taurus",
    "Gemini",
    "Cancer",
    "Leo",
    "Virgo",
    "Libra",
    "Scorpio",
    "Sagittarius",
    "Capricorn",
    "Aquarius",
    "Pisces",
];

pub const BODIES: [&str; 10] = [
    "Sun",
    "Moon",
    "Ascendant",
    "Mercury",
    "Venus",
    "Mars",
    "Jupiter",
    "Saturn",
    "Uranus",
    "Neptune",
];

pub const MIN_CALENDAR_YEAR: u16 = 2020;
pub const MAX_CALENDAR_YEAR: u16 = 2100;

/// How `/users/{id}/big-three` answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BigThreeMode {
    /// Exactly Sun, Moon and Asc.
    #[default]
    Dedicated,
    /// The whole placement set, left for the client to narrow.
    FullSet,
}

#[derive(Debug, Clone, Default)]
pub struct MockOptions {
    /// Bearer token required on writes. `None` disables the check.
    pub token: Option<String>,
    pub big_three: BigThreeMode,
}

#[derive(Default)]
struct Store {
    users: BTreeMap<i64, Map<String, Value>>,
    next_id: i64,
}

struct AppState {
    store: RwLock<Store>,
    options: MockOptions,
}

type Shared = Arc<AppState>;

/// `{"detail": ...}` error body, the shape the portal reads messages from.
struct Failure(StatusCode, Value);

impl Failure {
    fn detail(status: StatusCode, detail: &str) -> Self {
        Self(status, Value::String(detail.to_string()))
    }

    fn not_found() -> Self {
        Self::detail(StatusCode::NOT_FOUND, "User not found")
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "detail": self.1 }))).into_response()
    }
}

pub fn app() -> Router {
    app_with(MockOptions::default())
}

pub fn app_with(options: MockOptions) -> Router {
    let state: Shared = Arc::new(AppState {
        store: RwLock::new(Store {
            users: BTreeMap::new(),
            next_id: 1,
        }),
        options,
    });
    Router::new()
        .route("/health", get(health))
        .route("/users", get(list_users).post(create_user))
        .route("/users/{id}", get(get_user).put(update_user))
        .route("/users/{id}/placements", get(placements))
        .route("/users/{id}/big-three", get(big_three))
        .route("/users/{id}/booklet", get(booklet))
        .route("/users/{id}/calendar/{year}", get(calendar))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with(listener, MockOptions::default()).await
}

pub async fn run_with(listener: TcpListener, options: MockOptions) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(options)).await
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_users(State(state): State<Shared>) -> Json<Vec<Map<String, Value>>> {
    let store = state.store.read().await;
    Json(store.users.values().cloned().collect())
}

async fn create_user(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(input): Json<Map<String, Value>>,
) -> Result<(StatusCode, Json<Map<String, Value>>), Failure> {
    authorize(&state.options, &headers)?;
    require_first_name(&input)?;

    let mut store = state.store.write().await;
    // The portal's form posts updates to /users with the id in the body.
    if let Some(id) = input.get("id").and_then(Value::as_i64) {
        let user = store.users.get_mut(&id).ok_or_else(Failure::not_found)?;
        merge(user, input);
        info!(id, "user updated");
        return Ok((StatusCode::OK, Json(user.clone())));
    }

    let id = store.next_id;
    store.next_id += 1;
    let mut user = input;
    user.insert("id".to_string(), Value::from(id));
    store.users.insert(id, user.clone());
    info!(id, "user created");
    Ok((StatusCode::CREATED, Json(user)))
}

async fn get_user(
    State(state): State<Shared>,
    Path(id): Path<i64>,
) -> Result<Json<Map<String, Value>>, Failure> {
    let store = state.store.read().await;
    store.users.get(&id).cloned().map(Json).ok_or_else(Failure::not_found)
}

async fn update_user(
    State(state): State<Shared>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(input): Json<Map<String, Value>>,
) -> Result<Json<Map<String, Value>>, Failure> {
    authorize(&state.options, &headers)?;
    if input.contains_key("first_name") {
        require_first_name(&input)?;
    }
    let mut store = state.store.write().await;
    let user = store.users.get_mut(&id).ok_or_else(Failure::not_found)?;
    merge(user, input);
    Ok(Json(user.clone()))
}

async fn placements(
    State(state): State<Shared>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, Failure> {
    let user = find_user(&state, id).await?;
    Ok(Json(placement_set(&user, &BODIES)))
}

async fn big_three(
    State(state): State<Shared>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, Failure> {
    let user = find_user(&state, id).await?;
    let body = match state.options.big_three {
        BigThreeMode::FullSet => placement_set(&user, &BODIES),
        BigThreeMode::Dedicated => {
            let mut full = placement_set(&user, &BODIES[..3]);
            if let Some(map) = full.as_object_mut() {
                if let Some(asc) = map.remove("Ascendant") {
                    map.insert("Asc".to_string(), asc);
                }
            }
            full
        }
    };
    Ok(Json(body))
}

async fn booklet(State(state): State<Shared>, Path(id): Path<i64>) -> Result<Response, Failure> {
    let user = find_user(&state, id).await?;
    let title = format!("Astrology booklet for {}", display_name(&user));
    Ok(pdf_response(render_document(&title)))
}

async fn calendar(
    State(state): State<Shared>,
    Path((id, year)): Path<(i64, u16)>,
) -> Result<Response, Failure> {
    let user = find_user(&state, id).await?;
    if !(MIN_CALENDAR_YEAR..=MAX_CALENDAR_YEAR).contains(&year) {
        return Err(Failure::detail(
            StatusCode::UNPROCESSABLE_ENTITY,
            &format!("year must be between {MIN_CALENDAR_YEAR} and {MAX_CALENDAR_YEAR}"),
        ));
    }
    let title = format!("{year} calendar for {}", display_name(&user));
    Ok(pdf_response(render_document(&title)))
}

fn authorize(options: &MockOptions, headers: &HeaderMap) -> Result<(), Failure> {
    let Some(expected) = options.token.as_deref() else {
        return Ok(());
    };
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    match presented {
        None => Err(Failure::detail(StatusCode::UNAUTHORIZED, "Not authenticated")),
        Some(token) if token == expected => Ok(()),
        Some(_) => Err(Failure::detail(StatusCode::FORBIDDEN, "Invalid token")),
    }
}

fn require_first_name(input: &Map<String, Value>) -> Result<(), Failure> {
    match input.get("first_name").and_then(Value::as_str) {
        Some(name) if !name.trim().is_empty() => Ok(()),
        _ => Err(Failure(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!([{ "loc": ["body", "first_name"], "msg": "field required", "type": "missing" }]),
        )),
    }
}

fn merge(user: &mut Map<String, Value>, input: Map<String, Value>) {
    for (key, value) in input {
        if key != "id" {
            user.insert(key, value);
        }
    }
}

async fn find_user(state: &Shared, id: i64) -> Result<Map<String, Value>, Failure> {
    let store = state.store.read().await;
    store.users.get(&id).cloned().ok_or_else(Failure::not_found)
}

fn display_name(user: &Map<String, Value>) -> String {
    ["first_name", "last_name"]
        .iter()
        .filter_map(|key| user.get(*key).and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Deterministic stand-in for the real ephemeris: the same user always gets
/// the same placements.
pub fn placement_set(user: &Map<String, Value>, bodies: &[&str]) -> Value {
    let seed = ["id", "birthdate", "birthtime", "city"]
        .iter()
        .filter_map(|key| user.get(*key))
        .map(|value| value.to_string())
        .flat_map(|text| text.into_bytes())
        .fold(17u64, |acc, byte| acc.wrapping_mul(31).wrapping_add(u64::from(byte)));

    let mut set = Map::new();
    for (index, body) in bodies.iter().enumerate() {
        let step = seed.wrapping_add(index as u64 * 7919);
        let sign = SIGNS[(step % 12) as usize];
        let degree = (step % 3000) as f64 / 100.0;
        set.insert(body.to_string(), json!({ "sign": sign, "degree": degree }));
    }
    Value::Object(set)
}

/// Minimal PDF-shaped payload. The second line holds non-UTF-8 bytes, as
/// real PDFs do, so byte-exact handling is observable.
pub fn render_document(title: &str) -> Vec<u8> {
    let mut doc = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n".to_vec();
    doc.extend_from_slice(format!("1 0 obj << /Title ({title}) >> endobj\n").as_bytes());
    doc.extend_from_slice(b"%%EOF\n");
    doc
}

fn pdf_response(bytes: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "application/pdf")], bytes).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, birthdate: &str) -> Map<String, Value> {
        let mut user = Map::new();
        user.insert("id".to_string(), Value::from(id));
        user.insert("first_name".to_string(), Value::from("Ada"));
        user.insert("birthdate".to_string(), Value::from(birthdate));
        user
    }

    #[test]
    fn placement_set_is_deterministic_and_complete() {
        let a = placement_set(&user(1, "1990-04-02"), &BODIES);
        let b = placement_set(&user(1, "1990-04-02"), &BODIES);
        assert_eq!(a, b);
        assert_eq!(a.as_object().unwrap().len(), BODIES.len());
        let sun = &a["Sun"];
        assert!(SIGNS.contains(&sun["sign"].as_str().unwrap()));
        assert!(sun["degree"].as_f64().unwrap() < 30.0);
    }

    #[test]
    fn rendered_document_is_not_utf8() {
        let doc = render_document("x");
        assert!(doc.starts_with(b"%PDF-1.4"));
        assert!(std::str::from_utf8(&doc).is_err());
    }

    #[test]
    fn require_first_name_rejects_blank() {
        let mut input = Map::new();
        input.insert("first_name".to_string(), Value::from("  "));
        assert!(require_first_name(&input).is_err());
        input.insert("first_name".to_string(), Value::from("Ada"));
        assert!(require_first_name(&input).is_ok());
    }

    #[test]
    fn merge_never_overwrites_id() {
        let mut stored = user(4, "2000-01-01");
        let mut input = Map::new();
        input.insert("id".to_string(), Value::from(99));
        input.insert("city".to_string(), Value::from("Ghent"));
        merge(&mut stored, input);
        assert_eq!(stored["id"], 4);
        assert_eq!(stored["city"], "Ghent");
    }
}
