//! Mock target server for integration testing
//!
//! A small axum app with a register/login flow, usable as a project's server
//! command without needing a real application stack.
//!
//! Routes:
//! - `POST /register` stores `{email, password}` and answers 201 with a token
//! - `POST /login` answers 200 echoing the credentials when they match, 401
//!   otherwise
//! - `GET /health` answers 200 with two `Set-Cookie` headers

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::{AUTHORIZATION, SET_COOKIE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use serde_json::{json, Value};

const TOKEN: &str = "abc123";

#[derive(Parser)]
#[command(name = "mock_target")]
struct Args {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long)]
    port: u16,
}

#[derive(Default)]
struct MockState {
    /// email -> password
    users: HashMap<String, String>,
}

type SharedState = Arc<Mutex<MockState>>;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let listener = match tokio::net::TcpListener::bind((args.host.as_str(), args.port)).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("mock_target: cannot bind {}:{}: {}", args.host, args.port, e);
            std::process::exit(2);
        }
    };
    eprintln!("mock_target listening on {}:{}", args.host, args.port);

    if let Err(e) = axum::serve(listener, router()).await {
        eprintln!("mock_target: {e}");
        std::process::exit(1);
    }
}

fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/health", get(health))
        .fallback(not_found)
        .with_state(SharedState::default())
}

/// Request body as JSON; anything unparsable reads as null
fn payload(body: &Bytes) -> Value {
    serde_json::from_slice(body).unwrap_or(Value::Null)
}

fn field(payload: &Value, name: &str) -> String {
    payload
        .get(name)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

async fn register(State(state): State<SharedState>, body: Bytes) -> Response {
    let payload = payload(&body);
    let email = field(&payload, "email");
    if email.is_empty() {
        return error(StatusCode::UNPROCESSABLE_ENTITY, "email is required");
    }

    state
        .lock()
        .unwrap_or_else(|p| p.into_inner())
        .users
        .insert(email.clone(), field(&payload, "password"));

    (
        StatusCode::CREATED,
        Json(json!({ "access_token": TOKEN, "email": email })),
    )
        .into_response()
}

async fn login(State(state): State<SharedState>, headers: HeaderMap, body: Bytes) -> Response {
    let payload = payload(&body);
    let email = field(&payload, "email");
    let password = field(&payload, "password");

    let known = state
        .lock()
        .unwrap_or_else(|p| p.into_inner())
        .users
        .get(&email)
        == Some(&password);
    if !known {
        return error(StatusCode::UNAUTHORIZED, "invalid credentials");
    }

    let authorization = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    Json(json!({
        "email": email,
        "password": password,
        "auth": payload.get("auth"),
        "authorization": authorization,
    }))
    .into_response()
}

async fn health() -> impl IntoResponse {
    (
        AppendHeaders([
            (SET_COOKIE, "session=one; Path=/"),
            (SET_COOKIE, "theme=dark; Path=/"),
        ]),
        "ok",
    )
}

async fn not_found() -> Response {
    error(StatusCode::NOT_FOUND, "not found")
}
