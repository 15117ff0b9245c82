use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    routing::{any, get},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const SUCCESS: i64 = 1;
pub const FAIL: i64 = 0;
pub const AUTH: i64 = -1;

/// Token `/auth` accepts in the `x-token` header.
pub const TOKEN: &str = "letmein";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateUser {
    pub name: String,
    pub email: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub email: Option<String>,
}

pub type Db = Arc<RwLock<HashMap<Uuid, User>>>;

/// `{"status": code, "data": data}`.
pub fn envelope(status: i64, data: impl Serialize) -> Json<Value> {
    Json(json!({ "status": status, "data": data }))
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/echo", any(echo))
        .route("/auth", any(auth))
        .route("/plain", get(|| async { "pong" }))
        .route("/shapeless", get(|| async { Json(json!({ "unexpectedField": 1 })) }))
        .route("/teapot", any(|| async { (StatusCode::IM_A_TEAPOT, "short and stout") }))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn list_users(State(db): State<Db>) -> Json<Value> {
    let users = db.read().await;
    let mut list: Vec<User> = users.values().cloned().collect();
    list.sort_by(|a, b| a.name.cmp(&b.name));
    envelope(SUCCESS, list)
}

async fn create_user(
    State(db): State<Db>,
    Form(input): Form<CreateUser>,
) -> (StatusCode, Json<Value>) {
    if input.name.trim().is_empty() {
        return (StatusCode::OK, envelope(FAIL, "name is required"));
    }
    let user = User {
        id: Uuid::new_v4(),
        name: input.name,
        email: input.email,
    };
    db.write().await.insert(user.id, user.clone());
    tracing::debug!(id = %user.id, "user created");
    (StatusCode::CREATED, envelope(SUCCESS, user))
}

async fn get_user(State(db): State<Db>, Path(id): Path<Uuid>) -> Json<Value> {
    let users = db.read().await;
    match users.get(&id) {
        Some(user) => envelope(SUCCESS, user),
        None => envelope(FAIL, "user not found"),
    }
}

async fn update_user(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateUser>,
) -> Json<Value> {
    let mut users = db.write().await;
    let Some(user) = users.get_mut(&id) else {
        return envelope(FAIL, "user not found");
    };
    if let Some(name) = input.name {
        user.name = name;
    }
    if let Some(email) = input.email {
        user.email = Some(email);
    }
    envelope(SUCCESS, user.clone())
}

async fn delete_user(State(db): State<Db>, Path(id): Path<Uuid>) -> Json<Value> {
    let mut users = db.write().await;
    match users.remove(&id) {
        Some(_) => envelope(SUCCESS, Value::Null),
        None => envelope(FAIL, "user not found"),
    }
}

/// Reflects the request back inside a success envelope.
async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: String) -> Json<Value> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let token = headers.get("x-token").and_then(|v| v.to_str().ok());
    envelope(
        SUCCESS,
        json!({
            "method": method.as_str(),
            "path": uri.path(),
            "query": uri.query(),
            "content_type": content_type,
            "token": token,
            "body": body,
        }),
    )
}

async fn auth(headers: HeaderMap) -> Json<Value> {
    match headers.get("x-token").and_then(|v| v.to_str().ok()) {
        Some(TOKEN) => envelope(SUCCESS, "welcome"),
        _ => envelope(AUTH, "login required"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_has_status_and_data() {
        let Json(value) = envelope(SUCCESS, json!({"id": 7}));
        assert_eq!(value["status"], 1);
        assert_eq!(value["data"]["id"], 7);
    }

    #[test]
    fn user_serializes_to_json() {
        let user = User {
            id: Uuid::nil(),
            name: "Ann".to_string(),
            email: None,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(json["name"], "Ann");
        assert!(json["email"].is_null());
    }

    #[test]
    fn update_user_all_fields_optional() {
        let input: UpdateUser = serde_json::from_str(r#"{}"#).unwrap();
        assert!(input.name.is_none());
        assert!(input.email.is_none());
    }

    #[test]
    fn create_user_requires_name() {
        let result: Result<CreateUser, _> = serde_json::from_str(r#"{"email":"a@b"}"#);
        assert!(result.is_err());
    }
}
