// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT


use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, FixedOffset};
use hexcms::{
    config::{RepoCoordinates, SiteDefinition},
    store::{file_name, FileStore, MemoryStore, StoreError},
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

pub(crate) const OWNER: &str = "alice";
pub(crate) const REPO: &str = "blog";
pub(crate) const TOKEN: &str = "ghp_fixture";

// Files above this size are only served through the blob endpoint.
const CONTENTS_SIZE_LIMIT: usize = 1024 * 1024;

pub(crate) fn march_first() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339("2024-03-01T09:30:00+00:00").unwrap()
}

pub(crate) fn post_file(title: &str, date: &str, draft: bool, body: &str) -> String {
    format!("---\ntitle: {title}\ndate: {date}\ndraft: {draft}\n---\n\n{body}\n")
}

/// Stand-in for the parts of the GitHub REST API hexcms talks to.
///
/// Repository content lives in a [`MemoryStore`], so revision tokens and
/// conflicts behave exactly like in the in-memory backend.
pub(crate) struct FakeGitHub {
    base_url: String,
    state: Arc<FakeState>,
}

struct FakeState {
    files: MemoryStore,
    token: Mutex<String>,
    runs: Mutex<Vec<Value>>,
    rate_limited: AtomicBool,
}

impl FakeGitHub {
    pub(crate) async fn start(
        files: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Result<Self> {
        let state = Arc::new(FakeState {
            files: MemoryStore::with_files(files),
            token: Mutex::new(TOKEN.into()),
            runs: Mutex::new(Vec::new()),
            rate_limited: AtomicBool::new(false),
        });

        let app = Router::new()
            .route("/user", get(user))
            .route("/repos/{owner}/{repo}", get(repository))
            .route("/repos/{owner}/{repo}/actions/runs", get(runs))
            .route(
                "/repos/{owner}/{repo}/contents/{*path}",
                get(read_contents).put(write_contents).delete(delete_contents),
            )
            .route("/repos/{owner}/{repo}/git/blobs/{sha}", get(read_blob))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}", listener.local_addr()?);
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self { base_url, state })
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn site(&self) -> SiteDefinition {
        let mut site = SiteDefinition::new(RepoCoordinates::new(OWNER, REPO, "main"));
        site.api_base = Some(self.base_url.clone());
        site
    }

    pub(crate) fn files(&self) -> &MemoryStore {
        &self.state.files
    }

    pub(crate) fn revoke_token(&self) {
        *self.state.token.lock().unwrap() = "ghp_revoked".into();
    }

    pub(crate) fn push_run(&self, run: Value) {
        self.state.runs.lock().unwrap().insert(0, run);
    }

    pub(crate) fn exhaust_rate_limit(&self) {
        self.state.rate_limited.store(true, Ordering::SeqCst);
    }
}

pub(crate) fn workflow_run(id: u64, status: &str, conclusion: Option<&str>) -> Value {
    json!({
        "id": id,
        "name": "Deploy",
        "status": status,
        "conclusion": conclusion,
        "created_at": "2024-03-01T10:00:00Z",
        "updated_at": "2024-03-01T10:02:00Z",
        "html_url": format!("https://github.com/{OWNER}/{REPO}/actions/runs/{id}"),
        "head_commit": { "message": format!("commit {id}\n\nlonger description") },
    })
}

#[derive(Deserialize)]
struct PutBody {
    message: String,
    content: String,
    sha: Option<String>,
}

#[derive(Deserialize)]
struct DeleteBody {
    message: String,
    sha: String,
}

fn message(status: StatusCode, text: &str) -> Response {
    (status, Json(json!({ "message": text }))).into_response()
}

fn gate(state: &FakeState, headers: &HeaderMap) -> Option<Response> {
    if state.rate_limited.load(Ordering::SeqCst) {
        let mut response = message(StatusCode::FORBIDDEN, "API rate limit exceeded");
        response
            .headers_mut()
            .insert("x-ratelimit-remaining", "0".parse().unwrap());
        return Some(response);
    }

    let expect = format!("Bearer {}", state.token.lock().unwrap());
    let given = headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok());
    if given != Some(expect.as_str()) {
        return Some(message(StatusCode::UNAUTHORIZED, "Bad credentials"));
    }

    None
}

// GitHub wraps base64 payloads at 60 columns.
fn wrapped_base64(bytes: &[u8]) -> String {
    STANDARD
        .encode(bytes)
        .as_bytes()
        .chunks(60)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join("\n")
}

fn store_failure(error: StoreError, sha_given: bool) -> Response {
    match error {
        StoreError::NotFound { .. } => message(StatusCode::NOT_FOUND, "Not Found"),
        StoreError::Conflict { .. } if sha_given => {
            message(StatusCode::CONFLICT, "does not match")
        }
        StoreError::Conflict { .. } => {
            message(StatusCode::UNPROCESSABLE_ENTITY, "\"sha\" wasn't supplied")
        }
        error => message(StatusCode::INTERNAL_SERVER_ERROR, &error.to_string()),
    }
}

async fn user(State(state): State<Arc<FakeState>>, headers: HeaderMap) -> Response {
    if let Some(rejection) = gate(&state, &headers) {
        return rejection;
    }

    Json(json!({
        "login": OWNER,
        "name": "Alice Liddell",
        "avatar_url": "https://avatars.example.com/alice",
        "html_url": "https://github.com/alice",
        "public_repos": 3,
    }))
    .into_response()
}

async fn repository(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Path((owner, repo)): Path<(String, String)>,
) -> Response {
    if let Some(rejection) = gate(&state, &headers) {
        return rejection;
    }

    Json(json!({
        "name": repo,
        "description": "Hexo blog",
        "html_url": format!("https://github.com/{owner}/{repo}"),
    }))
    .into_response()
}

async fn runs(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Some(rejection) = gate(&state, &headers) {
        return rejection;
    }

    let runs = state.runs.lock().unwrap().clone();
    let per_page = query
        .get("per_page")
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(30);
    let page = query
        .get("page")
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(1);
    let slice = runs
        .iter()
        .skip((page.saturating_sub(1)) * per_page)
        .take(per_page)
        .cloned()
        .collect::<Vec<_>>();

    Json(json!({ "total_count": runs.len(), "workflow_runs": slice })).into_response()
}

async fn read_contents(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Path((_, _, path)): Path<(String, String, String)>,
) -> Response {
    if let Some(rejection) = gate(&state, &headers) {
        return rejection;
    }

    match state.files.read(&path).await {
        Ok(file) if file.content.len() > CONTENTS_SIZE_LIMIT => Json(json!({
            "type": "file",
            "name": file_name(&path),
            "path": path,
            "sha": file.sha,
            "size": file.content.len(),
            "encoding": "none",
            "content": "",
        }))
        .into_response(),
        Ok(file) => Json(json!({
            "type": "file",
            "name": file_name(&path),
            "path": path,
            "sha": file.sha,
            "size": file.content.len(),
            "encoding": "base64",
            "content": wrapped_base64(file.content.as_bytes()),
        }))
        .into_response(),
        Err(StoreError::NotAFile { .. }) => match state.files.list(&path).await {
            Ok(entries) => Json(entries).into_response(),
            Err(error) => store_failure(error, false),
        },
        Err(error) => store_failure(error, false),
    }
}

async fn read_blob(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Path((_, _, sha)): Path<(String, String, String)>,
) -> Response {
    if let Some(rejection) = gate(&state, &headers) {
        return rejection;
    }

    for path in state.files.paths() {
        let Ok(file) = state.files.read(&path).await else {
            continue;
        };
        if file.sha == sha {
            return Json(json!({
                "sha": sha,
                "size": file.content.len(),
                "encoding": "base64",
                "content": wrapped_base64(file.content.as_bytes()),
            }))
            .into_response();
        }
    }

    message(StatusCode::NOT_FOUND, "Not Found")
}

async fn write_contents(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Path((_, _, path)): Path<(String, String, String)>,
    Json(body): Json<PutBody>,
) -> Response {
    if let Some(rejection) = gate(&state, &headers) {
        return rejection;
    }

    let Ok(content) = STANDARD.decode(&body.content) else {
        return message(StatusCode::UNPROCESSABLE_ENTITY, "content is not valid Base64");
    };

    match state
        .files
        .write(&path, &content, body.sha.as_deref(), &body.message)
        .await
    {
        Ok(receipt) => {
            let status = if body.sha.is_some() {
                StatusCode::OK
            } else {
                StatusCode::CREATED
            };
            let content = json!({ "path": receipt.path, "sha": receipt.sha });
            (status, Json(json!({ "content": content }))).into_response()
        }
        Err(error) => store_failure(error, body.sha.is_some()),
    }
}

async fn delete_contents(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Path((_, _, path)): Path<(String, String, String)>,
    Json(body): Json<DeleteBody>,
) -> Response {
    if let Some(rejection) = gate(&state, &headers) {
        return rejection;
    }

    match state.files.remove(&path, &body.sha, &body.message).await {
        Ok(()) => Json(json!({ "content": null })).into_response(),
        Err(error) => store_failure(error, true),
    }
}
