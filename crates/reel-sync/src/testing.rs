//! Scripted transport and fixtures shared by the unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use reel_core::{MediaFormat, MediaItem};
use reel_db::{Database, DbConfig};
use serde_json::{json, Value};

use crate::config::SyncSettings;
use crate::engine::SyncEngine;
use crate::error::RemoteError;
use crate::remote::{HttpRequest, HttpResponse, HttpTransport, RemoteClient, RetryPolicy};

pub enum Reply {
    Respond(HttpResponse),
    Fail(RemoteError),
    /// Never answers; used to exercise cancellation.
    Hang,
}

/// Replays a fixed list of replies in order and records every request.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(ScriptedTransport {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Query documents sent so far, in order.
    pub fn queries(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| {
                let body: Value = serde_json::from_str(&r.body).unwrap();
                body["query"].as_str().unwrap_or_default().to_string()
            })
            .collect()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl HttpTransport for ScriptedTransport {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse, RemoteError> {
        self.requests.lock().unwrap().push(request);
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Fail(err)) => Err(err),
            Some(Reply::Hang) => std::future::pending().await,
            None => Err(RemoteError::Network("script exhausted".into())),
        }
    }
}

pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_millis(1),
        multiplier: 2.0,
        max_delay: Duration::from_millis(5),
    }
}

pub fn raw(status: u16, body: &str) -> Reply {
    Reply::Respond(HttpResponse {
        status,
        retry_after: None,
        body: body.to_string(),
    })
}

pub fn ok(data: Value) -> Reply {
    raw(200, &json!({ "data": data }).to_string())
}

pub fn graphql_errors(status: u16, errors: Value) -> Reply {
    raw(status, &json!({ "data": null, "errors": errors }).to_string())
}

pub fn rate_limited() -> Reply {
    Reply::Respond(HttpResponse {
        status: 429,
        retry_after: None,
        body: json!({ "errors": [{ "message": "Too Many Requests.", "status": 429 }] }).to_string(),
    })
}

pub fn network_down() -> Reply {
    Reply::Fail(RemoteError::Network("connection refused".into()))
}

pub fn viewer(id: i64) -> Reply {
    ok(json!({ "Viewer": { "id": id, "name": "tester" } }))
}

pub fn saved(remote_id: i64) -> Reply {
    ok(json!({ "SaveMediaListEntry": { "id": remote_id, "status": null, "progress": null } }))
}

pub fn media_json(id: i64, episodes: Option<u32>) -> Value {
    json!({
        "id": id,
        "title": { "romaji": format!("Show {id}"), "english": null, "native": null },
        "coverImage": null,
        "episodes": episodes,
        "format": "TV",
        "genres": ["Drama"],
        "description": null,
        "siteUrl": null,
        "updatedAt": null
    })
}

pub fn list_entry_json(remote_id: i64, media_id: i64, status: &str, progress: u32, updated_at: i64) -> Value {
    json!({
        "id": remote_id,
        "mediaId": media_id,
        "status": status,
        "progress": progress,
        "score": 0,
        "updatedAt": updated_at,
        "media": media_json(media_id, Some(24))
    })
}

pub fn list_page(entries: Vec<Value>, has_next_page: bool) -> Reply {
    ok(json!({
        "Page": {
            "pageInfo": { "hasNextPage": has_next_page },
            "mediaList": entries
        }
    }))
}

pub fn list_collection(groups: Vec<Vec<Value>>) -> Reply {
    let lists: Vec<Value> = groups
        .into_iter()
        .map(|entries| json!({ "entries": entries }))
        .collect();
    ok(json!({ "MediaListCollection": { "lists": lists } }))
}

pub fn found_entry(remote_id: i64) -> Reply {
    ok(json!({ "MediaList": { "id": remote_id } }))
}

pub fn deleted() -> Reply {
    ok(json!({ "DeleteMediaListEntry": { "deleted": true } }))
}

pub fn not_found() -> Reply {
    graphql_errors(404, json!([{ "message": "Not Found.", "status": 404 }]))
}

pub fn media(id: i64, episodes: Option<u32>) -> MediaItem {
    MediaItem {
        id,
        title_romaji: format!("Show {id}"),
        title_english: None,
        title_native: None,
        cover_image_large: None,
        cover_image_medium: None,
        episodes,
        format: Some(MediaFormat::Tv),
        genres: vec!["Drama".to_string()],
        synopsis: None,
        site_url: None,
        updated_at: Utc::now(),
    }
}

/// In-memory database plus an engine wired to a scripted transport.
pub async fn engine(
    replies: Vec<Reply>,
    settings: SyncSettings,
) -> (Arc<Database>, Arc<ScriptedTransport>, Arc<SyncEngine>) {
    let db = Arc::new(Database::new(DbConfig::in_memory()).await.unwrap());
    let transport = ScriptedTransport::new(replies);
    let remote = RemoteClient::new(
        "https://remote.test/graphql",
        transport.clone(),
        Arc::new(|| Some("token".to_string())),
        fast_policy(),
    );
    let engine = Arc::new(SyncEngine::new(db.clone(), remote, settings));
    (db, transport, engine)
}

/// Polls `check` until it holds or a second has passed.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
