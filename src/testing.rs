//! Test doubles shared by the unit tests.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::api::{Request, Response, Transport, TransportError};
use crate::core::preferences::{Language, ResolvedTheme};
use crate::lock;
use crate::ui::{Notice, Notifier, Presentation};

struct Scripted {
    method: Method,
    path: String,
    /// Only answer requests carrying this query pair.
    query: Option<(String, String)>,
    delay: Option<Duration>,
    response: Result<Response, TransportError>,
}

/// Transport answering from a script of canned responses, each used once.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<Request>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, entry: Scripted) {
        lock(&self.script).push_back(entry);
    }

    pub fn respond(&self, method: Method, path: &str, status: u16, body: Value) {
        self.respond_raw(method, path, status, body.to_string().into_bytes());
    }

    pub fn respond_raw(&self, method: Method, path: &str, status: u16, body: Vec<u8>) {
        self.push(Scripted {
            method,
            path: path.to_string(),
            query: None,
            delay: None,
            response: Ok(Response { status, body }),
        });
    }

    /// Answer the request whose query contains `key=value`, after `delay`.
    pub fn respond_matching(
        &self,
        method: Method,
        path: &str,
        (key, value): (&str, &str),
        delay: Duration,
        body: Value,
    ) {
        self.push(Scripted {
            method,
            path: path.to_string(),
            query: Some((key.to_string(), value.to_string())),
            delay: Some(delay),
            response: Ok(Response {
                status: 200,
                body: body.to_string().into_bytes(),
            }),
        });
    }

    pub fn fail(&self, method: Method, path: &str, message: &str) {
        self.push(Scripted {
            method,
            path: path.to_string(),
            query: None,
            delay: None,
            response: Err(TransportError(message.to_string())),
        });
    }

    pub fn requests(&self) -> Vec<Request> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        let entry = {
            let mut script = lock(&self.script);
            let position = script.iter().position(|s| {
                s.method == request.method
                    && s.path == request.path
                    && s.query
                        .as_ref()
                        .is_none_or(|(k, v)| request.query_value(k) == Some(v.as_str()))
            });
            position.and_then(|i| script.remove(i))
        };
        lock(&self.requests).push(request);

        match entry {
            Some(entry) => {
                if let Some(delay) = entry.delay {
                    tokio::time::sleep(delay).await;
                }
                entry.response
            }
            None => Ok(Response {
                status: 404,
                body: br#"{"message":"no scripted response"}"#.to_vec(),
            }),
        }
    }
}

/// Successful envelope around `data`.
pub(crate) fn envelope(data: Value) -> Value {
    json!({"success": true, "message": "ok", "data": data})
}

pub(crate) fn page_of(items: Vec<Value>, page: u32, size: u32, total: u64) -> Value {
    envelope(json!({
        "items": items,
        "total": total,
        "page": page,
        "size": size,
        "pages": total.div_ceil(u64::from(size)),
    }))
}

pub(crate) fn task_json(id: i64, title: &str, status: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "status": status,
        "priority": "medium",
        "createdAt": "2026-01-10T09:00:00Z",
        "updatedAt": "2026-01-10T09:00:00Z",
        "userId": 1,
        "isArchived": false,
    })
}

pub(crate) fn notification_json(id: i64, kind: &str, read: bool, created_at: &str) -> Value {
    json!({
        "id": id,
        "type": kind,
        "title": format!("Notification {}", id),
        "message": "body",
        "isRead": read,
        "createdAt": created_at,
        "userId": 1,
    })
}

pub(crate) fn user_json(id: i64, username: &str) -> Value {
    json!({
        "id": id,
        "username": username,
        "email": format!("{}@example.com", username),
        "isActive": true,
        "createdAt": "2026-01-01T00:00:00Z",
        "updatedAt": "2026-01-01T00:00:00Z",
    })
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn notices(&self) -> Vec<Notice> {
        lock(&self.notices).clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.notices().into_iter().map(|n| n.message).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        lock(&self.notices).push(notice);
    }
}

#[derive(Default)]
pub(crate) struct RecordingPresentation {
    pub themes: Mutex<Vec<ResolvedTheme>>,
    pub languages: Mutex<Vec<Language>>,
    pub titles: Mutex<Vec<String>>,
    pub routes: Mutex<Vec<String>>,
}

impl RecordingPresentation {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn last_theme(&self) -> Option<ResolvedTheme> {
        lock(&self.themes).last().copied()
    }

    pub fn routes(&self) -> Vec<String> {
        lock(&self.routes).clone()
    }
}

impl Presentation for RecordingPresentation {
    fn apply_theme(&self, theme: ResolvedTheme) {
        lock(&self.themes).push(theme);
    }

    fn apply_language(&self, language: Language) {
        lock(&self.languages).push(language);
    }

    fn set_title(&self, title: &str) {
        lock(&self.titles).push(title.to_string());
    }

    fn navigate(&self, route: &str) {
        lock(&self.routes).push(route.to_string());
    }
}
