// tests/common/mod.rs

#![allow(dead_code)]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use serde_json::{Value, json};
use studymate::{
    config::Config,
    routes,
    services::notification::{MulticastReport, PushError, PushGateway, PushMessage},
    state::AppState,
    store::MemoryStore,
};

/// Push gateway that records every call and can be told to fail.
#[derive(Default)]
pub struct RecordingGateway {
    pub sent: Mutex<Vec<(Vec<String>, String)>>,
    pub fail: AtomicBool,
}

impl RecordingGateway {
    fn record(&self, tokens: Vec<String>, message: &PushMessage) -> Result<(), PushError> {
        self.sent.lock().unwrap().push((tokens, message.title.clone()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(PushError::Rejected {
                status: 503,
                body: "gateway unavailable".to_string(),
            });
        }
        Ok(())
    }

    pub fn recipients(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .flat_map(|(tokens, _)| tokens.clone())
            .collect()
    }
}

#[async_trait]
impl PushGateway for RecordingGateway {
    async fn send(&self, token: &str, message: &PushMessage) -> Result<(), PushError> {
        self.record(vec![token.to_string()], message)
    }

    async fn send_multicast(
        &self,
        tokens: &[String],
        message: &PushMessage,
    ) -> Result<MulticastReport, PushError> {
        self.record(tokens.to_vec(), message)?;
        Ok(MulticastReport {
            success: tokens.len(),
            failure: 0,
        })
    }
}

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    pub gateway: Arc<RecordingGateway>,
}

/// Spawns the app on a random port, backed by a fresh in-memory store.
pub async fn spawn_app() -> TestApp {
    let gateway = Arc::new(RecordingGateway::default());
    let config = Config::for_testing("test_secret_for_integration_tests");
    let state = AppState::new(Arc::new(MemoryStore::new()), gateway.clone(), config);
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        client: reqwest::Client::new(),
        gateway,
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Registers and logs in a user. Returns (token, user id).
    pub async fn user(&self, username: &str) -> (String, i64) {
        let registered: Value = self
            .client
            .post(self.url("/api/auth/register"))
            .json(&json!({ "username": username, "password": "password123" }))
            .send()
            .await
            .expect("Register failed")
            .json()
            .await
            .unwrap();
        let user_id = registered["user"]["id"].as_i64().expect("user id");

        let login: Value = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "username": username, "password": "password123" }))
            .send()
            .await
            .expect("Login failed")
            .json()
            .await
            .unwrap();
        let token = login["token"].as_str().expect("Token not found").to_string();

        (token, user_id)
    }

    pub async fn create_group(&self, token: &str, name: &str) -> i64 {
        let resp: Value = self
            .client
            .post(self.url("/api/groups"))
            .bearer_auth(token)
            .json(&json!({ "name": name }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        resp["group"]["id"].as_i64().expect("group id")
    }

    pub async fn add_member(&self, admin_token: &str, group_id: i64, user_id: i64, role: &str) {
        let resp = self
            .client
            .post(self.url(&format!("/api/groups/{}/members", group_id)))
            .bearer_auth(admin_token)
            .json(&json!({ "userId": user_id, "role": role }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 201);
    }

    /// Creates a quiz and returns (quiz id, question ids in order).
    pub async fn create_quiz(&self, token: &str, group_id: i64, body: Value) -> (i64, Vec<i64>) {
        let resp = self
            .client
            .post(self.url(&format!("/api/groups/{}/quiz", group_id)))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 201);

        let created: Value = resp.json().await.unwrap();
        let quiz_id = created["quiz"]["id"].as_i64().expect("quiz id");
        let question_ids = created["quiz"]["questions"]
            .as_array()
            .expect("questions")
            .iter()
            .map(|q| q["id"].as_i64().unwrap())
            .collect();
        (quiz_id, question_ids)
    }

    pub async fn submit(
        &self,
        token: &str,
        group_id: i64,
        quiz_id: i64,
        answers: Value,
    ) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/api/groups/{}/quiz/{}/submit", group_id, quiz_id)))
            .bearer_auth(token)
            .json(&json!({ "answers": answers }))
            .send()
            .await
            .unwrap()
    }

    pub async fn get(&self, token: &str, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }
}

/// Two multiple-choice questions worth 5 points each: Q1 -> "B", Q2 -> "C".
pub fn two_question_quiz() -> Value {
    json!({
        "title": "Cell Biology",
        "description": "Chapter 3",
        "timeLimit": 15,
        "questions": [
            { "questionText": "Q1", "type": "multiple_choice", "options": ["A", "B", "C"], "correctAnswer": "B", "points": 5 },
            { "questionText": "Q2", "type": "multiple_choice", "options": ["A", "B", "C"], "correctAnswer": "C", "points": 5 }
        ]
    })
}
