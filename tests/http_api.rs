//! End-to-end tests through the HTTP dispatcher
//!
//! Each test builds the full service stack over in-memory stores, a recording
//! mailer and a temporary files directory, then drives it with requests.

use bytes::Bytes;
use clap::Parser;
use http_body_util::BodyExt;
use hyper::{Method, Request, StatusCode};
use quire::auth::{hash_password, JwtValidator, Role, TokenInput};
use quire::db::{AccountStatus, Stores, UserDoc};
use quire::logging::AuditLogger;
use quire::services::{Context, FileStore, RecordingMailer, Settings};
use quire::{dispatch, AppState, Args};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

const PASSWORD: &str = "correct-horse-battery";

struct TestApp {
    state: AppState,
    mailer: Arc<RecordingMailer>,
    _files: TempDir,
}

async fn test_app() -> TestApp {
    let files = TempDir::new().unwrap();
    let args = Args::parse_from(["quire", "--dev-mode", "--max-json-bytes", "4096"]);
    let mailer = Arc::new(RecordingMailer::new());
    let ctx = Context {
        stores: Stores::memory(),
        mailer: mailer.clone(),
        files: FileStore::new(files.path()).await.unwrap(),
        audit: AuditLogger::new(),
        jwt: Arc::new(JwtValidator::new_dev()),
        settings: Settings::default(),
    };
    TestApp {
        state: AppState::new(args, ctx),
        mailer,
        _files: files,
    }
}

impl TestApp {
    /// Insert an active user and return a session token for them
    async fn user(&self, user_id: &str, role: Role) -> String {
        let doc = UserDoc::new(
            user_id,
            format!("User {}", user_id),
            format!("{}@uni.edu", user_id.to_lowercase()),
            hash_password(PASSWORD).unwrap(),
            role,
            AccountStatus::Active,
        );
        self.state.ctx.stores.users.insert(doc).await.unwrap();
        self.state
            .ctx
            .jwt
            .generate_token(TokenInput {
                user_id: user_id.to_string(),
                name: format!("User {}", user_id),
                role,
            })
            .unwrap()
    }

    async fn send(&self, req: Request<Bytes>) -> (StatusCode, Value) {
        let response = dispatch(&self.state, req).await;
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn call(&self, method: Method, path: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let body = body.map(|b| Bytes::from(b.to_string())).unwrap_or_default();
        self.send(builder.body(body).unwrap()).await
    }

    async fn submit_report(&self, thesis_id: i64, stage: &str, token: &str) -> (StatusCode, Value) {
        let body = format!(
            "--B0und\r\n\
             Content-Disposition: form-data; name=\"stage\"\r\n\r\n\
             {stage}\r\n\
             --B0und\r\n\
             Content-Disposition: form-data; name=\"report\"; filename=\"{stage}.pdf\"\r\n\
             Content-Type: application/pdf\r\n\r\n\
             %PDF-1.7 report {stage}\r\n\
             --B0und--\r\n"
        );
        let req = Request::builder()
            .method(Method::PUT)
            .uri(format!("/thesis_progress/{}", thesis_id))
            .header("content-type", "multipart/form-data; boundary=B0und")
            .header("authorization", format!("Bearer {}", token))
            .body(Bytes::from(body))
            .unwrap();
        self.send(req).await
    }
}

#[tokio::test]
async fn test_thesis_scenario_end_to_end() {
    let app = test_app().await;
    let s1 = app.user("S1", Role::Student).await;
    app.user("S2", Role::Student).await;
    app.user("S3", Role::Student).await;
    let f1 = app.user("F1", Role::Faculty).await;

    let (status, group) = app
        .call(Method::POST, "/groups", Some(&s1), Some(json!({ "members": ["S1", "S2", "S3"] })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(group["id"], 1);

    let (status, outcome) = app
        .call(
            Method::POST,
            "/thesis/register",
            Some(&s1),
            Some(json!({
                "group_id": 1,
                "supervisor_id": "F1",
                "topic": "Federated learning on campus devices",
                "abstract": "Privacy-preserving training"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(outcome["thesis"]["thesis_id"], 1);
    assert_eq!(outcome["email_sent"], true);
    assert_eq!(app.mailer.sent().await.len(), 1);

    let (status, lookup) = app.call(Method::GET, "/groups/student/S2", Some(&s1), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(lookup["registered"], true);

    let (status, thesis) = app.submit_report(1, "P1", &s1).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(thesis["progress"], 1);
    let report = thesis["reports"]["P1"].as_str().unwrap().to_string();
    assert!(report.starts_with("/files/thesis_progress/"));

    let (status, error) = app.submit_report(1, "P3", &s1).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "WORKFLOW");
    let (_, progress) = app.call(Method::GET, "/thesis_progress/1", Some(&s1), None).await;
    assert_eq!(progress["progress"], 1);

    let (status, _) = app
        .call(Method::PUT, "/thesis_defer", Some(&s1), Some(json!({ "thesis_id": 1 })))
        .await;
    assert_eq!(status, StatusCode::OK);

    let decision = json!({ "thesis_id": 1, "decision": "approve" });
    let (status, _) = app
        .call(Method::PUT, "/thesis_defer/decision", Some(&s1), Some(decision.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, thesis) = app
        .call(Method::PUT, "/thesis_defer/decision", Some(&f1), Some(decision))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(thesis["defer_status"], "approved");

    // Uploaded reports are served back
    let req = Request::builder().uri(report.as_str()).body(Bytes::new()).unwrap();
    let response = dispatch(&app.state, req).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/pdf");

    // A registered group is frozen
    let (status, _) = app.call(Method::DELETE, "/groups/1", Some(&s1), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_correction_flow() {
    let app = test_app().await;
    let s1 = app.user("S1", Role::Student).await;
    app.user("S2", Role::Student).await;
    app.user("S3", Role::Student).await;
    let f1 = app.user("F1", Role::Faculty).await;
    let admin = app.user("A1", Role::Admin).await;

    app.call(Method::POST, "/groups", Some(&admin), Some(json!({ "members": ["S1", "S2", "S3"] })))
        .await;
    app.call(
        Method::POST,
        "/thesis/register",
        Some(&admin),
        Some(json!({ "group_id": 1, "supervisor_id": "F1", "topic": "Old", "abstract": "Old abstract" })),
    )
    .await;

    let update = json!({ "topic": "New topic", "abstract": "New abstract" });
    let (status, _) = app
        .call(Method::PUT, "/thesis_correction/1", Some(&s1), Some(update.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .call(Method::PUT, "/thesis_correction/request", Some(&s1), Some(json!({ "thesis_id": 1 })))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .call(
            Method::PUT,
            "/thesis_correction/approve",
            Some(&f1),
            Some(json!({ "thesis_id": 1, "approve": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.call(Method::PUT, "/thesis_correction/1", Some(&s1), Some(update)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, detail) = app.call(Method::GET, "/thesis/1", Some(&s1), None).await;
    assert_eq!(detail["updated_topic"], 1);
    assert_eq!(detail["correction_approved"], false);
    assert_eq!(detail["topic"], "New topic");
    assert_eq!(detail["abstract"], "New abstract");
    assert_eq!(detail["students"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_proposal_approval_is_exclusive() {
    let app = test_app().await;
    let admin = app.user("A1", Role::Admin).await;
    let s1 = app.user("S1", Role::Student).await;
    let f1 = app.user("F1", Role::Faculty).await;
    let f2 = app.user("F2", Role::Faculty).await;

    let (status, _) = app
        .call(Method::POST, "/domainlist", Some(&admin), Some(json!({ "domain_subject": "Networks" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, proposal) = app
        .call(
            Method::POST,
            "/students/propose",
            Some(&s1),
            Some(json!({ "domain": "networks", "idea": "Campus mesh routing" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(proposal["status"], "Pending");
    assert_eq!(proposal["domain"], "Networks");
    let path = format!("/students/propose/status/{}", proposal["id"].as_str().unwrap());

    let (status, approved) = app
        .call(Method::POST, &path, Some(&f1), Some(json!({ "status": "Approved" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["updated_by"]["faculty_id"], "F1");

    let (status, error) = app
        .call(Method::POST, &path, Some(&f2), Some(json!({ "status": "Rejected" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["code"], "CONFLICT");

    let (status, rejected) = app
        .call(Method::POST, &path, Some(&f1), Some(json!({ "status": "Rejected" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected["status"], "Rejected");

    let (_, visible) = app.call(Method::GET, "/students/propose", Some(&f2), None).await;
    assert_eq!(visible.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_accounts_over_http() {
    let app = test_app().await;

    let (status, profile) = app
        .call(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({
                "name": "Nadia",
                "user_id": "22101001",
                "mail": "nadia@g.bracu.ac.bd",
                "password": PASSWORD
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(profile["role"], "Student");

    let (status, _) = app
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "identifier": "22101001", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, session) = app
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "identifier": "nadia@g.bracu.ac.bd", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = session["token"].as_str().unwrap().to_string();

    let (status, me) = app.call(Method::GET, "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["user_id"], "22101001");

    let (status, _) = app
        .call(Method::POST, "/auth/forgot", None, Some(json!({ "identifier": "22101001" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    let sent = app.mailer.sent().await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].text.contains("/reset-password?token="));
}

#[tokio::test]
async fn test_account_changes_apply_to_live_sessions() {
    let app = test_app().await;
    let admin = app.user("A1", Role::Admin).await;
    let demoted = app.user("A2", Role::Admin).await;
    let f1 = app.user("F1", Role::Faculty).await;

    let (status, _) = app.call(Method::GET, "/thesis", Some(&f1), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .call(
            Method::PUT,
            "/approvals/F1",
            Some(&admin),
            Some(json!({ "role": "Faculty", "active": false })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, error) = app.call(Method::GET, "/thesis", Some(&f1), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error["code"], "FORBIDDEN");
    let (status, _) = app
        .call(Method::POST, "/synopsis", Some(&f1), Some(json!({ "topic": "Edge caching", "open": true })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (_, listed) = app.call(Method::GET, "/synopsis", Some(&admin), None).await;
    assert_eq!(listed.as_array().map(Vec::len), Some(0));

    let (status, _) = app
        .call(Method::PUT, "/approvals/A2", Some(&admin), Some(json!({ "role": "Student" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.call(Method::GET, "/approvals", Some(&demoted), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    app.state.ctx.stores.users.delete(&"A2".to_string()).await.unwrap();
    let (status, _) = app.call(Method::GET, "/auth/me", Some(&demoted), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_guards_and_errors() {
    let app = test_app().await;
    let s1 = app.user("S1", Role::Student).await;

    let (status, error) = app.call(Method::GET, "/groups", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error["code"], "UNAUTHORIZED");

    let (status, _) = app.call(Method::GET, "/groups", Some("not-a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, error) = app.call(Method::POST, "/groups", Some(&s1), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "VALIDATION");

    let (status, _) = app.call(Method::GET, "/nowhere", Some(&s1), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, health) = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["store"], "memory");

    let (status, version) = app.call(Method::GET, "/version", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(version["service"], "quire");
    assert!(!version["revision"].as_str().unwrap().is_empty());

    let (status, _) = app.call(Method::OPTIONS, "/thesis/register", None, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.call(Method::GET, "/files/secrets/passwd", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
