mod common;

use chrono::Duration;
use common::{completion_body, error_body, StubProvider};
use resume_builder::core::config_manager::AiSettings;
use resume_builder::web::ServerConfig;
use resume_builder::{build_rocket, AiClient, AppState, AuthConfig, Database, ResumeExporter};
use rocket::http::{ContentType, Header, Method, Status};
use rocket::local::asynchronous::{Client, LocalResponse};
use serde_json::{json, Value};
use tempfile::TempDir;

struct TestApp {
    _dir: TempDir,
    client: Client,
    auth: AuthConfig,
}

impl TestApp {
    async fn new() -> Self {
        Self::with_ai(ai_client("http://127.0.0.1:9/v1", None)).await
    }

    async fn with_provider(provider: &StubProvider) -> Self {
        Self::with_ai(ai_client(&provider.base_url, Some("test-key"))).await
    }

    async fn with_ai(ai: AiClient) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let database = Database::new(&dir.path().join("api.db")).await.unwrap();
        let auth = AuthConfig::new("integration-secret");

        let exporter = ResumeExporter::new(dir.path().join("out"))
            .with_typst_binary("typst-not-installed-here");

        let state = AppState {
            database,
            auth: auth.clone(),
            ai,
            exporter,
            server: ServerConfig {
                max_resumes_per_user: 3,
            },
        };

        let figment = rocket::Config::figment().merge(("log_level", "off"));
        let client = Client::tracked(build_rocket(figment, state)).await.unwrap();

        Self {
            _dir: dir,
            client,
            auth,
        }
    }

    fn bearer(&self, user: &str) -> Header<'static> {
        let token = self
            .auth
            .issue_token(user, &format!("{}@example.com", user), Duration::hours(1))
            .unwrap();
        Header::new("Authorization", format!("Bearer {}", token))
    }
}

fn ai_client(base_url: &str, api_key: Option<&str>) -> AiClient {
    AiClient::new(&AiSettings {
        base_url: base_url.to_string(),
        model: "test-model".to_string(),
        api_key: api_key.map(str::to_string),
        timeout_seconds: 5,
        temperature: 0.5,
        max_tokens: 50,
    })
    .unwrap()
    .with_retry_base_delay(std::time::Duration::from_millis(5))
}

async fn json_body(response: LocalResponse<'_>) -> Value {
    response.into_json::<Value>().await.unwrap()
}

fn sample_resume() -> Value {
    json!({
        "title": "Backend roles",
        "templateId": 2,
        "data": {
            "personal": { "name": "Jane Doe", "email": "jane@example.com", "title": "Engineer" },
            "experience": [
                { "employer": "Acme", "role": "Developer", "startDate": "2020-01", "current": true,
                  "description": "- Built the API\n- Cut latency" }
            ],
            "education": [ { "school": "MIT", "degree": "BSc", "major": "CS" } ],
            "skills": "Rust, SQL, rust"
        }
    })
}

async fn create_resume(app: &TestApp, auth: Header<'static>) -> Value {
    let response = app
        .client
        .post("/api/resumes")
        .header(ContentType::JSON)
        .header(auth)
        .body(sample_resume().to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    json_body(response).await
}

#[rocket::async_test]
async fn health_and_templates_need_no_token() {
    let app = TestApp::new().await;

    let response = app.client.get("/api/health").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let body = json_body(response).await;
    assert_eq!(body["type"], "data");
    assert_eq!(body["data"]["database"], "ok");
    assert_eq!(body["data"]["aiConfigured"], false);

    let response = app.client.get("/api/templates").dispatch().await;
    let body = json_body(response).await;
    let ids: Vec<i64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(body["data"][0]["name"], "Modern");
}

#[rocket::async_test]
async fn api_index_is_a_text_response() {
    let app = TestApp::new().await;

    let response = app.client.get("/api").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let body = json_body(response).await;
    assert_eq!(body["type"], "text");
    assert_eq!(body["success"], true);
    assert!(body["message"].as_str().unwrap().contains("Resume builder API"));
}

#[rocket::async_test]
async fn accounts_without_distinct_emails_can_sign_in() {
    let app = TestApp::new().await;

    for user in ["phone-user-1", "phone-user-2", "phone-user-1"] {
        let token = app
            .auth
            .issue_token(user, "", Duration::hours(1))
            .unwrap();
        let response = app
            .client
            .get("/api/me")
            .header(Header::new("Authorization", format!("Bearer {}", token)))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(json_body(response).await["data"]["id"], user);
    }

    // An address moved to another account
    for user in ["first-owner", "second-owner"] {
        let token = app
            .auth
            .issue_token(user, "shared@example.com", Duration::hours(1))
            .unwrap();
        let response = app
            .client
            .get("/api/me")
            .header(Header::new("Authorization", format!("Bearer {}", token)))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
    }
}

#[rocket::async_test]
async fn mixed_spellings_and_nulls_are_accepted() {
    let app = TestApp::new().await;

    let response = app
        .client
        .post("/api/resumes")
        .header(ContentType::JSON)
        .header(app.bearer("ivy"))
        .body(
            json!({
                "data": {
                    "personalInfo": { "fullName": "Ivy", "name": "Ivy", "phone": null },
                    "workExperience": null,
                    "education": [{ "institution": "MIT", "school": "Other" }],
                    "skills": null
                }
            })
            .to_string(),
        )
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let body = json_body(response).await;
    assert_eq!(body["data"]["data"]["personalInfo"]["fullName"], "Ivy");
    assert_eq!(body["data"]["data"]["personalInfo"]["phone"], "");
    assert_eq!(body["data"]["data"]["workExperience"], json!([]));
    assert_eq!(body["data"]["data"]["education"][0]["institution"], "MIT");
}

#[rocket::async_test]
async fn auth_failures_carry_error_codes() {
    let app = TestApp::new().await;

    let response = app.client.get("/api/resumes").dispatch().await;
    assert_eq!(response.status(), Status::Unauthorized);
    assert_eq!(json_body(response).await["error_code"], "MISSING_TOKEN");

    let response = app
        .client
        .get("/api/resumes")
        .header(Header::new("Authorization", "Token abc"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Unauthorized);
    assert_eq!(json_body(response).await["error_code"], "INVALID_TOKEN");

    let forged = AuthConfig::new("wrong-secret")
        .issue_token("mallory", "m@example.com", Duration::hours(1))
        .unwrap();
    let response = app
        .client
        .get("/api/me")
        .header(Header::new("Authorization", format!("Bearer {}", forged)))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Unauthorized);
    let body = json_body(response).await;
    assert_eq!(body["error_code"], "TOKEN_VERIFICATION_FAILED");
    assert_eq!(body["type"], "error");
    assert_eq!(body["success"], false);
}

#[rocket::async_test]
async fn resume_crud_flow() {
    let app = TestApp::new().await;

    let created = create_resume(&app, app.bearer("alice")).await;
    let resume = &created["data"];
    let id = resume["id"].as_str().unwrap().to_string();
    assert_eq!(resume["title"], "Backend roles");
    assert_eq!(resume["templateId"], 2);
    assert_eq!(resume["data"]["personalInfo"]["fullName"], "Jane Doe");
    assert_eq!(resume["data"]["workExperience"][0]["company"], "Acme");
    assert_eq!(resume["data"]["education"][0]["fieldOfStudy"], "CS");
    assert_eq!(resume["data"]["skills"], json!(["Rust", "SQL"]));
    assert_eq!(resume["completeness"], 100);
    assert_eq!(resume["issues"], json!([]));

    let response = app
        .client
        .get("/api/resumes")
        .header(app.bearer("alice"))
        .dispatch()
        .await;
    let list = json_body(response).await;
    assert_eq!(list["data"].as_array().unwrap().len(), 1);
    assert_eq!(list["data"][0]["id"], id.as_str());

    let response = app
        .client
        .put(format!("/api/resumes/{}", id))
        .header(ContentType::JSON)
        .header(app.bearer("alice"))
        .body(json!({ "title": "Renamed", "templateId": 3 }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let updated = json_body(response).await;
    assert_eq!(updated["data"]["title"], "Renamed");
    assert_eq!(updated["data"]["templateId"], 3);
    assert_eq!(updated["data"]["data"]["personalInfo"]["fullName"], "Jane Doe");

    let response = app
        .client
        .get(format!("/api/resumes/{}", id))
        .header(app.bearer("alice"))
        .dispatch()
        .await;
    assert_eq!(json_body(response).await["data"]["title"], "Renamed");

    let response = app
        .client
        .delete(format!("/api/resumes/{}", id))
        .header(app.bearer("alice"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(json_body(response).await["action"], "deleted");

    let response = app
        .client
        .delete(format!("/api/resumes/{}", id))
        .header(app.bearer("alice"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::NotFound);
    assert_eq!(json_body(response).await["error_code"], "RESUME_NOT_FOUND");
}

#[rocket::async_test]
async fn resumes_are_private_to_their_owner() {
    let app = TestApp::new().await;
    let created = create_resume(&app, app.bearer("alice")).await;
    let id = created["data"]["id"].as_str().unwrap().to_string();

    for response in [
        app.client
            .get(format!("/api/resumes/{}", id))
            .header(app.bearer("bob"))
            .dispatch()
            .await,
        app.client
            .delete(format!("/api/resumes/{}", id))
            .header(app.bearer("bob"))
            .dispatch()
            .await,
    ] {
        assert_eq!(response.status(), Status::NotFound);
    }

    let response = app
        .client
        .get("/api/resumes")
        .header(app.bearer("bob"))
        .dispatch()
        .await;
    assert_eq!(json_body(response).await["data"], json!([]));
}

#[rocket::async_test]
async fn save_rejects_bad_template_and_enforces_limit() {
    let app = TestApp::new().await;

    let response = app
        .client
        .post("/api/resumes")
        .header(ContentType::JSON)
        .header(app.bearer("carol"))
        .body(json!({ "templateId": 7, "data": {} }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);
    assert_eq!(json_body(response).await["error_code"], "INVALID_TEMPLATE");

    for _ in 0..3 {
        create_resume(&app, app.bearer("carol")).await;
    }
    let response = app
        .client
        .post("/api/resumes")
        .header(ContentType::JSON)
        .header(app.bearer("carol"))
        .body(sample_resume().to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Conflict);
    assert_eq!(json_body(response).await["error_code"], "RESUME_LIMIT_REACHED");
}

#[rocket::async_test]
async fn untitled_draft_reports_issues() {
    let app = TestApp::new().await;

    let response = app
        .client
        .post("/api/resumes")
        .header(ContentType::JSON)
        .header(app.bearer("dave"))
        .body(json!({ "data": { "personalInfo": { "email": "nope" } } }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let body = json_body(response).await;
    assert_eq!(body["data"]["title"], "Untitled Resume");
    assert_eq!(body["data"]["templateId"], 1);
    assert_eq!(body["data"]["completeness"], 0);

    let fields: Vec<&str> = body["data"]["issues"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["personalInfo.fullName", "personalInfo.email"]);
}

#[rocket::async_test]
async fn rendered_template_and_preview() {
    let app = TestApp::new().await;
    let created = create_resume(&app, app.bearer("erin")).await;
    let id = created["data"]["id"].as_str().unwrap().to_string();

    let response = app
        .client
        .get(format!("/api/resumes/{}/template?print=true", id))
        .header(app.bearer("erin"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(response.content_type(), Some(ContentType::HTML));
    let html = response.into_string().await.unwrap();
    assert!(html.contains("template-classic"));
    assert!(html.contains("window.print()"));
    assert!(html.contains("<li>Built the API</li>"));

    let response = app
        .client
        .get(format!("/api/resumes/{}/template?template=minimal", id))
        .header(app.bearer("erin"))
        .dispatch()
        .await;
    let html = response.into_string().await.unwrap();
    assert!(html.contains("template-minimal"));
    assert!(!html.contains("window.print()"));

    let response = app
        .client
        .get(format!("/api/resumes/{}/template?template=42", id))
        .header(app.bearer("erin"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);
    assert_eq!(json_body(response).await["error_code"], "INVALID_TEMPLATE");

    let response = app
        .client
        .post("/api/preview?template=1")
        .header(ContentType::JSON)
        .header(app.bearer("erin"))
        .body(json!({ "data": { "personalInfo": { "fullName": "<b>Unsaved</b>" } } }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let html = response.into_string().await.unwrap();
    assert!(html.contains("&lt;b&gt;Unsaved&lt;/b&gt;"));
    assert!(html.contains("template-modern"));
}

#[rocket::async_test]
async fn downloads_in_each_format() {
    let app = TestApp::new().await;
    let created = create_resume(&app, app.bearer("frank")).await;
    let id = created["data"]["id"].as_str().unwrap().to_string();

    let response = app
        .client
        .get(format!("/api/resumes/{}/download", id))
        .header(app.bearer("frank"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let disposition = response
        .headers()
        .get_one("Content-Disposition")
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"Jane_Doe_Resume_"));
    assert!(disposition.ends_with(".html\""));

    let response = app
        .client
        .get(format!("/api/resumes/{}/download?format=json", id))
        .header(app.bearer("frank"))
        .dispatch()
        .await;
    assert_eq!(response.content_type(), Some(ContentType::JSON));
    let exported = json_body(response).await;
    assert_eq!(exported["personalInfo"]["fullName"], "Jane Doe");

    let response = app
        .client
        .get(format!("/api/resumes/{}/download?format=toml", id))
        .header(app.bearer("frank"))
        .dispatch()
        .await;
    let toml_text = response.into_string().await.unwrap();
    assert!(toml_text.contains("fullName = \"Jane Doe\""));

    let response = app
        .client
        .get(format!("/api/resumes/{}/download?format=pdf", id))
        .header(app.bearer("frank"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::ServiceUnavailable);
    assert_eq!(json_body(response).await["error_code"], "PDF_UNAVAILABLE");

    let response = app
        .client
        .get(format!("/api/resumes/{}/download?format=docx", id))
        .header(app.bearer("frank"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);
    assert_eq!(json_body(response).await["error_code"], "INVALID_FORMAT");
}

#[rocket::async_test]
async fn generate_reports_configuration_and_context_errors() {
    let app = TestApp::new().await;

    let response = app
        .client
        .post("/api/generate")
        .header(ContentType::JSON)
        .header(app.bearer("gina"))
        .body(json!({ "type": "summary", "context": { "jobTitle": "Engineer" } }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::ServiceUnavailable);
    assert_eq!(json_body(response).await["error_code"], "AI_NOT_CONFIGURED");

    let response = app
        .client
        .post("/api/generate")
        .header(ContentType::JSON)
        .header(app.bearer("gina"))
        .body(json!({ "type": "experience", "context": {} }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);
    assert_eq!(json_body(response).await["error_code"], "MISSING_CONTEXT");

    let response = app
        .client
        .post("/api/generate")
        .header(ContentType::JSON)
        .header(app.bearer("gina"))
        .body(json!({ "type": "poem" }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::UnprocessableEntity);
    assert_eq!(json_body(response).await["error_code"], "UNPROCESSABLE_ENTITY");
}

#[rocket::async_test]
async fn generate_returns_skill_items_from_provider() {
    let provider = StubProvider::start(
        200,
        completion_body("Skills:\n1. Rust\n2. SQL\n- rust\n- Kubernetes"),
    )
    .await;
    let app = TestApp::with_provider(&provider).await;

    let response = app
        .client
        .post("/api/generate")
        .header(ContentType::JSON)
        .header(app.bearer("kim"))
        .body(json!({ "type": "skills", "context": { "jobTitle": "Backend Engineer" } }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let body = json_body(response).await;
    assert_eq!(body["data"]["type"], "skills");
    assert_eq!(body["data"]["items"], json!(["Rust", "SQL", "Kubernetes"]));
    assert_eq!(body["data"]["model"], "stub-model-2024");
    assert_eq!(provider.hits(), 1);
}

#[rocket::async_test]
async fn generate_maps_provider_failure_to_bad_gateway() {
    let provider = StubProvider::start(503, error_body("maintenance")).await;
    let app = TestApp::with_provider(&provider).await;

    let response = app
        .client
        .post("/api/generate")
        .header(ContentType::JSON)
        .header(app.bearer("kim"))
        .body(json!({ "type": "improve", "context": { "text": "did stuff" } }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadGateway);
    let body = json_body(response).await;
    assert_eq!(body["type"], "error");
    assert_eq!(body["error_code"], "AI_UPSTREAM_ERROR");
    assert_eq!(provider.hits(), 3);
}

#[rocket::async_test]
async fn sign_out_revokes_the_session() {
    let app = TestApp::new().await;
    let auth = app.bearer("henry");

    let response = app.client.get("/api/me").header(auth.clone()).dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let me = json_body(response).await;
    assert_eq!(me["data"]["email"], "henry@example.com");
    assert_eq!(me["data"]["resumeCount"], 0);

    let response = app
        .client
        .post("/api/auth/signout")
        .header(auth.clone())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(json_body(response).await["action"], "signed_out");

    let response = app.client.get("/api/me").header(auth).dispatch().await;
    assert_eq!(response.status(), Status::Unauthorized);
    assert_eq!(json_body(response).await["error_code"], "SESSION_REVOKED");

    // A fresh sign-in gets a new session
    let response = app
        .client
        .get("/api/me")
        .header(app.bearer("henry"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
}

#[rocket::async_test]
async fn preflight_and_unknown_routes() {
    let app = TestApp::new().await;

    let response = app
        .client
        .req(Method::Options, "/api/resumes")
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(
        response.headers().get_one("Access-Control-Allow-Origin"),
        Some("*")
    );

    let response = app.client.get("/api/nothing-here").dispatch().await;
    assert_eq!(response.status(), Status::NotFound);
    assert_eq!(json_body(response).await["error_code"], "NOT_FOUND");
}
