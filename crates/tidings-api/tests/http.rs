use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::util::ServiceExt;

use tidings_api::artifacts::DiskArtifactStore;
use tidings_api::{AppStateInner, Settings, router};
use tidings_crypto::CredentialHasher;
use tidings_db::Database;

const BOUNDARY: &str = "tidings-test-boundary";

struct TestApp {
    app: Router,
    _uploads: TempDir,
}

async fn spawn_app() -> TestApp {
    let uploads = tempfile::tempdir().unwrap();
    let artifacts = DiskArtifactStore::new(uploads.path().to_path_buf(), "http://api.test")
        .await
        .unwrap();

    let state = Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        hasher: CredentialHasher::with_params(8, 1, 1).unwrap(),
        artifacts: Arc::new(artifacts),
        jwt_secret: "integration-secret".to_string(),
        settings: Settings {
            frontend_url: "http://cards.test".to_string(),
            ..Settings::default()
        },
    });

    TestApp {
        app: router(state),
        _uploads: uploads,
    }
}

impl TestApp {
    async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Login link issued and redeemed; returns the session JWT.
    async fn sign_in(&self, email: &str) -> String {
        let (status, body) = self
            .post_json("/auth/add-user", json!({ "email": email }))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let raw = last_segment(body["url"].as_str().unwrap());

        let (status, body) = self.get(&format!("/auth/magic/{raw}")).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    async fn create(&self, session: Option<&str>, form: Multipart) -> (StatusCode, Value) {
        let mut req = Request::post("/messages").header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
        if let Some(token) = session {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(req.body(Body::from(form.finish())).unwrap()).await
    }
}

fn last_segment(url: &str) -> String {
    url.rsplit('/').next().unwrap().to_string()
}

#[derive(Default)]
struct Multipart {
    body: Vec<u8>,
}

impl Multipart {
    fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    fn file(mut self, file_name: &str, content_type: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    fn finish(mut self) -> Vec<u8> {
        self.body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }
}

fn card(kind: &str) -> Multipart {
    Multipart::default()
        .text("recipientFirstName", "Ana")
        .text("recipientLastName", "Lee")
        .text("password", "pw123")
        .text("hint", "our dog")
        .text("theme", "snow")
        .text("type", kind)
        .text("senderId", "ignored")
}

#[tokio::test]
async fn health_is_ok() {
    let app = spawn_app().await;
    let resp = app
        .app
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_link_is_single_use() {
    let app = spawn_app().await;

    let (status, body) = app
        .post_json("/auth/add-user", json!({ "email": "  U1@Example.com ", "name": "U1" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let url = body["url"].as_str().unwrap();
    assert!(url.starts_with("http://cards.test/auth/magic/"));
    let user_id = body["userId"].as_str().unwrap().to_string();

    // Same address, same account.
    let (_, again) = app
        .post_json("/auth/add-user", json!({ "email": "u1@example.com" }))
        .await;
    assert_eq!(again["userId"].as_str().unwrap(), user_id);

    let raw = last_segment(url);
    let (status, body) = app.get(&format!("/auth/magic/{raw}")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].as_str().is_some());

    let (status, body) = app.get(&format!("/auth/magic/{raw}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Invalid or expired token");
}

#[tokio::test]
async fn login_link_needs_an_email() {
    let app = spawn_app().await;
    let (status, body) = app.post_json("/auth/add-user", json!({ "name": "U1" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn creating_a_message_requires_a_session() {
    let app = spawn_app().await;

    let (status, _) = app.create(None, card("text").text("text", "Hi")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .create(Some("not-a-jwt"), card("text").text("text", "Hi"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid token");
}

#[tokio::test]
async fn text_message_lifecycle() {
    let app = spawn_app().await;
    let sender = app.sign_in("u1@example.com").await;

    let (status, body) = app
        .create(Some(&sender), card("text").text("text", "Happy Holidays"))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let slug = body["slug"].as_str().unwrap().to_string();

    let (status, body) = app.get(&format!("/messages/{slug}/exists")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["exists"], true);
    assert_eq!(body["passwordHint"], "our dog");

    let (_, body) = app.get("/messages/zzzzzzz/exists").await;
    assert_eq!(body["exists"], false);
    assert!(body.get("passwordHint").is_none());

    let opener = |password: &str| json!({ "firstName": "Ana", "lastName": "Lee", "password": password });

    let (status, body) = app
        .post_json(&format!("/messages/{slug}/open"), opener("nope"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.get("data").is_none());

    let (status, body) = app
        .post_json(&format!("/messages/{slug}/open"), opener("pw123"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["text"], "Happy Holidays");
    assert_eq!(body["data"]["type"], "text");
    assert!(body["data"].get("password_hash").is_none());

    let (status, _) = app
        .post_json("/messages/zzzzzzz/open", opener("pw123"))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .post_json(
            &format!("/messages/{slug}/open"),
            json!({ "firstName": "", "lastName": "Lee", "password": "pw123" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post_json(
            &format!("/messages/{slug}/reply"),
            json!({ "firstName": "Ana", "lastName": "Lee", "replyText": "Thank you!" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // Text cards have nothing to download.
    let (status, _) = app
        .get(&format!("/messages/{slug}/download?firstName=Ana&lastName=Lee"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.get(&format!("/messages/{slug}/analytics")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["opens"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["downloads"].as_array().unwrap().len(), 0);
    assert_eq!(body["data"]["replies"][0]["reply_text"], "Thank you!");
}

#[tokio::test]
async fn invalid_create_requests_are_rejected() {
    let app = spawn_app().await;
    let sender = app.sign_in("u1@example.com").await;

    let (status, _) = app.create(Some(&sender), card("text")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.create(Some(&sender), card("video")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Video type requires a file upload");

    let (status, _) = app
        .create(Some(&sender), card("hologram").text("text", "Hi"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn video_download_redirects_to_artifact() {
    let app = spawn_app().await;
    let sender = app.sign_in("u1@example.com").await;

    let (status, body) = app
        .create(
            Some(&sender),
            card("video").file("card.mp4", "video/mp4", b"fake video bytes"),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let slug = body["slug"].as_str().unwrap().to_string();

    let (status, _) = app.get(&format!("/messages/{slug}/download")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let resp = app
        .app
        .clone()
        .oneshot(
            Request::get(format!("/messages/{slug}/download?firstName=Ana&lastName=Lee"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = resp.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with("http://api.test/uploads/"));
    assert!(location.ends_with(".mp4"));

    let (_, body) = app.get(&format!("/messages/{slug}/analytics")).await;
    assert_eq!(body["data"]["downloads"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["downloads"][0]["first_name"], "Ana");
}

#[tokio::test]
async fn share_links_are_sender_only_and_single_use() {
    let app = spawn_app().await;
    let sender = app.sign_in("u1@example.com").await;
    let stranger = app.sign_in("u2@example.com").await;

    let (_, body) = app
        .create(Some(&sender), card("text").text("text", "Happy Holidays"))
        .await;
    let slug = body["slug"].as_str().unwrap().to_string();

    let mint = |token: &str| {
        Request::post(format!("/messages/{slug}/magic"))
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    };

    let (status, _) = app.send(mint(&stranger)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.send(mint(&sender)).await;
    assert_eq!(status, StatusCode::CREATED);
    let url = body["url"].as_str().unwrap();
    assert!(url.starts_with("http://cards.test/magic/"));
    let raw = last_segment(url);

    // A share token is not a login token.
    let (status, _) = app.get(&format!("/auth/magic/{raw}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.get(&format!("/messages/magic/{raw}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["slug"], slug.as_str());
    assert_eq!(body["data"]["text"], "Happy Holidays");

    let (status, _) = app.get(&format!("/messages/magic/{raw}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = app.get(&format!("/messages/{slug}/analytics")).await;
    let opens = body["data"]["opens"].as_array().unwrap();
    assert_eq!(opens.len(), 1);
    assert_eq!(opens[0]["first_name"], "MagicLink");
    assert_eq!(opens[0]["last_name"], "User");
}

#[tokio::test]
async fn download_of_unknown_slug_is_not_found_even_without_names() {
    let app = spawn_app().await;
    let (status, body) = app.get("/messages/zzzzzzz/download").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Message not found");
}

#[tokio::test]
async fn malformed_bodies_get_the_standard_error_shape() {
    let app = spawn_app().await;
    let sender = app.sign_in("u1@example.com").await;

    let (status, body) = app
        .send(
            Request::post("/auth/add-user")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    // Missing content type.
    let (status, body) = app
        .send(
            Request::post("/messages/zzzzzzz/open")
                .body(Body::from(r#"{"firstName":"Ana"}"#))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = app
        .send(
            Request::post("/messages")
                .header(header::AUTHORIZATION, format!("Bearer {sender}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().is_some());
}
