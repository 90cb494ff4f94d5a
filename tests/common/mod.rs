use std::sync::Arc;

use chrono::Utc;
use serde_json::{Value, json};
use tempfile::TempDir;
use uuid::Uuid;

use zettelkit::auth::PasswordService;
use zettelkit::config::ServerConfig;
use zettelkit::server::bootstrap::create_personal_space;
use zettelkit::server::{AppState, create_router};
use zettelkit::store::{SqliteStore, Store};
use zettelkit::types::{GlobalRole, User};

pub const TEST_PASSWORD: &str = "test-password-1";

/// An in-process server bound to an ephemeral port, with direct store access
/// for seeding.
pub struct TestApp {
    pub base_url: String,
    pub store: Arc<dyn Store>,
    pub passwords: PasswordService,
    _temp_dir: TempDir,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            data_dir: temp_dir.path().to_path_buf(),
            session_ttl_days: 30,
        };

        let store: Arc<dyn Store> =
            Arc::new(SqliteStore::new(config.db_path()).expect("open store"));
        store.initialize().expect("initialize schema");

        let state = Arc::new(AppState {
            store: store.clone(),
            config,
            passwords: PasswordService::new(),
        });
        let router = create_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve");
        });

        Self {
            base_url: format!("http://{addr}"),
            store,
            passwords: PasswordService::new(),
            _temp_dir: temp_dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1{path}", self.base_url)
    }

    /// Registers a user over the API and returns a client logged in as them.
    pub async fn register_and_login(&self, username: &str) -> reqwest::Client {
        let client = new_client();
        let res = client
            .post(self.url("/auth/register"))
            .json(&json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": TEST_PASSWORD,
            }))
            .send()
            .await
            .expect("register");
        assert_eq!(res.status(), 201, "register {username}");
        self.login(&client, username).await;
        client
    }

    pub async fn login(&self, client: &reqwest::Client, username: &str) {
        let res = client
            .post(self.url("/auth/login"))
            .json(&json!({ "username": username, "password": TEST_PASSWORD }))
            .send()
            .await
            .expect("login");
        assert_eq!(res.status(), 200, "login {username}");
    }

    /// Seeds a site admin directly in the store and returns a logged-in
    /// client.
    pub async fn admin_client(&self, username: &str) -> reqwest::Client {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password_hash: self.passwords.hash(TEST_PASSWORD).expect("hash"),
            global_role: GlobalRole::Admin,
            active: true,
            preferences: None,
            created_at: now,
            updated_at: now,
        };
        self.store.create_user(&user).expect("create admin");
        create_personal_space(self.store.as_ref(), &user).expect("personal space");

        let client = new_client();
        self.login(&client, username).await;
        client
    }
}

pub fn new_client() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .expect("build client")
}

pub async fn body(res: reqwest::Response) -> Value {
    res.json().await.expect("json body")
}

/// Unwraps the `data` field of a successful response envelope.
pub async fn data(res: reqwest::Response) -> Value {
    let body = body(res).await;
    assert!(
        body["error"].is_null(),
        "unexpected error: {}",
        body["error"]
    );
    body["data"].clone()
}
