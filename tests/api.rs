mod common;

use chrono::{Duration, Utc};
use serde_json::{Value, json};
use uuid::Uuid;

use common::{TEST_PASSWORD, TestApp, data, new_client};
use zettelkit::auth::generate_key;
use zettelkit::types::ApiKey;

async fn me(app: &TestApp, client: &reqwest::Client) -> Value {
    let res = client.get(app.url("/auth/me")).send().await.expect("me");
    assert_eq!(res.status(), 200);
    data(res).await
}

async fn create_space(app: &TestApp, client: &reqwest::Client, name: &str) -> Value {
    let res = client
        .post(app.url("/spaces"))
        .json(&json!({ "name": name }))
        .send()
        .await
        .expect("create space");
    assert_eq!(res.status(), 201, "create space {name}");
    data(res).await
}

async fn create_document(
    app: &TestApp,
    client: &reqwest::Client,
    space_id: &str,
    name: &str,
    parent_id: Option<&str>,
) -> Value {
    let mut req = json!({ "space_id": space_id, "name": name });
    if let Some(parent_id) = parent_id {
        req["parent_id"] = json!(parent_id);
    }
    let res = client
        .post(app.url("/documents"))
        .json(&req)
        .send()
        .await
        .expect("create document");
    assert_eq!(res.status(), 201, "create document {name}");
    data(res).await
}

fn ids(list: &Value) -> Vec<&str> {
    list.as_array()
        .expect("array")
        .iter()
        .map(|v| v["id"].as_str().expect("id"))
        .collect()
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::spawn().await;
    let res = reqwest::get(format!("{}/health", app.base_url))
        .await
        .expect("health");
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.expect("body"), "OK");
}

#[tokio::test]
async fn test_register_login_logout() {
    let app = TestApp::spawn().await;
    let client = new_client();

    let res = client
        .post(app.url("/auth/register"))
        .json(&json!({
            "username": "alice",
            "email": "alice@example.com",
            "password": TEST_PASSWORD,
        }))
        .send()
        .await
        .expect("register");
    assert_eq!(res.status(), 201);
    let user = data(res).await;
    assert_eq!(user["username"], "alice");
    assert!(user.get("password_hash").is_none(), "hash must not leak");

    // Registration does not log the user in.
    let res = client.get(app.url("/auth/me")).send().await.expect("me");
    assert_eq!(res.status(), 401);

    // Duplicate username and malformed input are rejected up front.
    let res = client
        .post(app.url("/auth/register"))
        .json(&json!({
            "username": "alice",
            "email": "other@example.com",
            "password": TEST_PASSWORD,
        }))
        .send()
        .await
        .expect("register dup");
    assert_eq!(res.status(), 409);
    let res = client
        .post(app.url("/auth/register"))
        .json(&json!({
            "username": "bob",
            "email": "not-an-email",
            "password": TEST_PASSWORD,
        }))
        .send()
        .await
        .expect("register bad email");
    assert_eq!(res.status(), 400);

    let res = client
        .post(app.url("/auth/login"))
        .json(&json!({ "username": "alice", "password": "wrong-password" }))
        .send()
        .await
        .expect("bad login");
    assert_eq!(res.status(), 401);

    app.login(&client, "alice").await;
    let user = me(&app, &client).await;
    assert_eq!(user["username"], "alice");

    let res = client
        .post(app.url("/auth/logout"))
        .send()
        .await
        .expect("logout");
    assert_eq!(res.status(), 204);
    let res = client.get(app.url("/auth/me")).send().await.expect("me");
    assert_eq!(res.status(), 401);
}

#[tokio::test]
async fn test_registration_seeds_personal_space() {
    let app = TestApp::spawn().await;
    let client = app.register_and_login("alice").await;

    let res = client.get(app.url("/spaces")).send().await.expect("spaces");
    let spaces = data(res).await;
    let spaces = spaces.as_array().expect("array");
    assert_eq!(spaces.len(), 1);
    assert_eq!(spaces[0]["name"], "alice's Space");
    assert_eq!(spaces[0]["slug"], "alice");
    assert_eq!(spaces[0]["space_type"], "personal");

    // Space is resolvable by slug as well as id.
    let res = client
        .get(app.url("/spaces/alice"))
        .send()
        .await
        .expect("get by slug");
    assert_eq!(res.status(), 200);
    assert_eq!(data(res).await["id"], spaces[0]["id"]);
}

#[tokio::test]
async fn test_preferences_and_password_change() {
    let app = TestApp::spawn().await;
    let client = app.register_and_login("alice").await;

    let res = client
        .put(app.url("/users/me/preferences"))
        .json(&json!({ "preferences": { "theme": "dark" } }))
        .send()
        .await
        .expect("set preferences");
    assert_eq!(res.status(), 200);
    assert_eq!(data(res).await["preferences"]["theme"], "dark");

    let res = client
        .put(app.url("/users/me/password"))
        .json(&json!({
            "current_password": "wrong-password",
            "new_password": "brand-new-pass-1",
        }))
        .send()
        .await
        .expect("bad password change");
    assert_eq!(res.status(), 403);

    let res = client
        .put(app.url("/users/me/password"))
        .json(&json!({
            "current_password": TEST_PASSWORD,
            "new_password": "brand-new-pass-1",
        }))
        .send()
        .await
        .expect("password change");
    assert_eq!(res.status(), 204);

    let fresh = new_client();
    let res = fresh
        .post(app.url("/auth/login"))
        .json(&json!({ "username": "alice", "password": "brand-new-pass-1" }))
        .send()
        .await
        .expect("login with new password");
    assert_eq!(res.status(), 200);
}

#[tokio::test]
async fn test_api_key_lifecycle() {
    let app = TestApp::spawn().await;
    let client = app.register_and_login("alice").await;
    let alice = me(&app, &client).await;

    let res = client
        .post(app.url("/apikeys"))
        .json(&json!({ "name": "ci" }))
        .send()
        .await
        .expect("create key");
    assert_eq!(res.status(), 201);
    let created = data(res).await;
    let raw_key = created["key"].as_str().expect("raw key").to_string();
    let key_id = created["metadata"]["id"].as_str().expect("key id").to_string();
    assert!(raw_key.starts_with("zk_"));
    assert!(raw_key.starts_with(created["metadata"]["prefix"].as_str().unwrap()));

    // Bearer auth works without any cookies.
    let bare = reqwest::Client::new();
    let res = bare
        .get(app.url("/auth/me"))
        .bearer_auth(&raw_key)
        .send()
        .await
        .expect("bearer me");
    assert_eq!(res.status(), 200);
    assert_eq!(data(res).await["username"], "alice");

    let res = client.get(app.url("/apikeys")).send().await.expect("list");
    let keys = data(res).await;
    assert_eq!(keys.as_array().expect("array").len(), 1);
    assert!(keys[0].get("key_hash").is_none(), "hash must not leak");

    // An expired key authenticates nothing.
    let (expired_raw, prefix, hash) = generate_key();
    app.store
        .create_api_key(&ApiKey {
            id: Uuid::new_v4().to_string(),
            user_id: alice["id"].as_str().unwrap().to_string(),
            name: "expired".to_string(),
            key_hash: hash,
            prefix,
            scopes: Vec::new(),
            created_at: Utc::now(),
            expires_at: Some(Utc::now() - Duration::days(1)),
            last_used_at: None,
        })
        .expect("seed expired key");
    let res = bare
        .get(app.url("/auth/me"))
        .bearer_auth(&expired_raw)
        .send()
        .await
        .expect("expired bearer");
    assert_eq!(res.status(), 401);

    let res = client
        .delete(app.url(&format!("/apikeys/{key_id}")))
        .send()
        .await
        .expect("delete key");
    assert_eq!(res.status(), 204);
    let res = bare
        .get(app.url("/auth/me"))
        .bearer_auth(&raw_key)
        .send()
        .await
        .expect("revoked bearer");
    assert_eq!(res.status(), 401);
}

#[tokio::test]
async fn test_admin_user_management() {
    let app = TestApp::spawn().await;
    let admin = app.admin_client("root").await;
    let alice = app.register_and_login("alice").await;

    // Only admins reach the admin surface.
    let res = alice
        .get(app.url("/admin/users"))
        .send()
        .await
        .expect("non-admin list");
    assert_eq!(res.status(), 403);

    // Creating without a password returns a generated one, once.
    let res = admin
        .post(app.url("/admin/users"))
        .json(&json!({ "username": "bob", "email": "bob@example.com" }))
        .send()
        .await
        .expect("create user");
    assert_eq!(res.status(), 201);
    let created = data(res).await;
    let bob_id = created["user"]["id"].as_str().expect("id").to_string();
    let bob_password = created["password"].as_str().expect("password").to_string();
    assert_eq!(created["user"]["global_role"], "user");

    let bob = new_client();
    let res = bob
        .post(app.url("/auth/login"))
        .json(&json!({ "username": "bob", "password": bob_password }))
        .send()
        .await
        .expect("bob login");
    assert_eq!(res.status(), 200);

    // Deactivation locks the account out of login.
    let res = admin
        .patch(app.url(&format!("/admin/users/{bob_id}")))
        .json(&json!({ "active": false }))
        .send()
        .await
        .expect("deactivate");
    assert_eq!(res.status(), 200);
    let res = new_client()
        .post(app.url("/auth/login"))
        .json(&json!({ "username": "bob", "password": bob_password }))
        .send()
        .await
        .expect("inactive login");
    assert_eq!(res.status(), 403);

    let res = admin
        .get(app.url("/admin/users"))
        .send()
        .await
        .expect("list users");
    let body: Value = res.json().await.expect("json");
    assert!(body["data"].as_array().expect("array").len() >= 3);
    assert_eq!(body["has_more"], false);

    let res = admin
        .delete(app.url(&format!("/admin/users/{bob_id}")))
        .send()
        .await
        .expect("delete user");
    assert_eq!(res.status(), 204);
    let res = admin
        .get(app.url(&format!("/admin/users/{bob_id}")))
        .send()
        .await
        .expect("get deleted");
    assert_eq!(res.status(), 404);
}

#[tokio::test]
async fn test_groups() {
    let app = TestApp::spawn().await;
    let alice = app.register_and_login("alice").await;
    let bob = app.register_and_login("bob").await;
    let bob_id = me(&app, &bob).await["id"].as_str().unwrap().to_string();

    let res = alice
        .post(app.url("/groups"))
        .json(&json!({ "name": "Designers" }))
        .send()
        .await
        .expect("create group");
    assert_eq!(res.status(), 201);
    let group = data(res).await;
    let group_id = group["id"].as_str().unwrap().to_string();
    assert_eq!(group["global_role"], "user");

    // The creator starts as a member.
    let res = alice
        .get(app.url(&format!("/groups/{group_id}/members")))
        .send()
        .await
        .expect("members");
    assert_eq!(data(res).await.as_array().expect("array").len(), 1);

    let res = alice
        .post(app.url("/groups"))
        .json(&json!({ "name": "Designers" }))
        .send()
        .await
        .expect("dup group");
    assert_eq!(res.status(), 409);

    // Privileged groups are admin-only.
    let res = alice
        .post(app.url("/groups"))
        .json(&json!({ "name": "Ops", "global_role": "admin" }))
        .send()
        .await
        .expect("privileged group");
    assert_eq!(res.status(), 403);

    // Only the owner manages membership.
    let res = bob
        .post(app.url(&format!("/groups/{group_id}/members")))
        .json(&json!({ "user_id": bob_id }))
        .send()
        .await
        .expect("bob add self");
    assert_eq!(res.status(), 403);

    let res = alice
        .post(app.url(&format!("/groups/{group_id}/members")))
        .json(&json!({ "user_id": bob_id }))
        .send()
        .await
        .expect("add bob");
    assert_eq!(res.status(), 204);
    let res = alice
        .get(app.url(&format!("/groups/{group_id}/members")))
        .send()
        .await
        .expect("members");
    assert_eq!(data(res).await.as_array().expect("array").len(), 2);

    let res = alice
        .delete(app.url(&format!("/groups/{group_id}/members/{bob_id}")))
        .send()
        .await
        .expect("remove bob");
    assert_eq!(res.status(), 204);
    let res = alice
        .delete(app.url(&format!("/groups/{group_id}/members/{bob_id}")))
        .send()
        .await
        .expect("remove bob again");
    assert_eq!(res.status(), 404);

    let res = alice
        .delete(app.url(&format!("/groups/{group_id}")))
        .send()
        .await
        .expect("delete group");
    assert_eq!(res.status(), 204);
}

#[tokio::test]
async fn test_space_slugs_and_lifecycle() {
    let app = TestApp::spawn().await;
    let client = app.register_and_login("alice").await;

    let first = create_space(&app, &client, "Project X").await;
    assert_eq!(first["slug"], "project-x");
    let second = create_space(&app, &client, "Project X").await;
    assert_eq!(second["slug"], "project-x-2");

    // Renaming keeps the slug stable.
    let space_id = first["id"].as_str().unwrap();
    let res = client
        .patch(app.url(&format!("/spaces/{space_id}")))
        .json(&json!({ "name": "Project Y", "icon": "rocket" }))
        .send()
        .await
        .expect("update space");
    assert_eq!(res.status(), 200);
    let updated = data(res).await;
    assert_eq!(updated["name"], "Project Y");
    assert_eq!(updated["slug"], "project-x");
    assert_eq!(updated["icon"], "rocket");

    let res = client
        .delete(app.url(&format!("/spaces/{space_id}")))
        .send()
        .await
        .expect("delete space");
    assert_eq!(res.status(), 204);
    let res = client
        .get(app.url(&format!("/spaces/{space_id}")))
        .send()
        .await
        .expect("get deleted space");
    assert_eq!(res.status(), 404);

    let res = client.get(app.url("/spaces")).send().await.expect("list");
    let names: Vec<String> = data(res)
        .await
        .as_array()
        .expect("array")
        .iter()
        .map(|s| s["name"].as_str().unwrap().to_string())
        .collect();
    assert!(!names.contains(&"Project Y".to_string()));
}

#[tokio::test]
async fn test_denied_overrides_all_other_grants() {
    let app = TestApp::spawn().await;
    let admin = app.admin_client("root").await;
    let bob = app.register_and_login("bob").await;
    let bob_id = me(&app, &bob).await["id"].as_str().unwrap().to_string();

    let res = admin
        .post(app.url("/spaces"))
        .json(&json!({ "name": "Vault", "space_type": "restricted" }))
        .send()
        .await
        .expect("create restricted space");
    let space = data(res).await;
    let space_id = space["id"].as_str().unwrap();
    let doc = create_document(&app, &admin, space_id, "Secret plan", None).await;
    let doc_id = doc["id"].as_str().unwrap();

    // No grant on a restricted space means no access at all.
    let res = bob
        .get(app.url(&format!("/documents/{doc_id}")))
        .send()
        .await
        .expect("bob read");
    assert_eq!(res.status(), 403);

    let res = admin
        .post(app.url(&format!("/documents/{doc_id}/permissions")))
        .json(&json!({ "user_id": bob_id, "role": "viewer" }))
        .send()
        .await
        .expect("grant viewer");
    assert_eq!(res.status(), 201);

    let res = bob
        .get(app.url(&format!("/documents/{doc_id}")))
        .send()
        .await
        .expect("bob read as viewer");
    assert_eq!(res.status(), 200);
    let res = bob
        .patch(app.url(&format!("/documents/{doc_id}")))
        .json(&json!({ "name": "Hijacked" }))
        .send()
        .await
        .expect("bob write as viewer");
    assert_eq!(res.status(), 403);

    // Denied wins over everything, including a later space-type change.
    let res = admin
        .post(app.url(&format!("/documents/{doc_id}/permissions")))
        .json(&json!({ "user_id": bob_id, "role": "denied" }))
        .send()
        .await
        .expect("grant denied");
    assert_eq!(res.status(), 201);
    let res = admin
        .patch(app.url(&format!("/spaces/{space_id}")))
        .json(&json!({ "space_type": "public" }))
        .send()
        .await
        .expect("make space public");
    assert_eq!(res.status(), 200);
    let res = bob
        .get(app.url(&format!("/documents/{doc_id}")))
        .send()
        .await
        .expect("bob read while denied");
    assert_eq!(res.status(), 403);

    // Spaces themselves never take a denied grant.
    let res = admin
        .post(app.url(&format!("/spaces/{space_id}/permissions")))
        .json(&json!({ "user_id": bob_id, "role": "denied" }))
        .send()
        .await
        .expect("denied on space");
    assert_eq!(res.status(), 400);
}

#[tokio::test]
async fn test_group_grants_flow_through_resources() {
    let app = TestApp::spawn().await;
    let admin = app.admin_client("root").await;
    let bob = app.register_and_login("bob").await;
    let bob_id = me(&app, &bob).await["id"].as_str().unwrap().to_string();

    let res = admin
        .post(app.url("/spaces"))
        .json(&json!({ "name": "Shared", "space_type": "restricted" }))
        .send()
        .await
        .expect("create space");
    let space_id = data(res).await["id"].as_str().unwrap().to_string();

    let res = admin
        .post(app.url("/groups"))
        .json(&json!({ "name": "Crew" }))
        .send()
        .await
        .expect("create group");
    let group_id = data(res).await["id"].as_str().unwrap().to_string();
    let res = admin
        .post(app.url(&format!("/groups/{group_id}/members")))
        .json(&json!({ "user_id": bob_id }))
        .send()
        .await
        .expect("add bob");
    assert_eq!(res.status(), 204);

    let res = admin
        .post(app.url(&format!("/spaces/{space_id}/permissions")))
        .json(&json!({ "group_id": group_id, "role": "editor" }))
        .send()
        .await
        .expect("grant group editor");
    assert_eq!(res.status(), 201);

    // Bob edits through the group grant alone.
    let doc = create_document(&app, &bob, &space_id, "Crew notes", None).await;

    // A personal denied on the document shuts bob out despite the group.
    let doc_id = doc["id"].as_str().unwrap();
    let res = admin
        .post(app.url(&format!("/documents/{doc_id}/permissions")))
        .json(&json!({ "user_id": bob_id, "role": "denied" }))
        .send()
        .await
        .expect("deny bob");
    assert_eq!(res.status(), 201);
    let res = bob
        .get(app.url(&format!("/documents/{doc_id}")))
        .send()
        .await
        .expect("bob read denied");
    assert_eq!(res.status(), 403);

    // Revoking the denied grant restores the group path.
    let res = admin
        .delete(app.url(&format!("/documents/{doc_id}/permissions")))
        .query(&[("user_id", bob_id.as_str())])
        .send()
        .await
        .expect("revoke denied");
    assert_eq!(res.status(), 204);
    let res = bob
        .get(app.url(&format!("/documents/{doc_id}")))
        .send()
        .await
        .expect("bob read again");
    assert_eq!(res.status(), 200);
}

#[tokio::test]
async fn test_space_owner_grant_is_protected() {
    let app = TestApp::spawn().await;
    let alice = app.register_and_login("alice").await;
    let bob = app.register_and_login("bob").await;
    let alice_id = me(&app, &alice).await["id"].as_str().unwrap().to_string();
    let bob_id = me(&app, &bob).await["id"].as_str().unwrap().to_string();

    let res = alice.get(app.url("/spaces")).send().await.expect("spaces");
    let personal_id = data(res).await[0]["id"].as_str().unwrap().to_string();

    let res = alice
        .post(app.url(&format!("/spaces/{personal_id}/permissions")))
        .json(&json!({ "user_id": bob_id, "role": "admin" }))
        .send()
        .await
        .expect("grant bob admin");
    assert_eq!(res.status(), 201);

    // Even a space admin cannot strip or demote the owner on a personal
    // space.
    let res = bob
        .delete(app.url(&format!("/spaces/{personal_id}/permissions")))
        .query(&[("user_id", alice_id.as_str())])
        .send()
        .await
        .expect("revoke owner");
    assert_eq!(res.status(), 409);
    let res = bob
        .post(app.url(&format!("/spaces/{personal_id}/permissions")))
        .json(&json!({ "user_id": alice_id, "role": "viewer" }))
        .send()
        .await
        .expect("demote owner");
    assert_eq!(res.status(), 409);

    // Re-asserting owner is a no-op and allowed.
    let res = bob
        .post(app.url(&format!("/spaces/{personal_id}/permissions")))
        .json(&json!({ "user_id": alice_id, "role": "owner" }))
        .send()
        .await
        .expect("re-grant owner");
    assert_eq!(res.status(), 201);
}

#[tokio::test]
async fn test_document_tree_ordering_and_moves() {
    let app = TestApp::spawn().await;
    let client = app.register_and_login("alice").await;
    let space = create_space(&app, &client, "Tree").await;
    let space_id = space["id"].as_str().unwrap();

    let d1 = create_document(&app, &client, space_id, "D1", None).await;
    let d2 = create_document(&app, &client, space_id, "D2", None).await;
    let d1_id = d1["id"].as_str().unwrap();
    let d2_id = d2["id"].as_str().unwrap();

    let res = client
        .get(app.url("/documents"))
        .query(&[("space_id", space_id), ("parent_id", "")])
        .send()
        .await
        .expect("list root");
    let root = data(res).await;
    assert_eq!(ids(&root), vec![d1_id, d2_id]);

    let res = client
        .post(app.url(&format!("/documents/{d2_id}/move")))
        .json(&json!({ "parent_id": d1_id }))
        .send()
        .await
        .expect("move d2");
    assert_eq!(res.status(), 200);

    let res = client
        .get(app.url("/documents"))
        .query(&[("space_id", space_id), ("parent_id", "")])
        .send()
        .await
        .expect("list root after move");
    assert_eq!(ids(&data(res).await), vec![d1_id]);
    let res = client
        .get(app.url("/documents"))
        .query(&[("space_id", space_id), ("parent_id", d1_id)])
        .send()
        .await
        .expect("list children");
    assert_eq!(ids(&data(res).await), vec![d2_id]);

    // Moving a document under its own descendant is refused.
    let res = client
        .post(app.url(&format!("/documents/{d1_id}/move")))
        .json(&json!({ "parent_id": d2_id }))
        .send()
        .await
        .expect("cycle move");
    assert_eq!(res.status(), 400);

    // Reorder swaps sibling positions.
    let res = client
        .post(app.url(&format!("/documents/{d2_id}/move")))
        .json(&json!({ "parent_id": null }))
        .send()
        .await
        .expect("move d2 to root");
    assert_eq!(res.status(), 200);
    let res = client
        .post(app.url("/documents/reorder"))
        .json(&json!({
            "space_id": space_id,
            "orders": [
                { "id": d2_id, "position": 0 },
                { "id": d1_id, "position": 1 },
            ],
        }))
        .send()
        .await
        .expect("reorder");
    assert_eq!(res.status(), 204);
    let res = client
        .get(app.url("/documents"))
        .query(&[("space_id", space_id), ("parent_id", "")])
        .send()
        .await
        .expect("list reordered");
    assert_eq!(ids(&data(res).await), vec![d2_id, d1_id]);
}

#[tokio::test]
async fn test_document_slug_resolution() {
    let app = TestApp::spawn().await;
    let client = app.register_and_login("alice").await;
    let space = create_space(&app, &client, "Wiki").await;
    let space_id = space["id"].as_str().unwrap();

    let doc = create_document(&app, &client, space_id, "Getting Started", None).await;
    assert_eq!(doc["slug"], "getting-started");
    let dup = create_document(&app, &client, space_id, "Getting Started", None).await;
    assert_eq!(dup["slug"], "getting-started-2");

    // Slug lookups need the space for scoping.
    let res = client
        .get(app.url("/documents/getting-started"))
        .send()
        .await
        .expect("slug without space");
    assert_eq!(res.status(), 400);
    let res = client
        .get(app.url("/documents/getting-started"))
        .query(&[("space_id", space_id)])
        .send()
        .await
        .expect("slug with space");
    assert_eq!(res.status(), 200);
    assert_eq!(data(res).await["id"], doc["id"]);

    // Renames keep the slug.
    let doc_id = doc["id"].as_str().unwrap();
    let res = client
        .patch(app.url(&format!("/documents/{doc_id}")))
        .json(&json!({ "name": "Intro" }))
        .send()
        .await
        .expect("rename");
    assert_eq!(res.status(), 200);
    let renamed = data(res).await;
    assert_eq!(renamed["name"], "Intro");
    assert_eq!(renamed["slug"], "getting-started");
}

#[tokio::test]
async fn test_content_updates_snapshot_versions() {
    let app = TestApp::spawn().await;
    let client = app.register_and_login("alice").await;
    let space = create_space(&app, &client, "Notes").await;
    let space_id = space["id"].as_str().unwrap();
    let doc = create_document(&app, &client, space_id, "Draft", None).await;
    let doc_id = doc["id"].as_str().unwrap();

    for n in 1..=2 {
        let res = client
            .patch(app.url(&format!("/documents/{doc_id}")))
            .json(&json!({ "content": [{ "rev": n }] }))
            .send()
            .await
            .expect("update content");
        assert_eq!(res.status(), 200);
    }

    let res = client
        .get(app.url(&format!("/documents/{doc_id}")))
        .send()
        .await
        .expect("get doc");
    assert_eq!(data(res).await["content"][0]["rev"], 2);

    // Each write snapshotted the state it replaced.
    let res = client
        .get(app.url(&format!("/documents/{doc_id}/versions")))
        .send()
        .await
        .expect("list versions");
    let listing = data(res).await;
    assert_eq!(listing["total"], 2);
    let versions = listing["versions"].as_array().expect("array");
    assert_eq!(versions[0]["version"], 2);
    assert_eq!(versions[0]["description"], "Auto-save");
    assert_eq!(versions[0]["content"][0]["rev"], 1);

    // Manual snapshots take the caller's description.
    let res = client
        .post(app.url(&format!("/documents/{doc_id}/versions")))
        .json(&json!({ "description": "Before review" }))
        .send()
        .await
        .expect("manual version");
    assert_eq!(res.status(), 201);
    let manual = data(res).await;
    assert_eq!(manual["version"], 3);
    assert_eq!(manual["description"], "Before review");
    assert_eq!(manual["content"][0]["rev"], 2);

    // Restore rolls content back and leaves an undo point behind.
    let res = client
        .post(app.url(&format!("/documents/{doc_id}/versions/2/restore")))
        .send()
        .await
        .expect("restore");
    assert_eq!(res.status(), 200);
    let restored = data(res).await;
    assert_eq!(restored["content"][0]["rev"], 1);

    let res = client
        .get(app.url(&format!("/documents/{doc_id}/versions")))
        .send()
        .await
        .expect("versions after restore");
    let listing = data(res).await;
    assert_eq!(listing["total"], 4);
    assert_eq!(
        listing["versions"][0]["description"],
        "Before restore to version 2"
    );
}

#[tokio::test]
async fn test_trash_and_restore() {
    let app = TestApp::spawn().await;
    let client = app.register_and_login("alice").await;
    let space = create_space(&app, &client, "Bin").await;
    let space_id = space["id"].as_str().unwrap();

    let parent = create_document(&app, &client, space_id, "Parent", None).await;
    let parent_id = parent["id"].as_str().unwrap();
    let child = create_document(&app, &client, space_id, "Child", Some(parent_id)).await;
    let child_id = child["id"].as_str().unwrap();

    // A document with live children cannot be trashed.
    let res = client
        .delete(app.url(&format!("/documents/{parent_id}")))
        .send()
        .await
        .expect("delete parent early");
    assert_eq!(res.status(), 409);

    let res = client
        .delete(app.url(&format!("/documents/{child_id}")))
        .send()
        .await
        .expect("delete child");
    assert_eq!(res.status(), 204);
    let res = client
        .get(app.url(&format!("/documents/{child_id}")))
        .send()
        .await
        .expect("get deleted");
    assert_eq!(res.status(), 404);

    let res = client
        .get(app.url("/documents/trash"))
        .query(&[("space_id", space_id)])
        .send()
        .await
        .expect("trash");
    assert_eq!(ids(&data(res).await), vec![child_id]);

    let res = client
        .delete(app.url(&format!("/documents/{parent_id}")))
        .send()
        .await
        .expect("delete parent");
    assert_eq!(res.status(), 204);

    // Restoring under a still-deleted parent lands the document at root.
    let res = client
        .post(app.url(&format!("/documents/{child_id}/restore")))
        .send()
        .await
        .expect("restore child");
    assert_eq!(res.status(), 200);
    let restored = data(res).await;
    assert!(restored.get("parent_id").is_none());
    assert!(restored.get("deleted_at").is_none());
}

#[tokio::test]
async fn test_search_respects_access() {
    let app = TestApp::spawn().await;
    let alice = app.register_and_login("alice").await;
    let bob = app.register_and_login("bob").await;

    let alice_space = create_space(&app, &alice, "Work").await;
    let bob_space = create_space(&app, &bob, "Bob Work").await;
    create_document(
        &app,
        &alice,
        alice_space["id"].as_str().unwrap(),
        "Meeting notes",
        None,
    )
    .await;
    create_document(
        &app,
        &alice,
        alice_space["id"].as_str().unwrap(),
        "Grocery list",
        None,
    )
    .await;
    create_document(
        &app,
        &bob,
        bob_space["id"].as_str().unwrap(),
        "Meeting agenda",
        None,
    )
    .await;

    let res = alice
        .get(app.url("/documents/search"))
        .query(&[("q", "meeting")])
        .send()
        .await
        .expect("search");
    let hits = data(res).await;
    let hits = hits.as_array().expect("array");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["name"], "Meeting notes");

    let res = alice
        .get(app.url("/documents/search"))
        .query(&[("q", "  ")])
        .send()
        .await
        .expect("empty search");
    assert_eq!(res.status(), 400);
}

#[tokio::test]
async fn test_public_document_endpoint() {
    let app = TestApp::spawn().await;
    let client = app.register_and_login("alice").await;
    let space = create_space(&app, &client, "Blog").await;
    let space_id = space["id"].as_str().unwrap();
    let doc = create_document(&app, &client, space_id, "Hello World", None).await;
    let doc_id = doc["id"].as_str().unwrap();

    let anon = reqwest::Client::new();
    let res = anon
        .get(app.url(&format!("/public/{space_id}/hello-world")))
        .send()
        .await
        .expect("public before opt-in");
    assert_eq!(res.status(), 404);

    // Even the author sees a 404 through the share URL until opting in.
    let res = client
        .get(app.url(&format!("/public/{space_id}/hello-world")))
        .send()
        .await
        .expect("author through share link");
    assert_eq!(res.status(), 404);

    let res = client
        .patch(app.url(&format!("/documents/{doc_id}")))
        .json(&json!({ "public": true }))
        .send()
        .await
        .expect("make public");
    assert_eq!(res.status(), 200);

    // Readable anonymously by slug or id once the flag is set.
    let res = anon
        .get(app.url(&format!("/public/{space_id}/hello-world")))
        .send()
        .await
        .expect("public by slug");
    assert_eq!(res.status(), 200);
    let shared = data(res).await;
    assert_eq!(shared["name"], "Hello World");
    assert_eq!(shared["space"]["slug"], space["slug"]);
    let res = anon
        .get(app.url(&format!("/public/{space_id}/{doc_id}")))
        .send()
        .await
        .expect("public by id");
    assert_eq!(res.status(), 200);

    // Turning the flag back off closes the share link again.
    let res = client
        .patch(app.url(&format!("/documents/{doc_id}")))
        .json(&json!({ "public": false }))
        .send()
        .await
        .expect("make private");
    assert_eq!(res.status(), 200);
    let res = anon
        .get(app.url(&format!("/public/{space_id}/{doc_id}")))
        .send()
        .await
        .expect("public after opt-out");
    assert_eq!(res.status(), 404);

    // The share path is per-document opt-in only; a public space type does
    // not expose its unshared documents here.
    let res = client
        .post(app.url("/spaces"))
        .json(&json!({ "name": "Town Square", "space_type": "public" }))
        .send()
        .await
        .expect("create public space");
    assert_eq!(res.status(), 201);
    let open_space = data(res).await;
    let open_space_id = open_space["id"].as_str().unwrap();
    create_document(&app, &client, open_space_id, "Welcome", None).await;

    let res = anon
        .get(app.url(&format!("/public/{open_space_id}/welcome")))
        .send()
        .await
        .expect("public space doc");
    assert_eq!(res.status(), 404);
}

#[tokio::test]
async fn test_spreadsheet_seeds_sample_rows() {
    let app = TestApp::spawn().await;
    let client = app.register_and_login("alice").await;
    let space = create_space(&app, &client, "Data").await;
    let space_id = space["id"].as_str().unwrap();

    let res = client
        .post(app.url("/databases"))
        .json(&json!({ "space_id": space_id, "name": "Tracker" }))
        .send()
        .await
        .expect("create database");
    assert_eq!(res.status(), 201);
    let db = data(res).await;
    let db_id = db["id"].as_str().unwrap();
    assert_eq!(db["database_type"], "spreadsheet");
    let props = db["properties"].as_array().expect("properties");
    assert_eq!(props.len(), 2);
    assert_eq!(props[0]["name"], "Name");
    assert_eq!(props[0]["property_type"], "title");
    assert_eq!(props[1]["property_type"], "date");
    let views = db["views"].as_array().expect("views");
    assert_eq!(views.len(), 1);
    assert_eq!(views[0]["view_type"], "table");
    assert_eq!(db["default_view_id"], views[0]["id"]);

    let title_id = props[0]["id"].as_str().unwrap();
    let res = client
        .get(app.url(&format!("/databases/{db_id}/rows")))
        .send()
        .await
        .expect("list rows");
    let listing = data(res).await;
    assert_eq!(listing["total_count"], 3);
    let titles: Vec<&str> = listing["rows"]
        .as_array()
        .expect("rows")
        .iter()
        .map(|r| r["properties"][title_id].as_str().expect("title"))
        .collect();
    assert_eq!(titles, vec!["Data 1", "Data 2", "Data 3"]);

    // Document databases seed schema only.
    let res = client
        .post(app.url("/databases"))
        .json(&json!({
            "space_id": space_id,
            "name": "Pages",
            "database_type": "document",
        }))
        .send()
        .await
        .expect("create document database");
    let db = data(res).await;
    assert_eq!(db["properties"].as_array().expect("properties").len(), 1);
    assert_eq!(db["views"][0]["view_type"], "list");
    let db_id = db["id"].as_str().unwrap();
    let res = client
        .get(app.url(&format!("/databases/{db_id}/rows")))
        .send()
        .await
        .expect("list rows");
    assert_eq!(data(res).await["total_count"], 0);
}

#[tokio::test]
async fn test_inline_database_binds_to_document() {
    let app = TestApp::spawn().await;
    let client = app.register_and_login("alice").await;
    let space = create_space(&app, &client, "Inline").await;
    let space_id = space["id"].as_str().unwrap();
    let doc = create_document(&app, &client, space_id, "Board", None).await;
    let doc_id = doc["id"].as_str().unwrap();

    let res = client
        .post(app.url("/databases"))
        .json(&json!({ "space_id": space_id, "document_id": doc_id, "name": "Tasks" }))
        .send()
        .await
        .expect("create inline database");
    assert_eq!(res.status(), 201);
    let db = data(res).await;

    let res = client
        .get(app.url(&format!("/documents/{doc_id}/database")))
        .send()
        .await
        .expect("get inline database");
    assert_eq!(res.status(), 200);
    assert_eq!(data(res).await["id"], db["id"]);

    // One inline database per document.
    let res = client
        .post(app.url("/databases"))
        .json(&json!({ "space_id": space_id, "document_id": doc_id, "name": "More" }))
        .send()
        .await
        .expect("second inline database");
    assert_eq!(res.status(), 409);
}

#[tokio::test]
async fn test_views_filter_and_sort_rows() {
    let app = TestApp::spawn().await;
    let client = app.register_and_login("alice").await;
    let space = create_space(&app, &client, "Sprint").await;
    let space_id = space["id"].as_str().unwrap();

    let res = client
        .post(app.url("/databases"))
        .json(&json!({ "space_id": space_id, "name": "Tasks" }))
        .send()
        .await
        .expect("create database");
    let db = data(res).await;
    let db_id = db["id"].as_str().unwrap().to_string();

    // Replace the schema with status and priority columns.
    let res = client
        .patch(app.url(&format!("/databases/{db_id}")))
        .json(&json!({
            "properties": [
                { "id": "p-title", "name": "Name", "property_type": "title" },
                { "id": "p-status", "name": "Status", "property_type": "select" },
                { "id": "p-priority", "name": "Priority", "property_type": "number" },
            ],
        }))
        .send()
        .await
        .expect("update schema");
    assert_eq!(res.status(), 200);

    // Clear the seeds, then insert a known set.
    let res = client
        .get(app.url(&format!("/databases/{db_id}/rows")))
        .send()
        .await
        .expect("list seeds");
    let seed_ids: Vec<String> = data(res).await["rows"]
        .as_array()
        .expect("rows")
        .iter()
        .map(|r| r["id"].as_str().unwrap().to_string())
        .collect();
    let res = client
        .post(app.url(&format!("/databases/{db_id}/rows/bulk-delete")))
        .json(&json!({ "row_ids": seed_ids }))
        .send()
        .await
        .expect("clear seeds");
    assert_eq!(data(res).await["deleted"], 3);

    for (name, status, priority) in [
        ("write docs", "open", 1),
        ("review", "done", 9),
        ("fix bug", "open", 5),
        ("ship", "open", 3),
    ] {
        let res = client
            .post(app.url(&format!("/databases/{db_id}/rows")))
            .json(&json!({
                "properties": { "p-title": name, "p-status": status, "p-priority": priority },
            }))
            .send()
            .await
            .expect("create row");
        assert_eq!(res.status(), 201);
    }

    let res = client
        .post(app.url(&format!("/databases/{db_id}/views")))
        .json(&json!({ "name": "Open items" }))
        .send()
        .await
        .expect("create view");
    assert_eq!(res.status(), 201);
    let view_id = data(res).await["id"].as_str().unwrap().to_string();
    let res = client
        .patch(app.url(&format!("/databases/{db_id}/views/{view_id}")))
        .json(&json!({
            "filter": { "and": [{ "property": "p-status", "condition": "eq", "value": "open" }] },
            "sort": [
                { "property": "p-priority", "direction": "desc" },
                { "property": "created_at", "direction": "asc" },
            ],
        }))
        .send()
        .await
        .expect("configure view");
    assert_eq!(res.status(), 200);

    let res = client
        .get(app.url(&format!("/databases/{db_id}/rows")))
        .query(&[("view_id", view_id.as_str())])
        .send()
        .await
        .expect("list through view");
    let listing = data(res).await;
    assert_eq!(listing["total_count"], 4);
    assert_eq!(listing["filtered_count"], 3);
    let priorities: Vec<i64> = listing["rows"]
        .as_array()
        .expect("rows")
        .iter()
        .map(|r| r["properties"]["p-priority"].as_i64().expect("priority"))
        .collect();
    assert_eq!(priorities, vec![5, 3, 1]);

    // An empty filter object clears the stored filter.
    let res = client
        .patch(app.url(&format!("/databases/{db_id}/views/{view_id}")))
        .json(&json!({ "filter": {} }))
        .send()
        .await
        .expect("clear filter");
    let cleared = data(res).await;
    assert!(cleared.get("filter").is_none());

    // The last view cannot be deleted.
    let res = client
        .delete(app.url(&format!("/databases/{db_id}/views/{view_id}")))
        .send()
        .await
        .expect("delete extra view");
    assert_eq!(res.status(), 204);
    let res = client
        .get(app.url(&format!("/databases/{db_id}")))
        .send()
        .await
        .expect("get database");
    let db = data(res).await;
    let last_view = db["views"][0]["id"].as_str().unwrap();
    assert_eq!(db["default_view_id"].as_str().unwrap(), last_view);
    let res = client
        .delete(app.url(&format!("/databases/{db_id}/views/{last_view}")))
        .send()
        .await
        .expect("delete last view");
    assert_eq!(res.status(), 409);
}

#[tokio::test]
async fn test_row_property_merging_and_validation() {
    let app = TestApp::spawn().await;
    let client = app.register_and_login("alice").await;
    let space = create_space(&app, &client, "Rows").await;
    let space_id = space["id"].as_str().unwrap();

    let res = client
        .post(app.url("/databases"))
        .json(&json!({ "space_id": space_id, "name": "Ledger" }))
        .send()
        .await
        .expect("create database");
    let db = data(res).await;
    let db_id = db["id"].as_str().unwrap().to_string();
    let res = client
        .patch(app.url(&format!("/databases/{db_id}")))
        .json(&json!({
            "properties": [
                { "id": "p-title", "name": "Name", "property_type": "title" },
                { "id": "p-amount", "name": "Amount", "property_type": "number" },
                { "id": "p-done", "name": "Done", "property_type": "checkbox" },
            ],
        }))
        .send()
        .await
        .expect("update schema");
    assert_eq!(res.status(), 200);

    // Typed columns reject mismatched values.
    let res = client
        .post(app.url(&format!("/databases/{db_id}/rows")))
        .json(&json!({ "properties": { "p-amount": "not a number" } }))
        .send()
        .await
        .expect("bad number");
    assert_eq!(res.status(), 400);
    let res = client
        .post(app.url(&format!("/databases/{db_id}/rows")))
        .json(&json!({ "properties": { "p-done": "yes" } }))
        .send()
        .await
        .expect("bad checkbox");
    assert_eq!(res.status(), 400);

    let res = client
        .post(app.url(&format!("/databases/{db_id}/rows")))
        .json(&json!({ "properties": { "p-title": "rent", "p-amount": 1200 } }))
        .send()
        .await
        .expect("create row");
    assert_eq!(res.status(), 201);
    let row_id = data(res).await["id"].as_str().unwrap().to_string();

    // Updates merge key by key; explicit null removes a key.
    let res = client
        .patch(app.url(&format!("/databases/{db_id}/rows/{row_id}")))
        .json(&json!({ "properties": { "p-done": true } }))
        .send()
        .await
        .expect("merge update");
    let row = data(res).await;
    assert_eq!(row["properties"]["p-title"], "rent");
    assert_eq!(row["properties"]["p-amount"], 1200);
    assert_eq!(row["properties"]["p-done"], true);

    let res = client
        .patch(app.url(&format!("/databases/{db_id}/rows/{row_id}")))
        .json(&json!({ "properties": { "p-amount": null } }))
        .send()
        .await
        .expect("remove key");
    let row = data(res).await;
    assert!(row["properties"].get("p-amount").is_none());

    let res = client
        .delete(app.url(&format!("/databases/{db_id}/rows/{row_id}")))
        .send()
        .await
        .expect("delete row");
    assert_eq!(res.status(), 204);
    let res = client
        .get(app.url(&format!("/databases/{db_id}/rows/{row_id}")))
        .send()
        .await
        .expect("get deleted row");
    assert_eq!(res.status(), 404);
}

#[tokio::test]
async fn test_drawings_crud_and_owner_delete() {
    let app = TestApp::spawn().await;
    let alice = app.register_and_login("alice").await;
    let bob = app.register_and_login("bob").await;
    let bob_id = me(&app, &bob).await["id"].as_str().unwrap().to_string();

    let space = create_space(&app, &alice, "Canvas").await;
    let space_id = space["id"].as_str().unwrap();
    let res = alice
        .post(app.url(&format!("/spaces/{space_id}/permissions")))
        .json(&json!({ "user_id": bob_id, "role": "editor" }))
        .send()
        .await
        .expect("grant bob editor");
    assert_eq!(res.status(), 201);

    let res = alice
        .post(app.url("/drawings"))
        .json(&json!({ "space_id": space_id, "name": "Whiteboard" }))
        .send()
        .await
        .expect("create drawing");
    assert_eq!(res.status(), 201);
    let drawing = data(res).await;
    let drawing_id = drawing["id"].as_str().unwrap();
    assert_eq!(drawing["elements"], json!([]));

    let res = bob
        .patch(app.url(&format!("/drawings/{drawing_id}")))
        .json(&json!({ "elements": [{ "type": "rect" }], "thumbnail": "data:image/png;base64,xyz" }))
        .send()
        .await
        .expect("bob update");
    assert_eq!(res.status(), 200);
    let updated = data(res).await;
    assert_eq!(updated["elements"][0]["type"], "rect");
    assert!(updated["thumbnail"].as_str().is_some());

    // Editors draw; only the owner (or a space admin) deletes.
    let res = bob
        .delete(app.url(&format!("/drawings/{drawing_id}")))
        .send()
        .await
        .expect("bob delete");
    assert_eq!(res.status(), 403);
    let res = alice
        .delete(app.url(&format!("/drawings/{drawing_id}")))
        .send()
        .await
        .expect("alice delete");
    assert_eq!(res.status(), 204);

    let res = alice
        .get(app.url("/drawings"))
        .query(&[("space_id", space_id)])
        .send()
        .await
        .expect("list drawings");
    assert_eq!(data(res).await.as_array().expect("array").len(), 0);
}

#[tokio::test]
async fn test_comment_threads_and_authorship() {
    let app = TestApp::spawn().await;
    let alice = app.register_and_login("alice").await;
    let bob = app.register_and_login("bob").await;
    let bob_id = me(&app, &bob).await["id"].as_str().unwrap().to_string();

    let space = create_space(&app, &alice, "Review").await;
    let space_id = space["id"].as_str().unwrap();
    let doc = create_document(&app, &alice, space_id, "Proposal", None).await;
    let doc_id = doc["id"].as_str().unwrap();
    let res = alice
        .post(app.url(&format!("/spaces/{space_id}/permissions")))
        .json(&json!({ "user_id": bob_id, "role": "viewer" }))
        .send()
        .await
        .expect("grant bob viewer");
    assert_eq!(res.status(), 201);

    let res = alice
        .post(app.url(&format!("/documents/{doc_id}/comments")))
        .json(&json!({ "content": "Looks good", "block_id": "b1" }))
        .send()
        .await
        .expect("alice comment");
    assert_eq!(res.status(), 201);
    let comment = data(res).await;
    let comment_id = comment["id"].as_str().unwrap();

    // Viewers reply in threads.
    let res = bob
        .post(app.url(&format!("/documents/{doc_id}/comments")))
        .json(&json!({ "content": "Agreed", "parent_id": comment_id }))
        .send()
        .await
        .expect("bob reply");
    assert_eq!(res.status(), 201);

    let res = bob
        .get(app.url(&format!("/documents/{doc_id}/comments")))
        .send()
        .await
        .expect("list comments");
    assert_eq!(data(res).await.as_array().expect("array").len(), 2);

    // Only the author edits or deletes; anyone with view resolves.
    let res = bob
        .patch(app.url(&format!("/comments/{comment_id}")))
        .json(&json!({ "content": "hijack" }))
        .send()
        .await
        .expect("bob edit");
    assert_eq!(res.status(), 403);
    let res = bob
        .patch(app.url(&format!("/comments/{comment_id}")))
        .json(&json!({ "resolved": true }))
        .send()
        .await
        .expect("bob resolve");
    assert_eq!(res.status(), 200);
    assert_eq!(data(res).await["resolved"], true);
    let res = bob
        .delete(app.url(&format!("/comments/{comment_id}")))
        .send()
        .await
        .expect("bob delete");
    assert_eq!(res.status(), 403);
    let res = alice
        .delete(app.url(&format!("/comments/{comment_id}")))
        .send()
        .await
        .expect("alice delete");
    assert_eq!(res.status(), 204);
}

#[tokio::test]
async fn test_favorites_are_per_user_and_ordered() {
    let app = TestApp::spawn().await;
    let alice = app.register_and_login("alice").await;
    let bob = app.register_and_login("bob").await;

    let space = create_space(&app, &alice, "Stars").await;
    let space_id = space["id"].as_str().unwrap();
    let d1 = create_document(&app, &alice, space_id, "First", None).await;
    let d2 = create_document(&app, &alice, space_id, "Second", None).await;

    let res = alice
        .post(app.url("/favorites"))
        .json(&json!({ "document_id": d1["id"] }))
        .send()
        .await
        .expect("favorite d1");
    assert_eq!(res.status(), 201);
    let f1 = data(res).await;
    assert_eq!(f1["position"], 0);
    let res = alice
        .post(app.url("/favorites"))
        .json(&json!({ "document_id": d2["id"] }))
        .send()
        .await
        .expect("favorite d2");
    let f2 = data(res).await;
    assert_eq!(f2["position"], 1);

    let res = alice
        .post(app.url("/favorites"))
        .json(&json!({ "document_id": d1["id"] }))
        .send()
        .await
        .expect("favorite d1 again");
    assert_eq!(res.status(), 409);

    // Bob cannot favorite what he cannot see, nor touch alice's entries.
    let res = bob
        .post(app.url("/favorites"))
        .json(&json!({ "document_id": d1["id"] }))
        .send()
        .await
        .expect("bob favorite");
    assert_eq!(res.status(), 403);
    let f1_id = f1["id"].as_str().unwrap();
    let res = bob
        .delete(app.url(&format!("/favorites/{f1_id}")))
        .send()
        .await
        .expect("bob delete favorite");
    assert_eq!(res.status(), 404);

    let res = alice
        .patch(app.url(&format!("/favorites/{f1_id}")))
        .json(&json!({ "position": 5 }))
        .send()
        .await
        .expect("reposition");
    assert_eq!(data(res).await["position"], 5);

    let res = alice
        .get(app.url("/favorites"))
        .send()
        .await
        .expect("list favorites");
    let favorites = data(res).await;
    let positions: Vec<i64> = favorites
        .as_array()
        .expect("array")
        .iter()
        .map(|f| f["position"].as_i64().unwrap())
        .collect();
    assert_eq!(positions, vec![1, 5]);

    let res = alice
        .delete(app.url(&format!("/favorites/{f1_id}")))
        .send()
        .await
        .expect("delete favorite");
    assert_eq!(res.status(), 204);
}

#[tokio::test]
async fn test_content_owner_survives_space_downgrade() {
    let app = TestApp::spawn().await;
    let alice = app.register_and_login("alice").await;
    let bob = app.register_and_login("bob").await;
    let bob_id = me(&app, &bob).await["id"].as_str().unwrap().to_string();

    let space = create_space(&app, &alice, "Team").await;
    let space_id = space["id"].as_str().unwrap();
    let res = alice
        .post(app.url(&format!("/spaces/{space_id}/permissions")))
        .json(&json!({ "user_id": bob_id, "role": "editor" }))
        .send()
        .await
        .expect("grant editor");
    assert_eq!(res.status(), 201);

    let doc = create_document(&app, &bob, space_id, "Bob's page", None).await;
    let doc_id = doc["id"].as_str().unwrap();

    // Space demotion does not touch the owner grant bob got at creation.
    let res = alice
        .post(app.url(&format!("/spaces/{space_id}/permissions")))
        .json(&json!({ "user_id": bob_id, "role": "viewer" }))
        .send()
        .await
        .expect("demote to viewer");
    assert_eq!(res.status(), 201);

    let res = bob
        .patch(app.url(&format!("/documents/{doc_id}")))
        .json(&json!({ "content": [{ "rev": 1 }] }))
        .send()
        .await
        .expect("bob edits own doc");
    assert_eq!(res.status(), 200);

    // But elsewhere in the space bob is read-only now.
    let res = bob
        .post(app.url("/documents"))
        .json(&json!({ "space_id": space_id, "name": "Another" }))
        .send()
        .await
        .expect("bob creates");
    assert_eq!(res.status(), 403);
}

#[tokio::test]
async fn test_permission_listing_requires_manage() {
    let app = TestApp::spawn().await;
    let alice = app.register_and_login("alice").await;
    let bob = app.register_and_login("bob").await;
    let bob_id = me(&app, &bob).await["id"].as_str().unwrap().to_string();

    let space = create_space(&app, &alice, "Ledger").await;
    let space_id = space["id"].as_str().unwrap();
    let res = alice
        .post(app.url(&format!("/spaces/{space_id}/permissions")))
        .json(&json!({ "user_id": bob_id, "role": "editor" }))
        .send()
        .await
        .expect("grant editor");
    assert_eq!(res.status(), 201);

    let res = bob
        .get(app.url(&format!("/spaces/{space_id}/permissions")))
        .send()
        .await
        .expect("bob lists grants");
    assert_eq!(res.status(), 403);

    let res = alice
        .get(app.url(&format!("/spaces/{space_id}/permissions")))
        .send()
        .await
        .expect("alice lists grants");
    assert_eq!(res.status(), 200);
    let grants = data(res).await;
    assert_eq!(grants.as_array().expect("array").len(), 2);

    // Exactly one subject per grant or revoke.
    let res = alice
        .post(app.url(&format!("/spaces/{space_id}/permissions")))
        .json(&json!({ "role": "viewer" }))
        .send()
        .await
        .expect("grant without subject");
    assert_eq!(res.status(), 400);
}
