use std::net::SocketAddr;
use std::sync::Arc;

use ipnetwork::IpNetwork;
use keygate_api::app::{build_app, services::build_services_with};
use keygate_api::config::{ApiConfig, BootstrapAdmin};
use keygate_auth::Argon2Hasher;
use reqwest::StatusCode;
use serde_json::{json, Value};

const ADMIN: &str = "admin";
const PASSWORD: &str = "Adm1n-pass";

struct TestServer {
    base_url: String,
    client_id: String,
    client_secret: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with(Vec::new()).await
    }

    async fn spawn_with(trusted_proxies: Vec<IpNetwork>) -> Self {
        // Same router as prod, cheap hasher, ephemeral port.
        let config = ApiConfig {
            bootstrap: Some(BootstrapAdmin {
                username: ADMIN.into(),
                password: PASSWORD.into(),
            }),
            trusted_proxies,
            ..ApiConfig::default()
        };
        let hasher = Arc::new(Argon2Hasher::with_params(8, 1, 1).unwrap());
        let services = build_services_with(&config, hasher).await.unwrap();
        let boot = services.bootstrapped.clone().unwrap();
        let app = build_app(Arc::new(services));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .await
                .unwrap();
        });

        Self {
            base_url,
            client_id: boot.client_id,
            client_secret: boot.client_secret,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn password_grant(&self, password: &str) -> Value {
        json!({
            "grant_type": "password",
            "client_id": self.client_id,
            "client_secret": self.client_secret,
            "username": ADMIN,
            "password": password,
        })
    }

    async fn client_token(&self, client: &reqwest::Client) -> String {
        let res = client
            .post(self.url("/oauth2/tokens"))
            .json(&json!({
                "grant_type": "client_credentials",
                "client_id": self.client_id,
                "client_secret": self.client_secret,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await.unwrap();
        body["access_token"].as_str().unwrap().to_string()
    }

    /// Restrict logins to `10.0.0.1` only.
    async fn allow_only_ten_one(&self, client: &reqwest::Client, token: &str) {
        let res = client
            .patch(self.url("/settings/security"))
            .bearer_auth(token)
            .json(&json!({
                "login_security": {
                    "ip_limit": true,
                    "ip_limit_config": { "mode": "allow", "ip": ["10.0.0.1"] }
                }
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    fn password_change(&self, old: &str, new: &str) -> Value {
        json!({
            "client_id": self.client_id,
            "client_secret": self.client_secret,
            "username": ADMIN,
            "old_password": old,
            "new_password": new,
        })
    }

    async fn login(&self, client: &reqwest::Client) -> String {
        let res = client
            .post(self.url("/oauth2/tokens"))
            .json(&self.password_grant(PASSWORD))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await.unwrap();
        body["access_token"].as_str().unwrap().to_string()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/healthz")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread")]
async fn password_grant_issues_bearer_pair() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/oauth2/tokens"))
        .json(&srv.password_grant(PASSWORD))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["grant_type"], "password");
    assert_eq!(body["access_token"].as_str().unwrap().len(), 24);
    assert_eq!(body["refresh_token"].as_str().unwrap().len(), 32);
    assert_eq!(body["expires_in"], 3600);
    assert!(body.get("password_reset_hint").is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn refusals_do_not_say_why() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let wrong_password = client
        .post(srv.url("/oauth2/tokens"))
        .json(&srv.password_grant("nope"))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    let a: Value = wrong_password.json().await.unwrap();

    let mut bad_client = srv.password_grant(PASSWORD);
    bad_client["client_secret"] = json!("not-the-secret");
    let wrong_secret = client
        .post(srv.url("/oauth2/tokens"))
        .json(&bad_client)
        .send()
        .await
        .unwrap();
    assert_eq!(wrong_secret.status(), StatusCode::UNAUTHORIZED);
    let b: Value = wrong_secret.json().await.unwrap();

    assert_eq!(a, b);
    assert_eq!(a["error"], "unauthorized");
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_requests_are_rejected() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let unknown_grant = client
        .post(srv.url("/oauth2/tokens"))
        .json(&json!({ "grant_type": "implicit", "client_id": srv.client_id, "client_secret": srv.client_secret }))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown_grant.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let mut no_password = srv.password_grant(PASSWORD);
    no_password.as_object_mut().unwrap().remove("password");
    let missing = client
        .post(srv.url("/oauth2/tokens"))
        .json(&no_password)
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    let body: Value = missing.json().await.unwrap();
    assert_eq!(body["error"], "bad_request");

    let not_json = client
        .post(srv.url("/oauth2/tokens"))
        .header("content-type", "application/json")
        .body("{")
        .send()
        .await
        .unwrap();
    assert_eq!(not_json.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread")]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let protected = [
        "/whoami",
        "/settings/security",
        "/sessions",
        "/sessions/0190b6f0-0000-7000-8000-000000000000",
    ];
    for path in protected {
        let res = client.get(srv.url(path)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{path}");
    }

    let res = client
        .get(srv.url("/whoami"))
        .bearer_auth("made-up-token")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test(flavor = "multi_thread")]
async fn whoami_reflects_token() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = srv.login(&client).await;

    let res = client
        .get(srv.url("/whoami"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["username"], ADMIN);
    assert_eq!(body["client_id"], srv.client_id.as_str());
}

#[tokio::test(flavor = "multi_thread")]
async fn security_setting_patch_touches_only_named_fields() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = srv.login(&client).await;

    let before: Value = client
        .get(srv.url("/settings/security"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(before["password_security"]["length"], 8);

    let res = client
        .patch(srv.url("/settings/security"))
        .bearer_auth(&token)
        .json(&json!({ "password_security": { "length": 10 } }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let after: Value = res.json().await.unwrap();

    let mut expected = before.clone();
    expected["password_security"]["length"] = json!(10);
    assert_eq!(after, expected);

    let bad = client
        .patch(srv.url("/settings/security"))
        .bearer_auth(&token)
        .json(&json!({ "password_security": { "no_such_field": true } }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

    let unchanged: Value = client
        .get(srv.url("/settings/security"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(unchanged, expected);
}

#[tokio::test(flavor = "multi_thread")]
async fn logins_show_up_in_session_audit() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    srv.login(&client).await;
    let token = srv.login(&client).await;

    let res = client
        .get(srv.url("/sessions?limit=1"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["total"], 2);
    assert_eq!(body["has_more"], true);
    assert_eq!(body["sessions"].as_array().unwrap().len(), 1);
    assert_eq!(body["sessions"][0]["username"], ADMIN);
    assert_eq!(body["sessions"][0]["login_ip"], "127.0.0.1");

    let filtered: Value = client
        .get(srv.url("/sessions?username=someone-else"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(filtered["total"], 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn revoked_token_stops_working() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = srv.login(&client).await;

    let res = client
        .delete(srv.url("/oauth2/tokens"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client
        .get(srv.url("/whoami"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test(flavor = "multi_thread")]
async fn application_tokens_cannot_change_security_settings() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = srv.client_token(&client).await;

    let readable = client
        .get(srv.url("/settings/security"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(readable.status(), StatusCode::OK);

    let res = client
        .patch(srv.url("/settings/security"))
        .bearer_auth(&token)
        .json(&json!({ "login_security": { "retry_lock": false } }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "forbidden");

    let after: Value = client
        .get(srv.url("/settings/security"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(after["login_security"]["retry_lock"], true);
}

#[tokio::test(flavor = "multi_thread")]
async fn forwarded_for_from_untrusted_peer_cannot_satisfy_ip_limit() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = srv.login(&client).await;
    srv.allow_only_ten_one(&client, &token).await;

    let res = client
        .post(srv.url("/oauth2/tokens"))
        .header("x-forwarded-for", "10.0.0.1")
        .json(&srv.password_grant(PASSWORD))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test(flavor = "multi_thread")]
async fn forwarded_for_from_trusted_proxy_is_used() {
    let srv = TestServer::spawn_with(vec!["127.0.0.1/32".parse().unwrap()]).await;
    let client = reqwest::Client::new();
    let token = srv.login(&client).await;
    srv.allow_only_ten_one(&client, &token).await;

    let res = client
        .post(srv.url("/oauth2/tokens"))
        .header("x-forwarded-for", "10.0.0.1")
        .json(&srv.password_grant(PASSWORD))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let direct = client
        .post(srv.url("/oauth2/tokens"))
        .json(&srv.password_grant(PASSWORD))
        .send()
        .await
        .unwrap();
    assert_eq!(direct.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test(flavor = "multi_thread")]
async fn password_change_enforces_policy_then_takes_effect() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let weak = client
        .post(srv.url("/accounts/password"))
        .json(&srv.password_change(PASSWORD, "short"))
        .send()
        .await
        .unwrap();
    assert_eq!(weak.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = weak.json().await.unwrap();
    assert_eq!(body["error"], "policy_violation");

    let wrong_old = client
        .post(srv.url("/accounts/password"))
        .json(&srv.password_change("not-it", "N3w-passw0rd"))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong_old.status(), StatusCode::UNAUTHORIZED);

    let ok = client
        .post(srv.url("/accounts/password"))
        .json(&srv.password_change(PASSWORD, "N3w-passw0rd"))
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::NO_CONTENT);

    let old = client
        .post(srv.url("/oauth2/tokens"))
        .json(&srv.password_grant(PASSWORD))
        .send()
        .await
        .unwrap();
    assert_eq!(old.status(), StatusCode::UNAUTHORIZED);

    let new = client
        .post(srv.url("/oauth2/tokens"))
        .json(&srv.password_grant("N3w-passw0rd"))
        .send()
        .await
        .unwrap();
    assert_eq!(new.status(), StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread")]
async fn revoke_closes_the_session_and_last_session_tracks_logins() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let first = srv.login(&client).await;
    let second = srv.login(&client).await;

    let res = client
        .delete(srv.url("/oauth2/tokens"))
        .bearer_auth(&first)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let active: Value = client
        .get(srv.url("/sessions?active=true"))
        .bearer_auth(&second)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(active["total"], 1);

    let closed: Value = client
        .get(srv.url("/sessions?active=false"))
        .bearer_auth(&second)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(closed["total"], 1);
    let closed_session = &closed["sessions"][0];
    assert!(closed_session["logout_at"].is_string());

    let id = closed_session["id"].as_str().unwrap();
    let one: Value = client
        .get(srv.url(&format!("/sessions/{id}")))
        .bearer_auth(&second)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(&one, closed_session);

    let missing = client
        .get(srv.url("/sessions/0190b6f0-0000-7000-8000-000000000000"))
        .bearer_auth(&second)
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let account_id = closed_session["account_id"].as_str().unwrap();
    let last: Value = client
        .get(srv.url(&format!("/accounts/{account_id}/sessions/last")))
        .bearer_auth(&second)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(active["sessions"][0], last);
    assert!(last["logout_at"].is_null());
}
