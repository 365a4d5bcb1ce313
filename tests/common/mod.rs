//! Shared helpers for the HTTP integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use gatehouse::config::{build_config, Config};
use gatehouse::router::{build_router, Components};
use gatehouse::secrets::SecretGenerator;
use gatehouse::store::{InMemoryUserStore, UserStore};
use gatehouse::token::TokenService;

pub const TEST_SECRET: &str = "integration-test-secret";
pub const TEST_PASSWORD: &str = "Str0ngPassw0rd";

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    pub config: Config,
    pub users: Arc<InMemoryUserStore>,
}

/// Build a config from the given overrides on top of a test secret.
pub fn test_config(overrides: &[(&str, &str)]) -> Config {
    let mut env: HashMap<String, String> = HashMap::new();
    env.insert("JWT_SECRET".to_string(), TEST_SECRET.to_string());
    env.insert("RATE_LIMITER_ENABLED".to_string(), "false".to_string());
    for (key, value) in overrides {
        env.insert(key.to_string(), value.to_string());
    }
    build_config(|key| env.get(key).cloned(), &serde_json::Value::Null)
        .expect("test config should be valid")
}

impl TestApp {
    pub async fn spawn(overrides: &[(&str, &str)]) -> Self {
        Self::spawn_with_store(overrides, Arc::new(InMemoryUserStore::new())).await
    }

    pub async fn spawn_with_store(overrides: &[(&str, &str)], users: Arc<InMemoryUserStore>) -> Self {
        let config = test_config(overrides);
        let store: Arc<dyn UserStore> = users.clone();
        let components = Components {
            tokens: Arc::new(TokenService::new(&config.jwt).expect("token service")),
            secrets: Arc::new(
                SecretGenerator::new(config.password.clone(), config.otp.clone())
                    .expect("secret generator"),
            ),
            users: store,
        };
        let app = build_router(components, &config);

        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let server = axum::Server::bind(&addr)
            .serve(app.into_make_service_with_connect_info::<SocketAddr, _>());
        let address = format!("http://{}", server.local_addr());

        tokio::spawn(async move {
            if let Err(e) = server.await {
                eprintln!("Test server error: {}", e);
            }
        });

        TestApp {
            address,
            client: reqwest::Client::new(),
            config,
            users,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn post_json(&self, path: &str, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("request failed")
    }

    pub async fn get_with_auth(&self, path: &str, authorization: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(self.url(path));
        if let Some(value) = authorization {
            request = request.header("Authorization", value);
        }
        request.send().await.expect("request failed")
    }

    pub async fn register(&self, username: &str, password: &str) -> reqwest::Response {
        self.post_json(
            "/v1/auth/register",
            &serde_json::json!({
                "username": username,
                "password": password,
                "email": format!("{}@example.com", username),
            }),
        )
        .await
    }

    pub async fn login(&self, username: &str, password: &str) -> reqwest::Response {
        self.post_json(
            "/v1/auth/login",
            &serde_json::json!({ "username": username, "password": password }),
        )
        .await
    }

    /// Register then log in, returning `(access_token, refresh_token)`.
    pub async fn register_and_login(&self, username: &str) -> (String, String) {
        let response = self.register(username, TEST_PASSWORD).await;
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);

        let response = self.login(username, TEST_PASSWORD).await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: serde_json::Value = response.json().await.unwrap();
        let access = body["result"]["access_token"].as_str().unwrap().to_string();
        let refresh = body["result"]["refresh_token"].as_str().unwrap().to_string();
        (access, refresh)
    }
}
