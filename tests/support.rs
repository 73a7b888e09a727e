use serde_json::{json, Value};
use synapse_net::{ApiClient, ClientConfig, TokenPair};
use wiremock::MockServer;

pub struct TestBackend {
    server: MockServer,
}

impl TestBackend {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn server(&self) -> &MockServer {
        &self.server
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::default().with_server_endpoint(self.server.uri())
    }

    pub fn client(&self) -> ApiClient {
        self.client_with(self.config())
    }

    pub fn client_with(&self, config: ClientConfig) -> ApiClient {
        ApiClient::new(config).expect("build api client")
    }

    /// A client whose store already holds `(access, refresh)`.
    pub fn signed_in_client(&self, access: &str, refresh: &str) -> ApiClient {
        let client = self.client();
        client
            .token_store()
            .set(TokenPair::new(access, refresh, None).expect("token pair"));
        client
    }
}

pub fn ok_envelope(data: Value) -> Value {
    json!({"code": 0, "message": "success", "data": data})
}

#[allow(dead_code)]
pub fn error_envelope(code: i64, message: &str) -> Value {
    json!({"code": code, "message": message, "data": null})
}

pub fn token_envelope(access: &str, refresh: &str) -> Value {
    ok_envelope(json!({"accessToken": access, "refreshToken": refresh, "expiresIn": 3600}))
}

pub fn profile_envelope(user_id: i64, username: &str) -> Value {
    ok_envelope(json!({
        "userId": user_id,
        "username": username,
        "nickname": format!("{username} (nick)"),
        "email": format!("{username}@example.com")
    }))
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

#[allow(dead_code)]
pub fn refresh_form(refresh: &str) -> String {
    format!("refreshToken={refresh}")
}
