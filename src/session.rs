//! Sessão do operador autenticado.
//!
//! [`SessionContext`] é criado no login e descartado no logout, e é passado
//! explicitamente a quem precisa de identidade ou papel (o cliente HTTP),
//! em vez de ser lido de um estado global.

use serde::{Deserialize, Serialize};

use crate::api::{ApiError, ErrorBody};

/// Papel do usuário no painel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Admin,
    User,
    Other(String),
}

impl From<String> for Role {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "ADMIN" => Role::Admin,
            "USER" => Role::User,
            _ => Role::Other(raw),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Admin => "ADMIN".to_string(),
            Role::User => "USER".to_string(),
            Role::Other(raw) => raw,
        }
    }
}

/// Identidade e credencial de uma sessão ativa.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    #[serde(rename = "access_token")]
    pub token: String,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default = "default_role")]
    pub role: Role,
    #[serde(default)]
    pub is_admin: bool,
}

fn default_role() -> Role {
    Role::User
}

impl SessionContext {
    /// Sessão a partir de um token já emitido (ex.: `JOBTRACK_TOKEN`), sem perfil conhecido.
    pub fn from_token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            username: String::new(),
            full_name: None,
            role: Role::User,
            is_admin: false,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.is_admin || self.role == Role::Admin
    }

    /// Nome para exibição: nome completo quando houver, senão o login.
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.username)
    }
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// Autentica em `POST {base_url}/login` e devolve a sessão criada.
pub async fn login(
    http: &reqwest::Client,
    base_url: &str,
    username: &str,
    password: &str,
) -> Result<SessionContext, ApiError> {
    let url = format!("{}/login", base_url.trim_end_matches('/'));
    let response = http
        .post(&url)
        .json(&LoginRequest { username, password })
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::from_status(
            status.as_u16(),
            ErrorBody::message_of(&body),
        ));
    }

    let session = response.json::<SessionContext>().await?;
    tracing::info!(username = %session.username, role = ?session.role, "Logged in");
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn role_from_backend_strings() {
        assert_eq!(Role::from("ADMIN".to_string()), Role::Admin);
        assert_eq!(Role::from("USER".to_string()), Role::User);
        assert_eq!(
            Role::from("SUPERVISOR".to_string()),
            Role::Other("SUPERVISOR".into())
        );
        assert_eq!(String::from(Role::Admin), "ADMIN");
    }

    #[test]
    fn session_deserialize_from_login_response() {
        let json = r#"{
            "access_token": "tok",
            "username": "ana",
            "full_name": null,
            "role": "ADMIN",
            "avatar": null,
            "is_admin": false
        }"#;
        let s: SessionContext = serde_json::from_str(json).unwrap();
        assert_eq!(s.token, "tok");
        assert!(s.is_admin());
        assert_eq!(s.display_name(), "ana");
    }

    #[test]
    fn from_token_is_plain_user() {
        let s = SessionContext::from_token("abc");
        assert_eq!(s.role, Role::User);
        assert!(!s.is_admin());
    }

    #[tokio::test]
    async fn login_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/login"))
            .and(body_json(serde_json::json!({"username": "ana", "password": "pw"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "t-1",
                "username": "ana",
                "full_name": "Ana Souza",
                "role": "USER",
                "is_admin": false
            })))
            .mount(&server)
            .await;

        let http = reqwest::Client::new();
        let base = format!("{}/api", server.uri());
        let session = login(&http, &base, "ana", "pw").await.unwrap();
        assert_eq!(session.token, "t-1");
        assert_eq!(session.display_name(), "Ana Souza");
    }

    #[tokio::test]
    async fn login_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/login"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(serde_json::json!({"msg": "Usuário ou senha incorretos"})),
            )
            .mount(&server)
            .await;

        let http = reqwest::Client::new();
        let base = format!("{}/api/", server.uri());
        let err = login(&http, &base, "ana", "wrong").await.unwrap_err();
        assert!(err.is_unauthorized());
    }
}
