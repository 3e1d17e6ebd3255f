//! Tipos de erro para o cliente da API de automação.
//!
//! Define [`ApiError`] com uma variante por classe de resposta HTTP que o
//! rastreador e o coordenador de reenvio precisam distinguir. Usa `thiserror`
//! para derivar `Display` e `Error` a partir dos atributos `#[error(...)]`.

use thiserror::Error;

/// Erros que podem ocorrer ao interagir com a API de automação.
///
/// - [`Unauthorized`](ApiError::Unauthorized): sessão ausente ou expirada (HTTP 401);
///   transitório do ponto de vista do rastreador
/// - [`Forbidden`](ApiError::Forbidden), [`BadRequest`](ApiError::BadRequest),
///   [`NotFound`](ApiError::NotFound): recusas definitivas do servidor
/// - [`Status`](ApiError::Status): qualquer outro erro HTTP
/// - [`Network`](ApiError::Network): falha na camada de rede
#[derive(Debug, Error)]
pub enum ApiError {
    /// O servidor retornou HTTP 401: sessão inválida ou expirada.
    #[error("not authenticated")]
    Unauthorized,

    /// O usuário não tem permissão para a operação (HTTP 403).
    #[error("permission denied: {0}")]
    Forbidden(String),

    /// Job ou recurso inexistente (HTTP 404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Requisição rejeitada pelo servidor (HTTP 400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Qualquer outro status HTTP de erro (ex.: 500).
    #[error("API error (status {status}): {message}")]
    Status { status: u16, message: String },

    /// Submissão sem itens; recusada antes de qualquer chamada.
    #[error("submission requires at least one item")]
    EmptySubmission,

    /// Falha de rede subjacente (DNS, conexão recusada, timeout) ou corpo ilegível.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl ApiError {
    /// Autenticação é a única falha que o rastreador trata como recuperável.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    /// Mapeia um status HTTP de erro e sua mensagem para a variante correspondente.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 => ApiError::Unauthorized,
            403 => ApiError::Forbidden(message),
            404 => ApiError::NotFound(message),
            400 => ApiError::BadRequest(message),
            _ => ApiError::Status { status, message },
        }
    }
}
