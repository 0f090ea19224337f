//! Tipos de erro para o cliente da API do pipeline.
//!
//! Define [`ApiError`] com variantes para falhas de rede, respostas não-2xx,
//! cancelamento e corpos de resposta inesperados. Usa `thiserror` para derivar
//! `Display` e `Error` a partir dos atributos `#[error(...)]`.

use thiserror::Error;

/// Erros que podem ocorrer ao conversar com o backend do pipeline.
///
/// - [`Network`](ApiError::Network): a requisição não chegou ao servidor
/// - [`Api`](ApiError::Api): o servidor respondeu com status não-2xx
/// - [`Cancelled`](ApiError::Cancelled): substituída por uma operação mais nova
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Falha na camada de rede (DNS, conexão recusada, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// Resposta não-2xx. A mensagem exibida é exatamente o `detail`
    /// extraído do corpo, para que a interface possa mostrá-la direto.
    #[error("{detail}")]
    Api { status: u16, detail: String },

    /// O token de cancelamento disparou antes da resposta chegar.
    #[error("request cancelled")]
    Cancelled,

    /// O corpo da resposta não tem o formato esperado.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// A URL base configurada não pode receber caminhos.
    #[error("invalid base URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Código HTTP, quando o servidor chegou a responder.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display_is_detail_only() {
        let err = ApiError::Api {
            status: 500,
            detail: "queue full".into(),
        };
        assert_eq!(err.to_string(), "queue full");
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn cancelled_display() {
        assert_eq!(ApiError::Cancelled.to_string(), "request cancelled");
        assert_eq!(ApiError::Cancelled.status(), None);
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ApiError>();
    }
}
