use thiserror::Error;

// Erros do esquema de criptografia de mensagens do WeCom.
// `code()` devolve o código numérico que a própria plataforma documenta.
#[derive(Debug, Error)]
pub enum WeComError {
    #[error("Assinatura da mensagem inválida")]
    InvalidSignature,

    #[error("XML do callback inválido: {0}")]
    MalformedXml(String),

    #[error("EncodingAESKey inválida")]
    InvalidAesKey,

    #[error("ReceiveId não confere com o CorpID configurado")]
    ReceiveIdMismatch,

    #[error("Falha ao cifrar a mensagem")]
    Encrypt,

    #[error("Falha ao decifrar a mensagem")]
    Decrypt,

    #[error("Base64 inválido: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl WeComError {
    pub fn code(&self) -> i32 {
        match self {
            WeComError::InvalidSignature => -40001,
            WeComError::MalformedXml(_) => -40002,
            WeComError::InvalidAesKey => -40004,
            WeComError::ReceiveIdMismatch => -40005,
            WeComError::Encrypt => -40006,
            WeComError::Decrypt => -40007,
            WeComError::Base64(_) => -40009,
        }
    }
}

impl From<quick_xml::DeError> for WeComError {
    fn from(e: quick_xml::DeError) -> Self {
        WeComError::MalformedXml(e.to_string())
    }
}
