use thiserror::Error;

/// Fatal errors. Everything here aborts startup; nothing in the hot path
/// returns this type.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("invalid configuration ({field}): {message}")]
    Config { field: &'static str, message: String },

    #[error("address index {path}: {message}")]
    Index { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScanError {
    pub fn config(field: &'static str, message: impl Into<String>) -> Self {
        Self::Config {
            field,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;

/// A single undecodable line in a secrets file. Logged and skipped; the
/// source continues with the next line.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SourceParseError {
    #[error("not a decimal integer: {0}")]
    Decimal(String),

    #[error("not a hex integer: {0}")]
    Hex(String),

    #[error("secret exceeds 256 bits")]
    Overflow,

    #[error("invalid WIF: {0}")]
    Wif(String),
}
