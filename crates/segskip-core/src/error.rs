use thiserror::Error;

/// The hasher only accepts ASCII media identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashError {
    #[error("input contains non-ASCII byte 0x{byte:02x} at offset {offset}")]
    NonAscii { offset: usize, byte: u8 },
}

/// Reasons a segment lookup came back without usable data.
///
/// None of these reach the user: the repository logs them and hands the
/// scheduler an empty segment set.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("cannot hash media id: {0}")]
    Input(#[from] HashError),

    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(reqwest::StatusCode),

    #[error("malformed response: {0}")]
    Data(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot serialise config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("unknown config key '{0}'")]
    UnknownKey(String),

    #[error("config key '{key}' expects {expected}")]
    TypeMismatch { key: String, expected: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown segment category '{0}'")]
pub struct UnknownCategory(pub String);
