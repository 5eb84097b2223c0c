use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JSON5 settings document error: {0}")]
    Json5(#[from] json5::Error),
    #[error("Settings document must be an object")]
    NotAnObject,
}
