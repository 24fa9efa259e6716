use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unknown storage tier: {0}")]
    InvalidTier(String),

    #[error("row has {got} cells but batch has {expected} columns")]
    RowWidth { expected: usize, got: usize },
}
