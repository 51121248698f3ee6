use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Invalid options or a logging setup failure.
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
