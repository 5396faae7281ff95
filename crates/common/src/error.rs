use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid uid: {0}")]
    InvalidUid(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

pub type Result<T> = std::result::Result<T, Error>;
