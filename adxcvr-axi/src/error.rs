use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("link still down after {polls} status polls")]
    LinkTimeout { polls: u32 },
}
