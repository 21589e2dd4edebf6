use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed store: {msg}")]
    StoreMalformed { msg: String },
    #[error("coverage domain mismatch: left operand has {left} members, right operand has {right}")]
    DomainMismatch { left: usize, right: usize },
    #[error(
        "variant [{low}, {high}) conflicts with an existing variant covering a shared member"
    )]
    CoverageConflict { low: usize, high: usize },
    #[error("journal edit at position {at} recorded behind the frontier {frontier}")]
    JournalOrdering { at: usize, frontier: usize },
    #[error("journal edit at position {at} with span {span} exceeds the remaining suffix of length {remaining}")]
    JournalOverflow {
        at: usize,
        span: usize,
        remaining: usize,
    },
    #[error("query {id} is empty")]
    QueryEmpty { id: String },
    #[error("query {id} is shorter than the q-gram shape ({len} < {shape})")]
    QueryTooShort { id: String, len: usize, shape: usize },
    #[error("query {id} exceeds the verification word size ({len} > {max})")]
    QueryTooLong { id: String, len: usize, max: usize },
    #[error("store file could not be read")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn malformed<M: Into<String>>(msg: M) -> Self {
        Error::StoreMalformed { msg: msg.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
