use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("invalid configuration")]
    Config,
    #[display("could not set up the HTTP client")]
    Http,
    #[display("entry store unavailable")]
    Store,
    #[display("could not write output")]
    Output,
    #[display("no stored entry for {_0}")]
    NotStored(#[error(not(source))] String),
    #[display("{_0} of {_1} entries could not be extracted")]
    Incomplete(usize, usize),
}
