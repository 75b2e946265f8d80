use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("configuration error")]
    Config,
    #[display("could not open the catalog")]
    Database,
    #[display("catalog query failed")]
    Catalog,
    #[display("could not open storage")]
    Storage,
    #[display("could not start thumbnail generation")]
    Thumbnail,
    #[display("could not start the worker pool")]
    Pool,
    #[display("library operation failed")]
    Library,
    #[display("{_0} failed")]
    Command(#[error(not(source))] &'static str),
    /// Some items failed while the rest went through; details are logged.
    #[display("{_0} item(s) failed")]
    Partial(#[error(not(source))] usize),
    #[display("interrupted")]
    Interrupted,
}

impl ErrorKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Partial(_) | Self::Interrupted)
    }
}
