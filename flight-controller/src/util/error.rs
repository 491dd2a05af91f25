use core::fmt::{self, Debug, Display, Formatter};

/// A static message wrapping whatever the storage layer reported. Only the
/// settings persistence path produces these; control paths never error.
#[derive(Debug)]
pub struct AppError<E> {
    pub message: &'static str,
    pub error: E,
}

impl<E> AppError<E> {
    pub fn new(message: &'static str, error: E) -> Self {
        AppError { message, error }
    }
}

impl<E> Display for AppError<E>
where
    E: Debug,
{
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{} {:?}", self.message, self.error)
    }
}
