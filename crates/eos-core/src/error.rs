use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Index out of range: {what} (index={index}, len={len})")]
    IndexOutOfRange {
        what: &'static str,
        index: isize,
        len: usize,
    },
}
