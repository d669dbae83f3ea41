use thiserror::Error;

use crate::model::{LikertError, RecordError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Likert(#[from] LikertError),
    #[error(transparent)]
    Record(#[from] RecordError),
}
