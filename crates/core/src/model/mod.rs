mod ids;
mod likert;
mod question;

pub use ids::{ParseIdError, QuestionId};
pub use likert::{LikertError, LikertValue};
pub use question::{QuestionRecord, RecordError, ensure_unique_ids};
