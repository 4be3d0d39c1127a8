//! Questions, answers, tags and flags, plus the digest mail command.

pub mod commands;
pub mod forms;
pub mod models;
pub mod urls;
pub mod views;

pub use models::{Answer, Question, QuestionFlag, QuestionOrder, Tag};
