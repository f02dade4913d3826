pub mod annotate;
pub mod chord;
pub mod service;
pub mod startup;
pub mod tonality;

pub use crate::domain::model::{Annotation, HistoryEntry, Mode, Tonality, UserId};
pub use crate::domain::ports::{Privileges, ResultStore};
pub use crate::utils::error::Result;
