pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::http::{router, AppState, SharedState};
pub use adapters::storage::LocalResultStore;
pub use config::{ServeArgs, ServerConfig};
pub use crate::core::{service::AnnotationService, startup::Launcher, tonality::TonalityCatalog};
pub use utils::error::{AppError, Result};
