//! Studio: flyer grid layout, merge engine, bounded card generation, and project documents.

pub mod config;
pub mod content;
pub mod document;
pub mod errors;
pub mod generation;
pub mod layout;
pub mod manager;
pub mod session;

pub use errors::StudioError;
pub use manager::LayoutManager;
pub use session::{Session, SessionSummary};
