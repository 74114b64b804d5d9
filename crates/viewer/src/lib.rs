//! Annotation viewer session.
//!
//! [`Viewer`] ties the core algorithms, the render cache and the scheduler
//! together behind the command surface a host UI drives. The host calls
//! commands and gesture entry points from its UI thread and calls
//! [`Viewer::pump`] whenever it wants background results applied.

pub mod config;
pub mod error;
pub mod event;
mod source;
pub mod viewer;

pub use config::{ConfigError, EngineConfig};
pub use error::LoadError;
pub use event::{SaveHandle, ViewerEvent};
pub use viewer::Viewer;
