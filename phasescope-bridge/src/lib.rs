pub mod config;
pub mod viewer;

pub use config::Settings;
pub use viewer::Viewer;
