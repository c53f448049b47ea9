pub mod checkpoint;
pub mod config;
pub mod dag;
pub mod errors;
pub mod lifecycle;
pub mod logging;
pub mod orchestrator;
pub mod phase;
pub mod phasegate_config;
pub mod project;
pub mod review;
pub mod ui;
