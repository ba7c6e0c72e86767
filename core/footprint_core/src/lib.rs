pub mod analytics;
pub mod buffer;
pub mod categorize;
pub mod clock;
pub mod content;
pub mod engine;
pub mod event;
pub mod insights;
pub mod message;
pub mod remote;
pub mod server;
pub mod session;
pub mod settings;
pub mod store;
pub mod timer;
