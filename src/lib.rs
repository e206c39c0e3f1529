pub mod attachments;
pub mod cli;
pub mod comment;
pub mod config;
pub mod error;
pub mod intake;
pub mod lookup;
pub mod orchestrator;
pub mod publish;
pub mod render;
pub mod service;
pub mod staging;
pub mod storage;
pub mod task;
pub mod telemetry;
pub mod ui;
