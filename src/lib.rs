pub mod aggregate;
pub mod cli;
pub mod config;
pub mod core;
pub mod engine;
pub mod exit;
pub mod logs;
pub mod platform;
pub mod runner;
pub mod sheets;
pub mod sites;
pub mod ui;
