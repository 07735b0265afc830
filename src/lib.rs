pub mod app;
pub mod config;
pub mod console;
pub mod controllers;
pub mod crypto;
pub mod error;
pub mod functions;
pub mod models;
pub mod navigation;
pub mod screen;
pub mod session;
pub mod storage;
