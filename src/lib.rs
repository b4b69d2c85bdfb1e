pub mod browser;
pub mod chat;
pub mod config;
pub mod crawler;
pub mod storage;
