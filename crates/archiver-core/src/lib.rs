pub mod config;
pub mod logging;

pub mod catalog;
pub mod control;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod fetch_head;
pub mod fetcher;
pub mod finalize;
pub mod http;
pub mod job;
pub mod planner;
pub mod progress;
pub mod reconcile;
pub mod retry;
pub mod scheduler;
pub mod service;
pub mod storage;
pub mod tasks;
