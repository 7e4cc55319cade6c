pub mod accounts;
pub mod config;
pub mod google;
pub mod http;
pub mod storage;
