pub mod accounts;
pub mod auth;
pub mod backup;
pub mod collection;
pub mod file_service;
pub mod portal;
pub mod quota;
pub mod storage;
pub mod worker;
