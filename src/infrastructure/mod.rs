pub mod kv;
pub mod storage;
