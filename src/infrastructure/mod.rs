pub mod cache;
pub mod storage;
pub mod transport;
