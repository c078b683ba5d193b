pub mod id;
pub mod locks;
pub mod registry;
pub mod storage;
