// Adapters layer: concrete implementations of the domain ports (storage, smtp).

pub mod smtp;
pub mod storage;
