//! Infrastructure layer for the host: the TCP link to the device bridge and
//! configuration file storage.

pub mod storage;
pub mod transport;
