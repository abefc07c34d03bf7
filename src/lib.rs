#![forbid(unsafe_code)]

pub mod bus;
pub mod config;
pub mod datamodel;
pub mod delivery;
pub mod http;
pub mod ingestors;
pub mod parsing;
pub mod pipeline;
pub mod storage;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
