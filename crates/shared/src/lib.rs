//! Wire and domain types shared by ticket directory clients.

pub mod domain;
pub mod error;
pub mod protocol;
pub mod timestamp;
