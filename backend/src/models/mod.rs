pub mod pull_request;
pub mod team;

pub use pull_request::*;
pub use team::*;
