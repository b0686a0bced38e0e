pub mod config;
pub mod target;
pub mod top;
pub mod trace;
pub mod traffic;
