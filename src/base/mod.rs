pub mod behavior;
pub mod port;
