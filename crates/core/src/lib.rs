pub mod muxing;
pub mod shared;
