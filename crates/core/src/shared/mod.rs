pub mod bitmap;
pub mod writer_config;
