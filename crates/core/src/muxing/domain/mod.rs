pub mod audio_source;
pub mod container_writer;
pub mod image_source;
