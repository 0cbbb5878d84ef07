pub mod ffmpeg_audio_source;
pub mod ffmpeg_muxer;
pub mod ffmpeg_session;
pub mod image_file_source;
mod frame_factory;
mod output_stream;
mod stream_configurator;
