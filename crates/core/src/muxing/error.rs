use thiserror::Error;

/// Failures of the container writer and its collaborators.
///
/// Variants wrapping an [`ffmpeg_next::Error`] carry the library's decoded
/// description of the underlying negative return code.
#[derive(Error, Debug)]
pub enum MuxError {
    #[error("ffmpeg initialization failed: {0}")]
    LibraryInit(#[source] ffmpeg_next::Error),

    #[error("no encoder available for codec {0:?}")]
    UnsupportedCodec(ffmpeg_next::codec::Id),

    #[error("expected 1 or 2 audio channels, got {0}")]
    UnsupportedChannelCount(u16),

    #[error("could not allocate {what}: {source}")]
    Allocation {
        what: &'static str,
        #[source]
        source: ffmpeg_next::Error,
    },

    #[error("frame buffer not writable: {0}")]
    BufferNotWritable(#[source] ffmpeg_next::Error),

    #[error("resampler produced {got} samples, expected {expected}")]
    ResampleMismatch { got: usize, expected: usize },

    #[error("bitmap is {got_width}x{got_height}, expected {want_width}x{want_height}")]
    BitmapSize {
        got_width: u32,
        got_height: u32,
        want_width: u32,
        want_height: u32,
    },

    #[error("could not open muxer ({what}): {source}")]
    Open {
        what: &'static str,
        #[source]
        source: ffmpeg_next::Error,
    },

    #[error("writer is closed and cannot be reopened")]
    AlreadyClosed,

    #[error("writer is not open")]
    NotOpen,

    #[error("container has no {0} stream")]
    MissingStream(&'static str),

    #[error("could not convert frame: {0}")]
    Convert(#[source] ffmpeg_next::Error),

    #[error("could not encode frame: {0}")]
    Encode(#[source] ffmpeg_next::Error),

    #[error("could not write packet: {0}")]
    Write(#[source] ffmpeg_next::Error),
}
