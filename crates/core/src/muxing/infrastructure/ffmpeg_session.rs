use crate::muxing::error::MuxError;

/// Proof that the ffmpeg libraries have been initialized.
///
/// Writers and decoders take a session by value, so none of them can exist
/// before `ffmpeg_next::init()` has succeeded. Initialization order is a
/// compile-time requirement rather than a runtime check.
#[derive(Clone, Copy, Debug)]
pub struct FfmpegSession(());

impl FfmpegSession {
    pub fn init() -> Result<Self, MuxError> {
        ffmpeg_next::init().map_err(MuxError::LibraryInit)?;
        Ok(Self(()))
    }
}
