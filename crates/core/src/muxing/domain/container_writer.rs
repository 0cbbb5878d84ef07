use crate::shared::bitmap::Bitmap;

/// Outcome of a single write call.
///
/// Encoders may hold frames back (B-frame reordering, lookahead) without
/// emitting a packet; `Buffered` is normal operation, not an error. Held
/// packets drain when the writer closes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteStatus {
    /// At least one encoded packet reached the container during this call.
    PacketWritten,
    /// The encoder consumed the input but produced no packet yet.
    Buffered,
}

/// Abstracts the interleaved container writer so the driving loop does not
/// depend on a specific codec library.
pub trait ContainerWriter: Send {
    fn open(&mut self) -> Result<(), Box<dyn std::error::Error>>;

    /// Interleaving decision: true when the video stream's timestamp is at
    /// or behind the audio stream's, i.e. the next unit pushed should be a
    /// video frame. Callers poll this before every write.
    fn should_write_video(&self) -> bool;

    /// Interleaved sample count expected per `write_audio_frame` call.
    /// Zero when the container carries no audio stream.
    fn audio_samples_per_frame(&self) -> usize;

    fn write_video_frame(
        &mut self,
        bitmap: &Bitmap,
    ) -> Result<WriteStatus, Box<dyn std::error::Error>>;

    /// An empty `samples` slice signals end of audio and starts the
    /// encoder's flush sequence.
    fn write_audio_frame(
        &mut self,
        samples: &[f32],
    ) -> Result<WriteStatus, Box<dyn std::error::Error>>;

    /// Flushes both encoders, writes the trailer, and releases all owned
    /// resources. Calling it a second time has no effect.
    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>>;
}
