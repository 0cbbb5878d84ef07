/// Mutable state of the video stream inside an open container.
///
/// The frame buffers are owned here and reused for every call; the encoder
/// only ever sees them synchronously, and a copy-on-write step in the frame
/// factory protects against the encoder still referencing the previous
/// contents.
pub(crate) struct VideoOutputStream {
    pub encoder: ffmpeg_next::codec::encoder::video::Encoder,
    pub stream_index: usize,
    /// Encoder time base (1 / fps). Frame timestamps are produced in this
    /// base and packets are rescaled into the muxer's stream time base on
    /// write.
    pub encoder_time_base: ffmpeg_next::Rational,
    /// Frame in the encoder's pixel format.
    pub frame: ffmpeg_next::util::frame::video::Video,
    /// Staging frame holding the caller's BGR24 pixels.
    pub temp_frame: ffmpeg_next::util::frame::video::Video,
    /// BGR24 to encoder-format converter, created on the first frame.
    pub scaler: Option<ffmpeg_next::software::scaling::Context>,
    /// Presentation timestamp of the next frame, in encoder time-base
    /// ticks. Never decreases; the sole authority for interleaving.
    pub next_pts: i64,
}

/// Mutable state of the audio stream inside an open container.
pub(crate) struct AudioOutputStream {
    pub encoder: ffmpeg_next::codec::encoder::audio::Encoder,
    pub stream_index: usize,
    pub encoder_time_base: ffmpeg_next::Rational,
    /// Channel count of the encoder's layout (not the caller's).
    pub channels: u16,
    /// Frame in the encoder's sample format.
    pub frame: ffmpeg_next::util::frame::audio::Audio,
    /// Staging frame holding interleaved float samples before resampling.
    pub temp_frame: ffmpeg_next::util::frame::audio::Audio,
    pub resampler: ffmpeg_next::software::resampling::Context,
    /// Presentation timestamp of the next frame, in input samples.
    pub next_pts: i64,
    /// Total resampled samples emitted so far. Packet timestamps derive
    /// from this count so rounding never accumulates.
    pub sample_count: i64,
    /// Set once end-of-stream has been sent to the encoder.
    pub flushed: bool,
}
