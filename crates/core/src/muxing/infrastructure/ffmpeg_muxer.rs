use std::cmp::Ordering;
use std::path::PathBuf;

use ffmpeg_next::Rescale;

use crate::muxing::domain::container_writer::{ContainerWriter, WriteStatus};
use crate::muxing::error::MuxError;
use crate::muxing::infrastructure::ffmpeg_session::FfmpegSession;
use crate::muxing::infrastructure::frame_factory;
use crate::muxing::infrastructure::output_stream::{AudioOutputStream, VideoOutputStream};
use crate::muxing::infrastructure::stream_configurator;
use crate::shared::bitmap::Bitmap;
use crate::shared::writer_config::WriterConfig;

/// Writes one interleaved audio/video container file via ffmpeg-next.
///
/// The container format and its codecs are inferred from the output path's
/// extension. Two independently clocked streams are merged into one
/// monotonically ordered packet sequence: callers poll
/// [`should_write_video`](Self::should_write_video) to decide which stream
/// to feed next, and the container's interleaved writer orders the
/// resulting packets by timestamp.
pub struct FfmpegMuxer {
    config: WriterConfig,
    output_path: PathBuf,
    octx: Option<ffmpeg_next::format::context::Output>,
    video: Option<VideoOutputStream>,
    audio: Option<AudioOutputStream>,
    closed: bool,
}

// Safety: FfmpegMuxer is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegMuxer {}

impl FfmpegMuxer {
    /// The session token proves the ffmpeg libraries are initialized.
    pub fn new(_session: FfmpegSession, output_path: impl Into<PathBuf>, config: WriterConfig) -> Self {
        Self {
            config,
            output_path: output_path.into(),
            octx: None,
            video: None,
            audio: None,
            closed: false,
        }
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Allocate the container, configure one stream per media kind the
    /// format supports, open the encoders, and write the header.
    ///
    /// Any failure leaves the writer unopened; everything allocated up to
    /// that point is released on the way out.
    pub fn open(&mut self) -> Result<(), MuxError> {
        if self.closed {
            return Err(MuxError::AlreadyClosed);
        }
        if self.octx.is_some() {
            return Ok(());
        }

        let mut octx =
            ffmpeg_next::format::output(&self.output_path).map_err(|e| MuxError::Open {
                what: "output context",
                source: e,
            })?;

        let video_codec = octx
            .format()
            .codec(&self.output_path, ffmpeg_next::media::Type::Video);
        let audio_codec = octx
            .format()
            .codec(&self.output_path, ffmpeg_next::media::Type::Audio);

        let video = if video_codec != ffmpeg_next::codec::Id::None {
            Some(stream_configurator::add_video_stream(
                &mut octx,
                video_codec,
                &self.config,
            )?)
        } else {
            None
        };

        let audio = if audio_codec != ffmpeg_next::codec::Id::None {
            Some(stream_configurator::add_audio_stream(
                &mut octx,
                audio_codec,
                &self.config,
            )?)
        } else {
            None
        };

        octx.write_header().map_err(|e| MuxError::Open {
            what: "container header",
            source: e,
        })?;

        self.octx = Some(octx);
        self.video = video;
        self.audio = audio;
        Ok(())
    }

    /// True when the next unit pushed should be a video frame: the video
    /// stream's timestamp is at or behind the audio stream's.
    ///
    /// Timestamps live in different time bases, so the comparison
    /// cross-multiplies into 128-bit integers instead of dividing.
    pub fn should_write_video(&self) -> bool {
        match (&self.video, &self.audio) {
            (Some(video), Some(audio)) => {
                compare_ts(
                    video.next_pts,
                    video.encoder_time_base,
                    audio.next_pts,
                    audio.encoder_time_base,
                ) != Ordering::Greater
            }
            (Some(_), None) => true,
            _ => false,
        }
    }

    /// Interleaved f32 sample count expected per [`write_audio_frame`]
    /// call: the encoder's frame size times the configured channel count.
    /// Zero when the container carries no audio stream.
    ///
    /// [`write_audio_frame`]: Self::write_audio_frame
    pub fn audio_samples_per_frame(&self) -> usize {
        self.audio
            .as_ref()
            .map(|audio| audio.temp_frame.samples() * self.config.channels as usize)
            .unwrap_or(0)
    }

    /// Convert, encode, and write one video frame.
    pub fn write_video_frame(&mut self, bitmap: &Bitmap) -> Result<WriteStatus, MuxError> {
        let octx = self.octx.as_mut().ok_or(MuxError::NotOpen)?;
        let stream = self.video.as_mut().ok_or(MuxError::MissingStream("video"))?;

        frame_factory::fill_video_frame(stream, bitmap)?;

        stream.frame.set_pts(Some(stream.next_pts));
        stream.next_pts += 1;

        stream
            .encoder
            .send_frame(&stream.frame)
            .map_err(MuxError::Encode)?;

        let wrote = drain_video_packets(
            &mut stream.encoder,
            octx,
            stream.stream_index,
            stream.encoder_time_base,
        )?;
        Ok(write_status(wrote))
    }

    /// Resample, encode, and write one audio frame.
    ///
    /// An empty `samples` slice signals end of audio: a null frame is sent
    /// to the encoder so it begins emitting whatever it has buffered.
    pub fn write_audio_frame(&mut self, samples: &[f32]) -> Result<WriteStatus, MuxError> {
        let octx = self.octx.as_mut().ok_or(MuxError::NotOpen)?;
        let stream = self.audio.as_mut().ok_or(MuxError::MissingStream("audio"))?;

        if samples.is_empty() {
            if !stream.flushed {
                stream.encoder.send_eof().map_err(MuxError::Encode)?;
                stream.flushed = true;
            }
            let wrote = drain_audio_packets(
                &mut stream.encoder,
                octx,
                stream.stream_index,
                stream.encoder_time_base,
            )?;
            return Ok(write_status(wrote));
        }

        let input_samples = stream.temp_frame.samples() as i64;
        let converted = frame_factory::fill_audio_frame(stream, samples, self.config.channels)?;

        // pts derives from the running output-sample count, not next_pts,
        // so rescaling rounds once instead of accumulating drift.
        let pts = stream.sample_count.rescale(
            ffmpeg_next::Rational(1, self.config.sample_rate as i32),
            stream.encoder_time_base,
        );
        stream.frame.set_pts(Some(pts));
        stream.next_pts += input_samples;
        stream.sample_count += converted as i64;

        stream
            .encoder
            .send_frame(&stream.frame)
            .map_err(MuxError::Encode)?;

        let wrote = drain_audio_packets(
            &mut stream.encoder,
            octx,
            stream.stream_index,
            stream.encoder_time_base,
        )?;
        Ok(write_status(wrote))
    }

    /// Flush both encoders, write the trailer, and release every owned
    /// resource. Idempotent; teardown is best-effort, so flush or trailer
    /// failures are logged rather than propagated.
    pub fn close(&mut self) -> Result<(), MuxError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let Some(mut octx) = self.octx.take() else {
            return Ok(());
        };
        let mut video = self.video.take();
        let mut audio = self.audio.take();

        if let Some(stream) = video.as_mut() {
            if let Err(e) = flush_video_stream(stream, &mut octx) {
                log::warn!("video flush failed during close: {e}");
            }
        }

        if let Some(stream) = audio.as_mut() {
            if let Err(e) = flush_audio_stream(stream, &mut octx) {
                log::warn!("audio flush failed during close: {e}");
            }
        }

        if let Err(e) = octx.write_trailer() {
            log::warn!("could not write container trailer: {e}");
        }

        // Locals drop in reverse order: encoders, frames, and conversion
        // contexts go with the stream values, the container context last.
        Ok(())
    }
}

impl Drop for FfmpegMuxer {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl ContainerWriter for FfmpegMuxer {
    fn open(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        Ok(FfmpegMuxer::open(self)?)
    }

    fn should_write_video(&self) -> bool {
        FfmpegMuxer::should_write_video(self)
    }

    fn audio_samples_per_frame(&self) -> usize {
        FfmpegMuxer::audio_samples_per_frame(self)
    }

    fn write_video_frame(
        &mut self,
        bitmap: &Bitmap,
    ) -> Result<WriteStatus, Box<dyn std::error::Error>> {
        Ok(FfmpegMuxer::write_video_frame(self, bitmap)?)
    }

    fn write_audio_frame(
        &mut self,
        samples: &[f32],
    ) -> Result<WriteStatus, Box<dyn std::error::Error>> {
        Ok(FfmpegMuxer::write_audio_frame(self, samples)?)
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        Ok(FfmpegMuxer::close(self)?)
    }
}

fn write_status(wrote: bool) -> WriteStatus {
    if wrote {
        WriteStatus::PacketWritten
    } else {
        WriteStatus::Buffered
    }
}

/// Compare `a` in time base `a_tb` against `b` in time base `b_tb`.
///
/// Cross-multiplied in 128-bit integers; floating-point division would
/// bias the interleaving decision near equal timestamps.
fn compare_ts(
    a: i64,
    a_tb: ffmpeg_next::Rational,
    b: i64,
    b_tb: ffmpeg_next::Rational,
) -> Ordering {
    let lhs = a as i128 * a_tb.numerator() as i128 * b_tb.denominator() as i128;
    let rhs = b as i128 * b_tb.numerator() as i128 * a_tb.denominator() as i128;
    lhs.cmp(&rhs)
}

/// Receive every packet the video encoder has ready and write each to the
/// container's interleaved writer. Returns whether anything was written.
fn drain_video_packets(
    encoder: &mut ffmpeg_next::codec::encoder::video::Encoder,
    octx: &mut ffmpeg_next::format::context::Output,
    stream_index: usize,
    encoder_time_base: ffmpeg_next::Rational,
) -> Result<bool, MuxError> {
    let ost_time_base = octx.stream(stream_index).unwrap().time_base();

    let mut wrote = false;
    let mut packet = ffmpeg_next::Packet::empty();
    while encoder.receive_packet(&mut packet).is_ok() {
        packet.set_stream(stream_index);
        packet.rescale_ts(encoder_time_base, ost_time_base);
        packet.write_interleaved(octx).map_err(MuxError::Write)?;
        wrote = true;
    }
    Ok(wrote)
}

fn drain_audio_packets(
    encoder: &mut ffmpeg_next::codec::encoder::audio::Encoder,
    octx: &mut ffmpeg_next::format::context::Output,
    stream_index: usize,
    encoder_time_base: ffmpeg_next::Rational,
) -> Result<bool, MuxError> {
    let ost_time_base = octx.stream(stream_index).unwrap().time_base();

    let mut wrote = false;
    let mut packet = ffmpeg_next::Packet::empty();
    while encoder.receive_packet(&mut packet).is_ok() {
        packet.set_stream(stream_index);
        packet.rescale_ts(encoder_time_base, ost_time_base);
        packet.write_interleaved(octx).map_err(MuxError::Write)?;
        wrote = true;
    }
    Ok(wrote)
}

fn flush_video_stream(
    stream: &mut VideoOutputStream,
    octx: &mut ffmpeg_next::format::context::Output,
) -> Result<(), MuxError> {
    stream.encoder.send_eof().map_err(MuxError::Encode)?;
    drain_video_packets(
        &mut stream.encoder,
        octx,
        stream.stream_index,
        stream.encoder_time_base,
    )?;
    Ok(())
}

fn flush_audio_stream(
    stream: &mut AudioOutputStream,
    octx: &mut ffmpeg_next::format::context::Output,
) -> Result<(), MuxError> {
    if !stream.flushed {
        stream.encoder.send_eof().map_err(MuxError::Encode)?;
        stream.flushed = true;
    }
    drain_audio_packets(
        &mut stream.encoder,
        octx,
        stream.stream_index,
        stream.encoder_time_base,
    )?;
    Ok(())
}
