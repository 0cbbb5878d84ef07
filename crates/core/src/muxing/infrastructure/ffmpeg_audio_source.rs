use std::path::Path;

use crate::muxing::domain::audio_source::AudioSource;
use crate::muxing::error::MuxError;
use crate::muxing::infrastructure::ffmpeg_session::FfmpegSession;

/// Decodes an audio file into interleaved f32 samples at the writer's
/// sample rate and channel count, served through [`AudioSource::read`].
///
/// The whole file is decoded up front: inputs here are songs and voice
/// tracks, not live streams, and the writer drains them in a single pass.
pub struct FfmpegAudioSource {
    samples: Vec<f32>,
    position: usize,
}

impl FfmpegAudioSource {
    pub fn open(
        _session: FfmpegSession,
        path: &Path,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        if channels != 1 && channels != 2 {
            return Err(Box::new(MuxError::UnsupportedChannelCount(channels)));
        }
        let layout = if channels == 1 {
            ffmpeg_next::ChannelLayout::MONO
        } else {
            ffmpeg_next::ChannelLayout::STEREO
        };

        let mut ictx = ffmpeg_next::format::input(path)?;

        let audio_stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Audio)
            .ok_or("no audio stream in input")?;
        let audio_stream_index = audio_stream.index();

        let codec_ctx =
            ffmpeg_next::codec::context::Context::from_parameters(audio_stream.parameters())?;
        let mut decoder = codec_ctx.decoder().audio()?;

        let mut resampler = ffmpeg_next::software::resampling::Context::get(
            decoder.format(),
            decoder.channel_layout(),
            decoder.rate(),
            ffmpeg_next::format::Sample::F32(ffmpeg_next::format::sample::Type::Packed),
            layout,
            sample_rate,
        )?;

        let mut samples: Vec<f32> = Vec::new();
        let mut decoded_frame = ffmpeg_next::util::frame::audio::Audio::empty();
        let mut resampled_frame = ffmpeg_next::util::frame::audio::Audio::empty();

        for (stream, packet) in ictx.packets() {
            if stream.index() != audio_stream_index {
                continue;
            }

            decoder.send_packet(&packet)?;

            while decoder.receive_frame(&mut decoded_frame).is_ok() {
                resampler.run(&decoded_frame, &mut resampled_frame)?;
                extend_interleaved(&resampled_frame, channels, &mut samples);
            }
        }

        // Flush the decoder
        decoder.send_eof()?;
        while decoder.receive_frame(&mut decoded_frame).is_ok() {
            resampler.run(&decoded_frame, &mut resampled_frame)?;
            extend_interleaved(&resampled_frame, channels, &mut samples);
        }

        // Flush the resampler (may have buffered samples)
        if let Ok(Some(delay)) = resampler.flush(&mut resampled_frame) {
            if delay.output > 0 {
                extend_interleaved(&resampled_frame, channels, &mut samples);
            }
        }

        Ok(Self {
            samples,
            position: 0,
        })
    }

    /// Total interleaved samples decoded from the file.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl AudioSource for FfmpegAudioSource {
    fn read(&mut self, buf: &mut [f32]) -> Result<usize, Box<dyn std::error::Error>> {
        let remaining = self.samples.len() - self.position;
        let count = remaining.min(buf.len());
        buf[..count].copy_from_slice(&self.samples[self.position..self.position + count]);
        self.position += count;
        Ok(count)
    }
}

/// Append interleaved samples from a packed-float resampled frame.
fn extend_interleaved(
    frame: &ffmpeg_next::util::frame::audio::Audio,
    channels: u16,
    out: &mut Vec<f32>,
) {
    let count = frame.samples() * channels as usize;
    if count == 0 {
        return;
    }
    let data = frame.data(0);
    let floats = unsafe { std::slice::from_raw_parts(data.as_ptr() as *const f32, count) };
    out.extend_from_slice(floats);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::muxing::infrastructure::ffmpeg_muxer::FfmpegMuxer;
    use crate::shared::writer_config::WriterConfig;

    fn session() -> FfmpegSession {
        FfmpegSession::init().unwrap()
    }

    #[test]
    fn test_open_nonexistent_file_fails() {
        let path = if cfg!(windows) {
            Path::new("Z:\\nonexistent\\file.mp3")
        } else {
            Path::new("/nonexistent/file.mp3")
        };
        let result = FfmpegAudioSource::open(session(), path, 44_100, 2);
        assert!(result.is_err());
    }

    #[test]
    fn test_open_rejects_three_channels() {
        let result = FfmpegAudioSource::open(session(), Path::new("whatever.mp3"), 44_100, 3);
        assert!(result.is_err());
    }

    #[test]
    fn test_reads_back_muxed_audio() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");

        // Write one second of stereo tone with the muxer, then decode it
        // back through the source.
        let mut writer = FfmpegMuxer::new(session(), &path, WriterConfig::default());
        writer.open().unwrap();
        let samples_per_frame = writer.audio_samples_per_frame();
        let tone: Vec<f32> = (0..44_100 * 2)
            .map(|i| (i as f32 * 0.03).sin() * 0.5)
            .collect();
        for chunk in tone.chunks(samples_per_frame) {
            writer.write_audio_frame(chunk).unwrap();
        }
        writer.close().unwrap();

        let mut source = FfmpegAudioSource::open(session(), &path, 44_100, 2).unwrap();
        assert!(source.len() >= tone.len());

        let mut buf = vec![0.0f32; 4096];
        let mut total = 0;
        loop {
            let read = source.read(&mut buf).unwrap();
            if read == 0 {
                break;
            }
            total += read;
        }
        assert_eq!(total, source.len());

        // Exhausted sources keep returning zero.
        assert_eq!(source.read(&mut buf).unwrap(), 0);
    }
}
