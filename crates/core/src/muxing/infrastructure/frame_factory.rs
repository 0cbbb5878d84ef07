//! Allocates encoder frames and performs the physical format conversions:
//! BGR24 bitmaps into the video encoder's pixel format, interleaved float
//! samples into the audio encoder's sample format.

use ffmpeg_next::{Rescale, Rounding};

use crate::muxing::error::MuxError;
use crate::muxing::infrastructure::output_stream::{AudioOutputStream, VideoOutputStream};
use crate::shared::bitmap::Bitmap;

/// Allocate a video frame with an attached buffer.
///
/// 32-byte alignment satisfies every SIMD path the encoders in scope use.
pub(crate) fn alloc_video_frame(
    format: ffmpeg_next::format::Pixel,
    width: u32,
    height: u32,
) -> Result<ffmpeg_next::util::frame::video::Video, MuxError> {
    let mut frame = ffmpeg_next::util::frame::video::Video::empty();
    frame.set_format(format);
    frame.set_width(width);
    frame.set_height(height);

    let ret = unsafe { ffmpeg_next::ffi::av_frame_get_buffer(frame.as_mut_ptr(), 32) };
    if ret < 0 {
        return Err(MuxError::Allocation {
            what: "video frame",
            source: ffmpeg_next::Error::from(ret),
        });
    }
    Ok(frame)
}

/// Allocate an audio frame for `samples` samples per channel.
///
/// A sample count of zero attaches no buffer; encoders with a variable
/// frame size take such a frame as the flush signal.
pub(crate) fn alloc_audio_frame(
    format: ffmpeg_next::format::Sample,
    layout: ffmpeg_next::ChannelLayout,
    sample_rate: u32,
    samples: usize,
) -> Result<ffmpeg_next::util::frame::audio::Audio, MuxError> {
    let mut frame = ffmpeg_next::util::frame::audio::Audio::empty();
    frame.set_format(format);
    frame.set_channel_layout(layout);
    frame.set_rate(sample_rate);
    frame.set_samples(samples);

    if samples != 0 {
        let ret = unsafe { ffmpeg_next::ffi::av_frame_get_buffer(frame.as_mut_ptr(), 0) };
        if ret < 0 {
            return Err(MuxError::Allocation {
                what: "audio frame",
                source: ffmpeg_next::Error::from(ret),
            });
        }
    }
    Ok(frame)
}

/// Make `frame`'s buffer safe to overwrite.
///
/// The encoder may still hold a reference to the previous contents; in that
/// case the buffer is replaced with a private copy before the next write.
pub(crate) fn make_writable(frame: &mut ffmpeg_next::Frame) -> Result<(), MuxError> {
    let ret = unsafe { ffmpeg_next::ffi::av_frame_make_writable(frame.as_mut_ptr()) };
    if ret < 0 {
        return Err(MuxError::BufferNotWritable(ffmpeg_next::Error::from(ret)));
    }
    Ok(())
}

/// Copy a bitmap into a BGR24 staging frame, row by row.
///
/// Both the bitmap's stride and the frame's line size may exceed
/// `width * 3`; only the pixel bytes move.
pub(crate) fn copy_bitmap_into(
    frame: &mut ffmpeg_next::util::frame::video::Video,
    bitmap: &Bitmap,
) -> Result<(), MuxError> {
    let width = frame.width();
    let height = frame.height();
    if bitmap.width() != width || bitmap.height() != height {
        return Err(MuxError::BitmapSize {
            got_width: bitmap.width(),
            got_height: bitmap.height(),
            want_width: width,
            want_height: height,
        });
    }

    let stride = frame.stride(0);
    let data = frame.data_mut(0);
    let row_bytes = width as usize * 3;
    for y in 0..height {
        let start = y as usize * stride;
        data[start..start + row_bytes].copy_from_slice(bitmap.row(y));
    }
    Ok(())
}

/// Convert the caller's bitmap into the stream's encoder-format frame.
///
/// The resolution never changes between staging and target, so the scale
/// step is a pure colour-space conversion.
pub(crate) fn fill_video_frame(
    stream: &mut VideoOutputStream,
    bitmap: &Bitmap,
) -> Result<(), MuxError> {
    copy_bitmap_into(&mut stream.temp_frame, bitmap)?;
    make_writable(&mut stream.frame)?;

    if stream.scaler.is_none() {
        let scaler = ffmpeg_next::software::scaling::Context::get(
            stream.temp_frame.format(),
            stream.temp_frame.width(),
            stream.temp_frame.height(),
            stream.frame.format(),
            stream.frame.width(),
            stream.frame.height(),
            ffmpeg_next::software::scaling::Flags::BICUBIC,
        )
        .map_err(|e| MuxError::Allocation {
            what: "scaling context",
            source: e,
        })?;
        stream.scaler = Some(scaler);
    }

    stream
        .scaler
        .as_mut()
        .unwrap()
        .run(&stream.temp_frame, &mut stream.frame)
        .map_err(MuxError::Convert)
}

/// Distribute interleaved caller samples across the encoder's channels.
///
/// Mono input is duplicated into every encoder channel; stereo input maps
/// one to one. Missing tail samples read as silence so a short final read
/// still fills a whole frame.
pub(crate) fn interleave_samples(
    dst: &mut [f32],
    src: &[f32],
    source_channels: u16,
    encoder_channels: usize,
    samples: usize,
) -> Result<(), MuxError> {
    if source_channels != 1 && source_channels != 2 {
        return Err(MuxError::UnsupportedChannelCount(source_channels));
    }

    let mut out = 0;
    for j in 0..samples {
        for i in 0..encoder_channels {
            let index = match source_channels {
                1 => j,
                _ => 2 * j + i,
            };
            dst[out] = src.get(index).copied().unwrap_or(0.0);
            out += 1;
        }
    }
    Ok(())
}

/// De-interleave the caller's samples into the stream's staging frame and
/// resample into the encoder-format frame.
///
/// Returns the number of samples now in the encoder frame. The resampler's
/// buffered delay plus the input count, rescaled to the output rate, is the
/// only output length consistent with a same-rate conversion; anything else
/// signals a configuration inconsistency.
pub(crate) fn fill_audio_frame(
    stream: &mut AudioOutputStream,
    samples: &[f32],
    source_channels: u16,
) -> Result<usize, MuxError> {
    let frame_samples = stream.temp_frame.samples();
    let encoder_channels = stream.channels as usize;

    {
        let data = stream.temp_frame.data_mut(0);
        let interleaved = unsafe {
            std::slice::from_raw_parts_mut(
                data.as_mut_ptr() as *mut f32,
                frame_samples * encoder_channels,
            )
        };
        interleave_samples(
            interleaved,
            samples,
            source_channels,
            encoder_channels,
            frame_samples,
        )?;
    }

    make_writable(&mut stream.frame)?;

    let delay = stream.resampler.delay().map(|d| d.input).unwrap_or(0);
    let in_rate = stream.resampler.input().rate;
    let out_rate = stream.resampler.output().rate;
    let expected = (delay + frame_samples as i64).rescale_with(
        ffmpeg_next::Rational(1, in_rate as i32),
        ffmpeg_next::Rational(1, out_rate as i32),
        Rounding::Up,
    );

    stream
        .resampler
        .run(&stream.temp_frame, &mut stream.frame)
        .map_err(MuxError::Convert)?;

    let got = stream.frame.samples();
    if got as i64 != expected {
        return Err(MuxError::ResampleMismatch {
            got,
            expected: expected as usize,
        });
    }
    Ok(got)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::muxing::infrastructure::ffmpeg_session::FfmpegSession;
    use crate::shared::bitmap::RowOrder;

    #[test]
    fn test_alloc_video_frame_geometry() {
        FfmpegSession::init().unwrap();
        let frame = alloc_video_frame(ffmpeg_next::format::Pixel::BGR24, 320, 240).unwrap();
        assert_eq!(frame.width(), 320);
        assert_eq!(frame.height(), 240);
        assert_eq!(frame.format(), ffmpeg_next::format::Pixel::BGR24);
        assert!(frame.stride(0) >= 320 * 3);
    }

    #[test]
    fn test_alloc_audio_frame_has_buffer() {
        FfmpegSession::init().unwrap();
        let frame = alloc_audio_frame(
            ffmpeg_next::format::Sample::F32(ffmpeg_next::format::sample::Type::Packed),
            ffmpeg_next::ChannelLayout::STEREO,
            44_100,
            1024,
        )
        .unwrap();
        assert_eq!(frame.samples(), 1024);
        assert!(!unsafe { frame.is_empty() });
        assert!(frame.data(0).len() >= 1024 * 2 * 4);
    }

    #[test]
    fn test_alloc_audio_frame_zero_samples_has_no_buffer() {
        FfmpegSession::init().unwrap();
        let frame = alloc_audio_frame(
            ffmpeg_next::format::Sample::F32(ffmpeg_next::format::sample::Type::Planar),
            ffmpeg_next::ChannelLayout::STEREO,
            44_100,
            0,
        )
        .unwrap();
        assert_eq!(frame.samples(), 0);
        assert!(unsafe { frame.is_empty() });
    }

    #[test]
    fn test_copy_bitmap_respects_source_stride() {
        FfmpegSession::init().unwrap();
        let mut frame = alloc_video_frame(ffmpeg_next::format::Pixel::BGR24, 2, 2).unwrap();

        // 8-byte stride leaves two padding bytes per stored row.
        let mut data = vec![0u8; 8 * 2];
        data[..6].copy_from_slice(&[1, 2, 3, 4, 5, 6]);
        data[8..14].copy_from_slice(&[7, 8, 9, 10, 11, 12]);
        let bitmap = Bitmap::with_stride(data, 2, 2, 8, RowOrder::TopDown);

        copy_bitmap_into(&mut frame, &bitmap).unwrap();

        let stride = frame.stride(0);
        assert_eq!(&frame.data(0)[..6], &[1, 2, 3, 4, 5, 6]);
        assert_eq!(&frame.data(0)[stride..stride + 6], &[7, 8, 9, 10, 11, 12]);
    }

    #[test]
    fn test_copy_bitmap_flips_bottom_up_rows() {
        FfmpegSession::init().unwrap();
        let mut frame = alloc_video_frame(ffmpeg_next::format::Pixel::BGR24, 1, 2).unwrap();

        let data = vec![1, 1, 1, 2, 2, 2];
        let bitmap = Bitmap::with_stride(data, 1, 2, 3, RowOrder::BottomUp);

        copy_bitmap_into(&mut frame, &bitmap).unwrap();

        let stride = frame.stride(0);
        // The last stored row is the top visual row.
        assert_eq!(&frame.data(0)[..3], &[2, 2, 2]);
        assert_eq!(&frame.data(0)[stride..stride + 3], &[1, 1, 1]);
    }

    #[test]
    fn test_copy_bitmap_wrong_size_fails() {
        FfmpegSession::init().unwrap();
        let mut frame = alloc_video_frame(ffmpeg_next::format::Pixel::BGR24, 4, 4).unwrap();
        let bitmap = Bitmap::new(vec![0; 2 * 2 * 3], 2, 2);
        let result = copy_bitmap_into(&mut frame, &bitmap);
        assert!(matches!(result, Err(MuxError::BitmapSize { .. })));
    }

    #[test]
    fn test_interleave_mono_duplicates_channels() {
        let src = [0.1f32, 0.2, 0.3];
        let mut dst = [0.0f32; 6];
        interleave_samples(&mut dst, &src, 1, 2, 3).unwrap();
        assert_eq!(dst, [0.1, 0.1, 0.2, 0.2, 0.3, 0.3]);
    }

    #[test]
    fn test_interleave_stereo_maps_one_to_one() {
        let src = [0.1f32, -0.1, 0.2, -0.2];
        let mut dst = [0.0f32; 4];
        interleave_samples(&mut dst, &src, 2, 2, 2).unwrap();
        assert_eq!(dst, src);
    }

    #[test]
    fn test_interleave_short_input_pads_with_silence() {
        let src = [0.5f32, 0.5];
        let mut dst = [1.0f32; 4];
        interleave_samples(&mut dst, &src, 2, 2, 2).unwrap();
        assert_eq!(dst, [0.5, 0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_interleave_rejects_three_channels() {
        let src = [0.0f32; 6];
        let mut dst = [0.0f32; 4];
        let result = interleave_samples(&mut dst, &src, 3, 2, 2);
        assert!(matches!(result, Err(MuxError::UnsupportedChannelCount(3))));
    }
}
