//! Stream and encoder setup: registers one stream per media kind on the
//! container, negotiates encoder parameters, opens the encoder, and wires
//! up the frame buffers and conversion contexts.

use crate::muxing::error::MuxError;
use crate::muxing::infrastructure::frame_factory;
use crate::muxing::infrastructure::output_stream::{AudioOutputStream, VideoOutputStream};
use crate::shared::writer_config::WriterConfig;

/// Keyframe at least every this many frames.
const GOP_SIZE: u32 = 12;

/// Frame capacity for encoders that accept arbitrary frame sizes.
const VARIABLE_FRAME_SAMPLES: usize = 10_000;

/// Register a video stream on the container and return its fully
/// populated state.
pub(crate) fn add_video_stream(
    octx: &mut ffmpeg_next::format::context::Output,
    codec_id: ffmpeg_next::codec::Id,
    config: &WriterConfig,
) -> Result<VideoOutputStream, MuxError> {
    let codec =
        ffmpeg_next::encoder::find(codec_id).ok_or(MuxError::UnsupportedCodec(codec_id))?;

    let global_header = octx
        .format()
        .flags()
        .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

    let mut ost = octx.add_stream(Some(codec)).map_err(|e| MuxError::Open {
        what: "video stream",
        source: e,
    })?;

    let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
        .encoder()
        .video()
        .map_err(|e| MuxError::Open {
            what: "video encoder context",
            source: e,
        })?;

    let time_base = ffmpeg_next::Rational(1, config.fps as i32);

    encoder_ctx.set_bit_rate(config.video_bit_rate);
    encoder_ctx.set_width(config.width);
    encoder_ctx.set_height(config.height);
    encoder_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);
    encoder_ctx.set_time_base(time_base);
    encoder_ctx.set_frame_rate(Some(ffmpeg_next::Rational(config.fps as i32, 1)));
    encoder_ctx.set_gop(GOP_SIZE);

    if global_header {
        encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
    }

    let encoder = encoder_ctx
        .open_with(ffmpeg_next::Dictionary::new())
        .map_err(|e| MuxError::Open {
            what: "video encoder",
            source: e,
        })?;

    ost.set_parameters(&encoder);
    ost.set_time_base(time_base);
    let stream_index = ost.index();

    let frame = frame_factory::alloc_video_frame(
        ffmpeg_next::format::Pixel::YUV420P,
        config.width,
        config.height,
    )?;
    let temp_frame = frame_factory::alloc_video_frame(
        ffmpeg_next::format::Pixel::BGR24,
        config.width,
        config.height,
    )?;

    Ok(VideoOutputStream {
        encoder,
        stream_index,
        encoder_time_base: time_base,
        frame,
        temp_frame,
        scaler: None,
        next_pts: 0,
    })
}

/// Register an audio stream on the container and return its fully
/// populated state.
pub(crate) fn add_audio_stream(
    octx: &mut ffmpeg_next::format::context::Output,
    codec_id: ffmpeg_next::codec::Id,
    config: &WriterConfig,
) -> Result<AudioOutputStream, MuxError> {
    if config.channels != 1 && config.channels != 2 {
        return Err(MuxError::UnsupportedChannelCount(config.channels));
    }

    let codec =
        ffmpeg_next::encoder::find(codec_id).ok_or(MuxError::UnsupportedCodec(codec_id))?;

    let global_header = octx
        .format()
        .flags()
        .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

    let mut ost = octx.add_stream(Some(codec)).map_err(|e| MuxError::Open {
        what: "audio stream",
        source: e,
    })?;

    let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
        .encoder()
        .audio()
        .map_err(|e| MuxError::Open {
            what: "audio encoder context",
            source: e,
        })?;

    // First sample format the encoder lists, planar float when the encoder
    // leaves the choice open.
    let sample_format = codec
        .audio()
        .ok()
        .and_then(|a| a.formats())
        .and_then(|mut formats| formats.next())
        .unwrap_or(ffmpeg_next::format::Sample::F32(
            ffmpeg_next::format::sample::Type::Planar,
        ));

    // Every encoder in scope accepts stereo; mono caller input is
    // duplicated across both channels during conversion. An encoder that
    // cannot take stereo rejects the open below.
    let channel_layout = ffmpeg_next::ChannelLayout::STEREO;
    let encoder_channels: u16 = 2;

    encoder_ctx.set_bit_rate(config.audio_bit_rate);
    encoder_ctx.set_rate(config.sample_rate as i32);
    encoder_ctx.set_format(sample_format);
    encoder_ctx.set_channel_layout(channel_layout);

    if global_header {
        encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
    }

    let encoder = encoder_ctx.open_as(codec).map_err(|e| MuxError::Open {
        what: "audio encoder",
        source: e,
    })?;

    ost.set_parameters(&encoder);
    ost.set_time_base(ffmpeg_next::Rational(1, config.sample_rate as i32));
    let stream_index = ost.index();

    let samples = if codec
        .capabilities()
        .contains(ffmpeg_next::codec::Capabilities::VARIABLE_FRAME_SIZE)
    {
        VARIABLE_FRAME_SAMPLES
    } else {
        encoder.frame_size() as usize
    };

    let frame = frame_factory::alloc_audio_frame(
        encoder.format(),
        channel_layout,
        config.sample_rate,
        samples,
    )?;
    let temp_frame = frame_factory::alloc_audio_frame(
        ffmpeg_next::format::Sample::F32(ffmpeg_next::format::sample::Type::Packed),
        channel_layout,
        config.sample_rate,
        samples,
    )?;

    let resampler = ffmpeg_next::software::resampling::Context::get(
        ffmpeg_next::format::Sample::F32(ffmpeg_next::format::sample::Type::Packed),
        channel_layout,
        config.sample_rate,
        encoder.format(),
        channel_layout,
        config.sample_rate,
    )
    .map_err(|e| MuxError::Allocation {
        what: "resampling context",
        source: e,
    })?;

    Ok(AudioOutputStream {
        encoder_time_base: encoder.time_base(),
        encoder,
        stream_index,
        channels: encoder_channels,
        frame,
        temp_frame,
        resampler,
        next_pts: 0,
        sample_count: 0,
        flushed: false,
    })
}
