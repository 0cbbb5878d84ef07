use std::path::PathBuf;
use std::process;

use clap::Parser;

use stillmux_core::muxing::domain::audio_source::AudioSource;
use stillmux_core::muxing::domain::container_writer::ContainerWriter;
use stillmux_core::muxing::domain::image_source::ImageSource;
use stillmux_core::muxing::infrastructure::ffmpeg_audio_source::FfmpegAudioSource;
use stillmux_core::muxing::infrastructure::ffmpeg_muxer::FfmpegMuxer;
use stillmux_core::muxing::infrastructure::ffmpeg_session::FfmpegSession;
use stillmux_core::muxing::infrastructure::image_file_source::ImageFileSource;
use stillmux_core::shared::writer_config::WriterConfig;

/// Mux a still image and an audio file into one container file.
#[derive(Parser)]
#[command(name = "stillmux")]
struct Cli {
    /// Input image shown for the whole video.
    image: PathBuf,

    /// Output file; the container format is inferred from the extension.
    output: PathBuf,

    /// Audio file to decode into the audio track.
    #[arg(long)]
    audio: Option<PathBuf>,

    /// Video length in seconds when no audio file drives it.
    #[arg(long, default_value = "5.0")]
    duration: f64,

    /// Video bitrate in bits per second.
    #[arg(long, default_value = "4000000")]
    video_bitrate: usize,

    /// Audio bitrate in bits per second.
    #[arg(long, default_value = "128000")]
    audio_bitrate: usize,

    /// Audio sample rate in Hz.
    #[arg(long, default_value = "44100")]
    sample_rate: u32,

    /// Output width in pixels.
    #[arg(long, default_value = "1920")]
    width: u32,

    /// Output height in pixels.
    #[arg(long, default_value = "1080")]
    height: u32,

    /// Frames per second.
    #[arg(long, default_value = "25")]
    fps: u32,

    /// Audio channel count (1 or 2).
    #[arg(long, default_value = "2")]
    channels: u16,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let session = FfmpegSession::init()?;

    let config = WriterConfig {
        video_bit_rate: cli.video_bitrate,
        audio_bit_rate: cli.audio_bitrate,
        sample_rate: cli.sample_rate,
        width: cli.width,
        height: cli.height,
        fps: cli.fps,
        channels: cli.channels,
    };

    let mut image_source: Box<dyn ImageSource> =
        Box::new(ImageFileSource::open(&cli.image, cli.width, cli.height)?);
    let mut audio_source: Option<Box<dyn AudioSource>> = match &cli.audio {
        Some(path) => Some(Box::new(FfmpegAudioSource::open(
            session,
            path,
            cli.sample_rate,
            cli.channels,
        )?)),
        None => None,
    };

    let mut writer: Box<dyn ContainerWriter> =
        Box::new(FfmpegMuxer::new(session, &cli.output, config));
    writer.open()?;

    let video_frames = match audio_source.as_mut() {
        Some(audio) => drive_with_audio(writer.as_mut(), image_source.as_mut(), audio.as_mut())?,
        None => drive_video_only(
            writer.as_mut(),
            image_source.as_mut(),
            cli.duration,
            cli.fps,
        )?,
    };

    writer.close()?;
    log::info!(
        "Wrote {video_frames} video frames to {}",
        cli.output.display()
    );
    Ok(())
}

/// The interleaving loop: poll the writer for which stream is behind and
/// feed that one, until the audio source runs dry.
fn drive_with_audio(
    writer: &mut dyn ContainerWriter,
    image_source: &mut dyn ImageSource,
    audio_source: &mut dyn AudioSource,
) -> Result<u64, Box<dyn std::error::Error>> {
    let samples_per_frame = writer.audio_samples_per_frame();
    if samples_per_frame == 0 {
        return Err("output format has no audio stream; omit --audio".into());
    }
    let mut buffer = vec![0.0f32; samples_per_frame];
    let mut video_frames: u64 = 0;

    loop {
        if writer.should_write_video() {
            writer.write_video_frame(image_source.next_bitmap()?)?;
            video_frames += 1;
        } else {
            buffer.fill(0.0);
            let read = audio_source.read(&mut buffer)?;
            if read == 0 {
                // Null frame: start the audio encoder's flush.
                writer.write_audio_frame(&[])?;
                break;
            }
            writer.write_audio_frame(&buffer)?;
        }
    }
    Ok(video_frames)
}

fn drive_video_only(
    writer: &mut dyn ContainerWriter,
    image_source: &mut dyn ImageSource,
    duration: f64,
    fps: u32,
) -> Result<u64, Box<dyn std::error::Error>> {
    let target_frames = (duration * fps as f64).ceil() as u64;
    for _ in 0..target_frames {
        writer.write_video_frame(image_source.next_bitmap()?)?;
    }
    Ok(target_frames)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.image.exists() {
        return Err(format!("Input image not found: {}", cli.image.display()).into());
    }
    if let Some(audio) = &cli.audio {
        if !audio.exists() {
            return Err(format!("Audio file not found: {}", audio.display()).into());
        }
    }
    if cli.channels != 1 && cli.channels != 2 {
        return Err(format!("Channels must be 1 or 2, got {}", cli.channels).into());
    }
    if cli.width == 0 || cli.height == 0 {
        return Err(format!("Resolution must be non-zero, got {}x{}", cli.width, cli.height).into());
    }
    if cli.fps == 0 {
        return Err("Frame rate must be at least 1".into());
    }
    if cli.audio.is_none() && cli.duration <= 0.0 {
        return Err(format!(
            "Duration must be positive when no audio is given, got {}",
            cli.duration
        )
        .into());
    }
    if cli.sample_rate == 0 {
        return Err("Sample rate must be non-zero".into());
    }
    Ok(())
}
