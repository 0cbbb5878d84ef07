/// Encoding parameters for a container writer, fixed once the writer opens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriterConfig {
    /// Video bitrate in bits per second.
    pub video_bit_rate: usize,
    /// Audio bitrate in bits per second.
    pub audio_bit_rate: usize,
    /// Audio sample rate in Hz.
    pub sample_rate: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Channel count of the samples the caller supplies (1 or 2).
    pub channels: u16,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            video_bit_rate: 4_000_000,
            audio_bit_rate: 128_000,
            sample_rate: 44_100,
            width: 1920,
            height: 1080,
            fps: 25,
            channels: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WriterConfig::default();
        assert_eq!(config.video_bit_rate, 4_000_000);
        assert_eq!(config.audio_bit_rate, 128_000);
        assert_eq!(config.sample_rate, 44_100);
        assert_eq!(config.width, 1920);
        assert_eq!(config.height, 1080);
        assert_eq!(config.fps, 25);
        assert_eq!(config.channels, 2);
    }

    #[test]
    fn test_overrides() {
        let config = WriterConfig {
            width: 320,
            height: 240,
            fps: 10,
            ..Default::default()
        };
        assert_eq!(config.width, 320);
        assert_eq!(config.height, 240);
        assert_eq!(config.fps, 10);
        assert_eq!(config.channels, 2);
    }
}
