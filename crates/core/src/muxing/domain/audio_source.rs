/// Supplies raw audio as interleaved 32-bit float samples in [-1.0, 1.0].
pub trait AudioSource: Send {
    /// Fill `buf` with up to `buf.len()` interleaved samples.
    ///
    /// Returns the number of samples written; 0 signals exhaustion.
    fn read(&mut self, buf: &mut [f32]) -> Result<usize, Box<dyn std::error::Error>>;
}
