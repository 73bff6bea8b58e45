use std::time::Duration;

/// Frame length the recognition service is tuned for.
pub const DEFAULT_FRAME_MS: u32 = 100;

/// Bytes of 16-bit mono PCM covering `frame_ms` at `sample_rate`.
pub fn frame_len(sample_rate: u32, frame_ms: u32) -> anyhow::Result<usize> {
    if sample_rate == 0 || frame_ms == 0 {
        return Err(anyhow::anyhow!(
            "invalid frame geometry: sample_rate={}, frame_ms={}",
            sample_rate,
            frame_ms
        ));
    }
    let samples = (sample_rate as u64 * frame_ms as u64) / 1000;
    if samples == 0 {
        return Err(anyhow::anyhow!("frame of {}ms at {}Hz holds no samples", frame_ms, sample_rate));
    }
    Ok(samples as usize * 2)
}

/// Splits a PCM buffer into frames of `frame_len` bytes. The last frame keeps
/// whatever remains; frames are never padded.
pub fn split_for_frames(pcm: &[u8], frame_len: usize) -> impl Iterator<Item = &[u8]> {
    pcm.chunks(frame_len.max(1))
}

/// Playback duration of `byte_len` bytes of 16-bit mono PCM.
pub fn pcm16_duration(byte_len: usize, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    if byte_len % 2 != 0 {
        tracing::warn!("ignoring trailing byte of odd-length pcm buffer ({} bytes)", byte_len);
    }
    let samples = (byte_len / 2) as u64;
    Duration::from_micros(samples * 1_000_000 / sample_rate as u64)
}
