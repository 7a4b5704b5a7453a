//! RIFF/WAVE header inspection.

use super::AudioError;

fn read_u32_le(bytes: &[u8], offset: usize) -> Result<u32, AudioError> {
    bytes
        .get(offset..offset + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or(AudioError::Truncated)
}

/// Playback length of a WAV clip in milliseconds, rounded up.
///
/// Walks the RIFF chunks for `fmt ` (byte rate) and `data` (payload length).
/// A `data` size larger than the remaining bytes, as streamed WAVs declare,
/// is clamped to what is actually present.
pub fn duration_ms(bytes: &[u8]) -> Result<u64, AudioError> {
    if bytes.get(0..4) != Some(&b"RIFF"[..]) {
        return Err(AudioError::NotRiff);
    }
    if bytes.get(8..12) != Some(&b"WAVE"[..]) {
        return Err(AudioError::NotWave);
    }

    let mut byte_rate = None;
    let mut offset = 12;
    while offset + 8 <= bytes.len() {
        let id = &bytes[offset..offset + 4];
        let size = read_u32_le(bytes, offset + 4)? as usize;
        let body = offset + 8;

        match id {
            b"fmt " => byte_rate = Some(read_u32_le(bytes, body + 8)?),
            b"data" => {
                let byte_rate = byte_rate.ok_or(AudioError::MissingFormat)?;
                if byte_rate == 0 {
                    return Err(AudioError::ZeroByteRate);
                }
                let data_len = size.min(bytes.len() - body) as u64;
                let rate = u64::from(byte_rate);
                return Ok((data_len * 1000).div_ceil(rate));
            }
            _ => {}
        }

        // Chunks are word aligned
        offset = body.saturating_add(size).saturating_add(size & 1);
    }

    Err(AudioError::MissingData)
}

/// Builds a 16-bit PCM WAV file with `data_len` bytes of silence.
#[cfg(test)]
pub(crate) fn build_wav(sample_rate: u32, channels: u16, data_len: usize, extra_chunk: bool) -> Vec<u8> {
    use bytes::{BufMut, BytesMut};

    let byte_rate = sample_rate * u32::from(channels) * 2;
    let mut buf = BytesMut::new();
    buf.put_slice(b"RIFF");
    buf.put_u32_le(0);
    buf.put_slice(b"WAVE");
    buf.put_slice(b"fmt ");
    buf.put_u32_le(16);
    buf.put_u16_le(1);
    buf.put_u16_le(channels);
    buf.put_u32_le(sample_rate);
    buf.put_u32_le(byte_rate);
    buf.put_u16_le(channels * 2);
    buf.put_u16_le(16);
    if extra_chunk {
        buf.put_slice(b"LIST");
        buf.put_u32_le(3);
        buf.put_slice(&[0, 0, 0, 0]);
    }
    buf.put_slice(b"data");
    buf.put_u32_le(data_len as u32);
    buf.put_slice(&vec![0u8; data_len]);
    buf.to_vec()
}
