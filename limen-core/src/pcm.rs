//! Little-endian 16-bit PCM decoding.
//!
//! The wire format is fixed: raw bytes, concatenated little-endian
//! signed 16-bit mono samples. An odd trailing byte carries no complete
//! sample and is dropped.

/// Decode raw little-endian bytes into i16 samples.
pub fn decode_i16le(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Encode i16 samples into little-endian bytes.
pub fn encode_i16le(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_little_endian_pairs() {
        // 0x0100 = 256, 0xFFFF = -1
        let bytes = [0x00, 0x01, 0xFF, 0xFF];
        assert_eq!(decode_i16le(&bytes), vec![256, -1]);
    }

    #[test]
    fn odd_trailing_byte_is_dropped() {
        let bytes = [0x00, 0x01, 0x7F];
        assert_eq!(decode_i16le(&bytes), vec![256]);
    }

    #[test]
    fn empty_input_decodes_to_nothing() {
        assert!(decode_i16le(&[]).is_empty());
    }

    #[test]
    fn encode_round_trips_decode() {
        let samples = vec![0, 1, -1, i16::MAX, i16::MIN];
        assert_eq!(decode_i16le(&encode_i16le(&samples)), samples);
    }
}
