use std::collections::VecDeque;

/// Trailing header of every packet, as seen from the newest-first block
/// (the 0x68 lands oldest on the wire).
pub const PACKET_HEADER: [u8; 5] = [0x04, 0x68, 0x13, 0x13, 0x68];

/// Frame-end delimiter; the newest byte of a complete packet.
pub const FRAME_END: u8 = 0x16;

/// Smallest packet that still carries 7 values, a checksum, the end byte,
/// and the header.
pub const MIN_PACKET_LEN: usize = 21;

/// Default wire packet length for the six-channel head.
pub const DEFAULT_PACKET_LEN: usize = 25;

/// Full-scale conversion from raw counts to nanoamperes.
pub const CURRENT_GAIN_NA: f64 = 50.0 / ((1 << 15) as f64 - 1.0);

/// One validated device sample: six channel currents plus temperature,
/// still in raw signed counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodedFrame {
    pub channels: [i16; 6],
    pub temperature_raw: i16,
}

impl DecodedFrame {
    /// Channel currents in nanoamperes, in wiring order ch1..ch6.
    pub fn currents_na(&self) -> [f64; 6] {
        let mut out = [0.0; 6];
        for (slot, raw) in out.iter_mut().zip(self.channels) {
            *slot = f64::from(raw) * CURRENT_GAIN_NA;
        }
        out
    }

    pub fn temperature_c(&self) -> f64 {
        f64::from(self.temperature_raw) / 16.0
    }
}

/// Sliding-block framer for the sensor's fixed-length packets.
///
/// Every incoming byte is pushed to the front of a block holding the last
/// `packet_len` bytes (newest first, mirroring the device software), and the
/// whole block is re-validated. A failed candidate is simply not a packet
/// yet; the next byte shifts the block and retries, so resynchronisation
/// after noise needs no extra state.
pub struct FrameDecoder {
    block: VecDeque<u8>,
    packet_len: usize,
}

impl FrameDecoder {
    /// `packet_len` must be at least [`MIN_PACKET_LEN`]; the config layer
    /// enforces that before a decoder is built.
    pub fn new(packet_len: usize) -> Self {
        debug_assert!(packet_len >= MIN_PACKET_LEN);
        Self {
            // Zero-filled so the block is always exactly packet_len long.
            // All-zero bytes can never validate (header mismatch).
            block: std::iter::repeat(0u8).take(packet_len).collect(),
            packet_len,
        }
    }

    pub fn packet_len(&self) -> usize {
        self.packet_len
    }

    /// Feed one byte; returns a frame when the block aligns on a valid
    /// packet.
    pub fn push_byte(&mut self, byte: u8) -> Option<DecodedFrame> {
        self.block.push_front(byte);
        self.block.pop_back();
        if self.validate() {
            Some(self.decode())
        } else {
            None
        }
    }

    fn validate(&self) -> bool {
        let len = self.packet_len;
        if self.block[0] != FRAME_END {
            return false;
        }
        for (offset, expected) in PACKET_HEADER.iter().enumerate() {
            if self.block[len - 5 + offset] != *expected {
                return false;
            }
        }
        // The device sums everything between the checksum byte and the last
        // four header bytes, so the leading 0x04 of the header is covered.
        let mut cks: u8 = 0;
        for i in 2..len - 4 {
            cks = cks.wrapping_add(self.block[i]);
        }
        cks == self.block[1]
    }

    fn decode(&self) -> DecodedFrame {
        // Data region sits between the checksum and the header, newest
        // first; walking it backwards restores wire order, and consecutive
        // pairs are big-endian two's-complement words. Packets longer than
        // 7 words pad the tail; the pad words are ignored.
        let len = self.packet_len;
        let mut words = [0i16; 7];
        for (w, word) in words.iter_mut().enumerate() {
            let hi = self.block[len - 6 - 2 * w];
            let lo = self.block[len - 7 - 2 * w];
            *word = i16::from_be_bytes([hi, lo]);
        }
        DecodedFrame {
            channels: [words[0], words[1], words[2], words[3], words[4], words[5]],
            temperature_raw: words[6],
        }
    }
}

/// Serialize a frame into its wire byte order. Lives here so replay capture
/// generators and tests build packets the same way the device does.
pub fn encode_packet(channels: [i16; 6], temperature_raw: i16) -> Vec<u8> {
    let mut wire = Vec::with_capacity(DEFAULT_PACKET_LEN);
    // Header arrives oldest-first, i.e. reversed relative to PACKET_HEADER.
    wire.extend(PACKET_HEADER.iter().rev());
    for value in channels.iter().chain(std::iter::once(&temperature_raw)) {
        wire.extend(value.to_be_bytes());
    }
    // Two reserved pad words.
    wire.extend([0u8; 4]);
    // Checksum covers the data region plus the 0x04 that closes the header
    // on the wire, exactly like the firmware computes it.
    let cks = wire[4..].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    wire.push(cks);
    wire.push(FRAME_END);
    wire
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(decoder: &mut FrameDecoder, bytes: &[u8]) -> Vec<DecodedFrame> {
        bytes
            .iter()
            .filter_map(|b| decoder.push_byte(*b))
            .collect()
    }

    #[test]
    fn zero_block_never_validates() {
        let mut decoder = FrameDecoder::new(DEFAULT_PACKET_LEN);
        assert!(decode_all(&mut decoder, &[0u8; 200]).is_empty());
    }

    #[test]
    fn valid_packet_decodes_once() {
        let frame = DecodedFrame {
            channels: [100, -200, 300, -400, 500, -600],
            temperature_raw: 352,
        };
        let wire = encode_packet(frame.channels, frame.temperature_raw);
        let mut decoder = FrameDecoder::new(DEFAULT_PACKET_LEN);
        let frames = decode_all(&mut decoder, &wire);
        assert_eq!(frames, vec![frame]);
    }

    #[test]
    fn packet_survives_surrounding_noise() {
        let wire = encode_packet([1, 2, 3, 4, 5, 6], 160);
        let mut stream = vec![0xAA, 0x13, 0x68, 0x16, 0x04, 0xFF, 0x00];
        stream.extend(&wire);
        stream.extend([0x99, 0x16, 0x68, 0x13]);
        let mut decoder = FrameDecoder::new(DEFAULT_PACKET_LEN);
        let frames = decode_all(&mut decoder, &stream);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].channels, [1, 2, 3, 4, 5, 6]);
        assert_eq!(frames[0].temperature_raw, 160);
    }

    #[test]
    fn checksum_byte_mutation_invalidates() {
        let wire = encode_packet([10, 20, 30, 40, 50, 60], 0);
        // Wire positions 4..=22 are checksum-covered (header 0x04 plus the
        // data region). Flip a data byte without fixing the checksum.
        for pos in 5..23 {
            let mut corrupted = wire.clone();
            corrupted[pos] = corrupted[pos].wrapping_add(1);
            let mut decoder = FrameDecoder::new(DEFAULT_PACKET_LEN);
            assert!(
                decode_all(&mut decoder, &corrupted).is_empty(),
                "mutation at wire position {pos} should break validation"
            );
        }
    }

    #[test]
    fn compensating_mutations_preserve_validation() {
        let mut wire = encode_packet([10, 20, 30, 40, 50, 60], 0);
        // +1 on one covered byte, -1 on another: mod-256 sum unchanged.
        wire[21] = wire[21].wrapping_add(1);
        wire[22] = wire[22].wrapping_sub(1);
        let mut decoder = FrameDecoder::new(DEFAULT_PACKET_LEN);
        assert_eq!(decode_all(&mut decoder, &wire).len(), 1);
    }

    #[test]
    fn signed_words_round_trip_across_range() {
        for raw in [-32767i16, -32768, -1, 0, 1, 127, -128, 255, 32767] {
            let wire = encode_packet([raw; 6], raw);
            let mut decoder = FrameDecoder::new(DEFAULT_PACKET_LEN);
            let frames = decode_all(&mut decoder, &wire);
            assert_eq!(frames.len(), 1, "raw value {raw}");
            assert_eq!(frames[0].channels, [raw; 6]);
            assert_eq!(frames[0].temperature_raw, raw);
        }
    }

    #[test]
    fn back_to_back_packets_each_decode() {
        let mut stream = encode_packet([1; 6], 16);
        stream.extend(encode_packet([2; 6], 32));
        stream.extend(encode_packet([3; 6], 48));
        let mut decoder = FrameDecoder::new(DEFAULT_PACKET_LEN);
        let frames = decode_all(&mut decoder, &stream);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[1].channels, [2; 6]);
        assert_eq!(frames[2].temperature_c(), 3.0);
    }

    #[test]
    fn physical_conversions() {
        let frame = DecodedFrame {
            channels: [32767, -32767, 0, 0, 0, 0],
            temperature_raw: 400,
        };
        let currents = frame.currents_na();
        assert!((currents[0] - 50.0).abs() < 1e-9);
        assert!((currents[1] + 50.0).abs() < 1e-9);
        assert_eq!(frame.temperature_c(), 25.0);
    }
}
