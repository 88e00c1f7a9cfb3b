/*
 * Frame multiplexer that extracts NMEA, SiRF and UBX frames from
 * arbitrary byte streams
 *
 * The protocols share no framing, so every offset is tried with all
 * detectors until one of them claims the bytes. Whatever lies between
 * accepted frames is junk.
 */

use log::trace;

use crate::frame::{FrameResult, MessageMetadata, Protocol};
use crate::{parser_nmea, parser_sirf, parser_ubx};

/// Size of the assembly buffer used by the reader
pub const BUF_SIZE: usize = 8192;

type Detector = fn(&[u8]) -> FrameResult;

// Order matters for determinism only, the sync bytes are disjoint
const DETECTORS: [(Protocol, Detector); 3] = [
    (Protocol::Nmea, parser_nmea::classify),
    (Protocol::Sirf, parser_sirf::classify),
    (Protocol::Ublox, parser_ubx::classify),
];

/// Locates the first frame or frame candidate in `buf[start..end]`.
///
/// Returns the offset of the frame and its metadata. A truncated candidate
/// extends to `end`.
pub fn find_message(buf: &[u8], start: usize, end: usize) -> Option<(usize, MessageMetadata)> {
    let end = end.min(buf.len());

    for pos in start..end {
        let window = &buf[pos..end];
        for (protocol, classify) in DETECTORS.iter() {
            let metadata = match classify(window) {
                FrameResult::NotThisProtocol => continue,
                FrameResult::Truncated => MessageMetadata {
                    protocol: *protocol,
                    size: end - pos,
                    is_truncated: true,
                },
                FrameResult::Valid(size) => MessageMetadata {
                    protocol: *protocol,
                    size,
                    is_truncated: false,
                },
            };
            return Some((pos, metadata));
        }
    }

    None
}

pub fn find_next_message(buf: &[u8], start: usize) -> Option<(usize, MessageMetadata)> {
    find_message(buf, start, buf.len())
}

/// Assembly buffer between the byte channel and the decoders.
///
/// New bytes are written into `spare_mut()` and made visible with
/// `commit()`. `process()` hands every complete frame to a callback and
/// keeps an incomplete tail for the next round.
pub struct StreamParser {
    buf: Vec<u8>,
    len: usize,
}

impl StreamParser {
    pub fn new() -> Self {
        Self::with_capacity(BUF_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0);
        Self {
            buf: vec![0; capacity],
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Free space at the end of the buffer.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.len..]
    }

    pub fn commit(&mut self, count: usize) {
        assert!(self.len + count <= self.buf.len());
        self.len += count;
    }

    /// Copies as much of `data` as fits and returns the number of bytes taken.
    pub fn extend(&mut self, data: &[u8]) -> usize {
        let count = data.len().min(self.buf.len() - self.len);
        self.spare_mut()[..count].copy_from_slice(&data[..count]);
        self.commit(count);
        count
    }

    /// Runs the multiplexer over the buffered bytes.
    ///
    /// Calls `handler` for each complete frame in stream order and returns
    /// the number of junk bytes dropped. A truncated candidate is moved to
    /// the start of the buffer. If such a candidate fills the whole buffer
    /// its first byte is dropped as junk so the scan always advances.
    pub fn process<F>(&mut self, mut handler: F) -> usize
    where
        F: FnMut(&[u8], &MessageMetadata),
    {
        let end = self.len;
        let mut junk = 0;
        let mut next = 0;

        while next < end {
            let (pos, metadata) = match find_message(&self.buf, next, end) {
                Some(found) => found,
                None => {
                    junk += end - next;
                    next = end;
                    break;
                }
            };

            junk += pos - next;

            if !metadata.is_truncated {
                handler(&self.buf[pos..pos + metadata.size], &metadata);
                next = pos + metadata.size;
            } else if pos != 0 {
                self.buf.copy_within(pos..end, 0);
                self.len = end - pos;
                trace!("keeping {} bytes of truncated {} frame", self.len, metadata.protocol);
                return junk;
            } else if end == self.buf.len() {
                trace!("buffer full with truncated {} frame, dropping one byte", metadata.protocol);
                junk += 1;
                next = 1;
            } else {
                // Incomplete frame already at the start, wait for more data
                return junk;
            }
        }

        debug_assert_eq!(next, end);
        self.len = 0;
        junk
    }
}

impl Default for StreamParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{nmea_sentence, SirfFrame, UbxFrame};

    const RMC: &[u8] = b"$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A\r\n";

    fn collect(uut: &mut StreamParser) -> (Vec<(Protocol, Vec<u8>)>, usize) {
        let mut frames = Vec::new();
        let junk = uut.process(|msg, metadata| {
            assert_eq!(msg.len(), metadata.size);
            assert!(!metadata.is_truncated);
            frames.push((metadata.protocol, msg.to_vec()));
        });
        (frames, junk)
    }

    #[test]
    fn find_after_junk() {
        let mut buf = b"xyz\r\n".to_vec();
        buf.extend_from_slice(RMC);

        let (pos, metadata) = find_next_message(&buf, 0).unwrap();
        assert_eq!(pos, 5);
        assert_eq!(metadata, MessageMetadata { protocol: Protocol::Nmea, size: RMC.len(), is_truncated: false });
    }

    #[test]
    fn find_nothing() {
        assert_eq!(find_next_message(b"hello world", 0), None);
        assert_eq!(find_next_message(b"", 0), None);
        assert_eq!(find_message(RMC, 3, RMC.len()), None);
    }

    #[test]
    fn find_truncated() {
        let mut buf = vec![0x00, 0x11];
        buf.extend_from_slice(&RMC[..20]);

        let (pos, metadata) = find_next_message(&buf, 0).unwrap();
        assert_eq!(pos, 2);
        assert_eq!(metadata, MessageMetadata { protocol: Protocol::Nmea, size: 20, is_truncated: true });
    }

    #[test]
    fn find_respects_end() {
        // the sentence is complete in the buffer but not inside the window
        let (pos, metadata) = find_message(RMC, 0, RMC.len() - 1).unwrap();
        assert_eq!(pos, 0);
        assert!(metadata.is_truncated);
    }

    #[test]
    fn find_binary() {
        let sirf = SirfFrame::construct([0x02, 0x00, 0x01].to_vec()).to_bytes();
        let ubx = UbxFrame::construct(0x05, 0x01, [0x06, 0x01].to_vec()).to_bytes();
        let mut buf = vec![0xA0, 0xB5];
        buf.extend_from_slice(&sirf);
        buf.push(0x62);
        buf.extend_from_slice(&ubx);

        let (pos, metadata) = find_next_message(&buf, 0).unwrap();
        assert_eq!((pos, metadata.protocol, metadata.size), (2, Protocol::Sirf, sirf.len()));

        let (pos, metadata) = find_next_message(&buf, pos + metadata.size).unwrap();
        assert_eq!((pos, metadata.protocol, metadata.size), (3 + sirf.len(), Protocol::Ublox, ubx.len()));
    }

    #[test]
    fn idempotent_rescan() {
        let junk = b"\x00garbage$GP\x01\xB5\xA0\xFF";
        let mut buf = junk.to_vec();
        buf.extend_from_slice(RMC);

        let expected = find_next_message(&buf, 0).unwrap();
        assert_eq!(expected.0, junk.len());
        for start in 0..=junk.len() {
            assert_eq!(find_next_message(&buf, start), Some(expected), "start {}", start);
        }
    }

    #[test]
    fn process_frames_and_junk() {
        let gga = nmea_sentence("GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,");
        let ubx = UbxFrame::construct(0x0A, 0x04, [].to_vec()).to_bytes();

        let mut uut = StreamParser::new();
        uut.extend(b"abc");
        uut.extend(&gga);
        uut.extend(b"\r\n");
        uut.extend(&ubx);
        uut.extend(RMC);
        uut.extend(b"zz");

        let (frames, junk) = collect(&mut uut);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0], (Protocol::Nmea, gga));
        assert_eq!(frames[1], (Protocol::Ublox, ubx));
        assert_eq!(frames[2], (Protocol::Nmea, RMC.to_vec()));
        assert_eq!(junk, 3 + 2 + 2);
        assert!(uut.is_empty());
    }

    #[test]
    fn process_split_frame() {
        let mut uut = StreamParser::new();
        uut.extend(b"junk");
        uut.extend(&RMC[..30]);

        let (frames, junk) = collect(&mut uut);
        assert!(frames.is_empty());
        assert_eq!(junk, 4);
        assert_eq!(uut.len(), 30);

        // nothing changes while the candidate stays incomplete
        let (frames, junk) = collect(&mut uut);
        assert!(frames.is_empty());
        assert_eq!(junk, 0);
        assert_eq!(uut.len(), 30);

        let rest = &RMC[30..];
        uut.spare_mut()[..rest.len()].copy_from_slice(rest);
        uut.commit(rest.len());

        let (frames, junk) = collect(&mut uut);
        assert_eq!(frames, vec![(Protocol::Nmea, RMC.to_vec())]);
        assert_eq!(junk, 0);
        assert!(uut.is_empty());
    }

    #[test]
    fn process_byte_by_byte() {
        let sirf = SirfFrame::construct([0x29; 20].to_vec()).to_bytes();
        let mut stream = RMC.to_vec();
        stream.extend_from_slice(&sirf);
        stream.extend_from_slice(RMC);

        let mut uut = StreamParser::with_capacity(256);
        let mut frames = Vec::new();
        let mut junk = 0;
        for byte in stream.iter() {
            assert_eq!(uut.extend(&[*byte]), 1);
            let (mut f, j) = collect(&mut uut);
            frames.append(&mut f);
            junk += j;
        }

        assert_eq!(junk, 0);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[1], (Protocol::Sirf, sirf));
    }

    #[test]
    fn buffer_full_liveness() {
        // never terminated NMEA candidate that outgrows the buffer
        let mut stream = vec![b'$'; 300];
        stream.push(0x00);
        stream.extend_from_slice(RMC);

        let mut uut = StreamParser::with_capacity(128);
        let mut fed = 0;
        let mut frames = Vec::new();
        let mut junk = 0;
        let mut rounds = 0;
        while fed < stream.len() || !uut.is_empty() {
            fed += uut.extend(&stream[fed..]);
            let (mut f, j) = collect(&mut uut);
            frames.append(&mut f);
            junk += j;

            rounds += 1;
            assert!(rounds < 1000, "scan stalled");
        }

        assert_eq!(frames, vec![(Protocol::Nmea, RMC.to_vec())]);
        assert_eq!(junk, 301);
    }

    #[test]
    fn buffer_full_recovers_frame() {
        // UBX header announcing a huge payload hides a sentence
        let mut uut = StreamParser::with_capacity(128);
        uut.extend(&[0xB5, 0x62, 0x01, 0x07, 0x00, 0x0F]);
        uut.extend(&[0x20; 10]);
        uut.extend(RMC);
        let fill = uut.capacity() - uut.len();
        uut.extend(&vec![0x20; fill]);

        let (frames, junk) = collect(&mut uut);
        assert_eq!(frames, vec![(Protocol::Nmea, RMC.to_vec())]);
        assert_eq!(junk, 128 - RMC.len());
        assert!(uut.is_empty());
    }

    #[test]
    fn extend_limited() {
        let mut uut = StreamParser::with_capacity(10);
        assert_eq!(uut.extend(b"0123456"), 7);
        assert_eq!(uut.extend(b"789abc"), 3);
        assert_eq!(uut.len(), 10);
        assert!(uut.spare_mut().is_empty());
        uut.clear();
        assert_eq!(uut.spare_mut().len(), 10);
    }
}
