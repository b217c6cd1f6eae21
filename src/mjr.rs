//! Two-pass parser for the recorded-media container ("MJR") format.
//!
//! A recording file is a flat sequence of records: an 8-byte ASCII tag, a
//! 2-byte big-endian length, and that many payload bytes. Depending on the
//! tag, a record is either a one-time header (legacy or modern), an RTP
//! frame, or a non-RTP marker to be skipped.
//!
//! Grounded on `janus_play_get_frames` in the upstream plugin source. The
//! upstream implementation builds a backward-scanning doubly linked list;
//! here pass 2 collects every descriptor into a `Vec` and sorts it once,
//! which is friendlier to Rust ownership and ties for the same asymptotic
//! cost (see SPEC_FULL.md §9).

use crate::error::PlaybackError;
use std::cmp::Ordering;
use std::io::{Read, Seek, SeekFrom};

/// Minimum framed length for a record to be treated as an RTP frame rather
/// than a non-RTP marker.
pub const MIN_RTP_RECORD_LEN: usize = 12;

/// Audio/video clock rates in kHz, used by the scheduler for pacing.
pub const AUDIO_CLOCK_KHZ: u64 = 48;
pub const VIDEO_CLOCK_KHZ: u64 = 90;

/// One RTP packet's location and ordering key within the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDescriptor {
    pub seq: u16,
    pub ts: u64,
    pub len: u16,
    pub offset: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

/// Fields carried by a modern ("MJR") JSON info header. Absent for files
/// using the legacy preamble.
#[derive(Debug, Clone, PartialEq)]
pub struct ModernInfo {
    pub codec: String,
    pub created_ms: i64,
    pub first_frame_ms: i64,
}

/// The result of fully parsing one recording file.
#[derive(Debug, Default, Clone)]
pub struct ParsedRecording {
    pub kind: Option<MediaKind>,
    pub info: Option<ModernInfo>,
    pub frames: Vec<FrameDescriptor>,
}

enum TagKind {
    LegacyHeader,
    InfoHeader,
    Frame,
    Unknown,
}

fn classify_tag(tag: &[u8; 8], legacy_seen: bool, info_seen: bool) -> TagKind {
    if !info_seen && tag[0] == b'M' && tag[1] == b'J' {
        TagKind::InfoHeader
    } else if !legacy_seen && &tag[0..7] == b"MEETECH" {
        TagKind::LegacyHeader
    } else if tag[0] == b'M' && tag[1] == b'E' {
        TagKind::Frame
    } else {
        TagKind::Unknown
    }
}

fn read_tag_and_len<R: Read>(r: &mut R) -> std::io::Result<Option<([u8; 8], u16)>> {
    let mut tag = [0u8; 8];
    match r.read_exact(&mut tag) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let mut len_buf = [0u8; 2];
    r.read_exact(&mut len_buf)?;
    Ok(Some((tag, u16::from_be_bytes(len_buf))))
}

struct ResetState {
    first_ts: u32,
    reset: u32,
}

/// Pass 1: walk every frame record, reading only enough of the RTP header
/// to recover the 32-bit timestamp, and detect a mid-stream wraparound.
fn scan_pass1<R: Read + Seek>(r: &mut R) -> Result<ResetState, PlaybackError> {
    let mut legacy_seen = false;
    let mut info_seen = false;
    let mut first_ts: Option<u32> = None;
    let mut last_ts: u32 = 0;
    let mut reset: u32 = 0;

    loop {
        let Some((tag, len)) = read_tag_and_len(r)? else {
            break;
        };
        match classify_tag(&tag, legacy_seen, info_seen) {
            TagKind::LegacyHeader => {
                legacy_seen = true;
                if r.seek(SeekFrom::Current(len as i64)).is_err() {
                    break;
                }
            }
            TagKind::InfoHeader => {
                info_seen = true;
                if r.seek(SeekFrom::Current(len as i64)).is_err() {
                    break;
                }
            }
            TagKind::Frame => {
                if len as usize >= MIN_RTP_RECORD_LEN {
                    let to_read = (len as usize).min(16);
                    let mut buf = [0u8; 16];
                    if r.read_exact(&mut buf[..to_read]).is_err() {
                        break;
                    }
                    let t = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
                    if first_ts.is_none() {
                        first_ts = Some(if t > 1_000_000 { t - 1_000_000 } else { t });
                    }
                    if t < last_ts && last_ts - t > 2_000_000_000 {
                        reset = t;
                    } else if reset != 0 && t < reset {
                        reset = t;
                    }
                    last_ts = t;
                    if r.seek(SeekFrom::Current(len as i64 - to_read as i64)).is_err() {
                        break;
                    }
                } else if r.seek(SeekFrom::Current(len as i64)).is_err() {
                    break;
                }
            }
            TagKind::Unknown => return Err(PlaybackError::UnknownTag),
        }
    }

    Ok(ResetState {
        first_ts: first_ts.unwrap_or(0),
        reset,
    })
}

/// Pass 2: re-walk the records, this time building a `FrameDescriptor` for
/// every RTP frame and lifting its timestamp into the non-wrapping 64-bit
/// domain established by pass 1.
fn scan_pass2<R: Read + Seek>(
    r: &mut R,
    first_ts: u32,
    reset: u32,
) -> Result<ParsedRecording, PlaybackError> {
    let mut legacy_seen = false;
    let mut info_seen = false;
    let mut kind = None;
    let mut info = None;
    let mut frames = Vec::new();

    loop {
        let Some((tag, len)) = read_tag_and_len(r)? else {
            break;
        };
        match classify_tag(&tag, legacy_seen, info_seen) {
            TagKind::LegacyHeader => {
                legacy_seen = true;
                if len != 5 {
                    return Err(PlaybackError::MalformedInfoHeader("legacy-preamble-length".into()));
                }
                let mut buf = [0u8; 5];
                if r.read_exact(&mut buf).is_err() {
                    break;
                }
                kind = match buf[0] {
                    b'a' => Some(MediaKind::Audio),
                    b'v' => Some(MediaKind::Video),
                    _ => None,
                };
            }
            TagKind::InfoHeader => {
                info_seen = true;
                let mut buf = vec![0u8; len as usize];
                if r.read_exact(&mut buf).is_err() {
                    break;
                }
                let value: serde_json::Value = serde_json::from_slice(&buf)
                    .map_err(|_| PlaybackError::MalformedInfoHeader("info-json".into()))?;
                let t = value
                    .get("t")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| PlaybackError::MalformedInfoHeader("t".into()))?;
                kind = Some(match t {
                    "a" => MediaKind::Audio,
                    "v" => MediaKind::Video,
                    _ => return Err(PlaybackError::MalformedInfoHeader("t".into())),
                });
                let codec = value
                    .get("c")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| PlaybackError::MalformedInfoHeader("c".into()))?
                    .to_string();
                let created_ms = value
                    .get("s")
                    .and_then(|v| v.as_i64())
                    .ok_or_else(|| PlaybackError::MalformedInfoHeader("s".into()))?;
                let first_frame_ms = value
                    .get("u")
                    .and_then(|v| v.as_i64())
                    .ok_or_else(|| PlaybackError::MalformedInfoHeader("u".into()))?;
                info = Some(ModernInfo {
                    codec,
                    created_ms,
                    first_frame_ms,
                });
            }
            TagKind::Frame => {
                if len as usize >= MIN_RTP_RECORD_LEN {
                    let offset = r.stream_position()?;
                    let mut header = [0u8; 8];
                    if r.read_exact(&mut header).is_err() {
                        break;
                    }
                    let seq = u16::from_be_bytes([header[2], header[3]]);
                    let raw_ts = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
                    let ts: u64 = if reset == 0 {
                        raw_ts as u64
                    } else if raw_ts > first_ts {
                        raw_ts as u64
                    } else {
                        (1u64 << 32) + raw_ts as u64
                    };
                    frames.push(FrameDescriptor {
                        seq,
                        ts,
                        len,
                        offset,
                    });
                    if r.seek(SeekFrom::Current(len as i64 - 8)).is_err() {
                        break;
                    }
                } else if r.seek(SeekFrom::Current(len as i64)).is_err() {
                    break;
                }
            }
            TagKind::Unknown => return Err(PlaybackError::UnknownTag),
        }
    }

    frames.sort_by(compare_descriptors);
    Ok(ParsedRecording { kind, info, frames })
}

/// Break ties in `ts` by ascending `seq`, tolerating a 16-bit wraparound:
/// a seq that looks numerically smaller but is more than 10000 away from
/// its neighbor is treated as the wrapped successor, not a predecessor.
fn seq_cmp(a: u16, b: u16) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let diff = (a as i64 - b as i64).abs();
    let a_before_b = (a < b && diff < 10000) || (a > b && diff > 10000);
    if a_before_b {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

fn compare_descriptors(a: &FrameDescriptor, b: &FrameDescriptor) -> Ordering {
    a.ts.cmp(&b.ts).then_with(|| seq_cmp(a.seq, b.seq))
}

/// Parse a full recording from a seekable reader (typically an open file).
///
/// Returns [`PlaybackError::EmptyIndex`] if pass 2 produced no RTP frames —
/// the "no index" case callers must treat as "this track did not parse".
pub fn parse_recording<R: Read + Seek>(mut reader: R) -> Result<ParsedRecording, PlaybackError> {
    let reset_state = scan_pass1(&mut reader)?;
    reader.seek(SeekFrom::Start(0))?;
    let parsed = scan_pass2(&mut reader, reset_state.first_ts, reset_state.reset)?;
    if parsed.frames.is_empty() {
        return Err(PlaybackError::EmptyIndex);
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn record(tag: &[u8], payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut tag8 = [0u8; 8];
        tag8[..tag.len()].copy_from_slice(tag);
        out.extend_from_slice(&tag8);
        out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn rtp_payload(seq: u16, ts: u32) -> Vec<u8> {
        let mut p = vec![0x80, 0x00];
        p.extend_from_slice(&seq.to_be_bytes());
        p.extend_from_slice(&ts.to_be_bytes());
        p.extend_from_slice(&0u32.to_be_bytes()); // ssrc
        p
    }

    fn legacy_file(frames: &[(u16, u32)]) -> Vec<u8> {
        let mut buf = record(b"MEETECH", b"v0001");
        for (seq, ts) in frames {
            buf.extend(record(b"ME", &rtp_payload(*seq, *ts)));
        }
        buf
    }

    fn modern_file(kind: &str, frames: &[(u16, u32)]) -> Vec<u8> {
        let info = format!(r#"{{"t":"{kind}","c":"vp8","s":1000,"u":2000}}"#);
        let mut buf = record(b"MJR00002", info.as_bytes());
        for (seq, ts) in frames {
            buf.extend(record(b"ME", &rtp_payload(*seq, *ts)));
        }
        buf
    }

    #[test]
    fn parses_legacy_header_and_orders_by_ts() {
        let data = legacy_file(&[(10, 1960), (9, 1000), (11, 2920)]);
        let parsed = parse_recording(Cursor::new(data)).unwrap();
        assert_eq!(parsed.kind, Some(MediaKind::Video));
        let tss: Vec<u64> = parsed.frames.iter().map(|f| f.ts).collect();
        assert_eq!(tss, vec![1000, 1960, 2920]);
        let seqs: Vec<u16> = parsed.frames.iter().map(|f| f.seq).collect();
        assert_eq!(seqs, vec![9, 10, 11]);
    }

    #[test]
    fn parses_modern_header_info_fields() {
        let data = modern_file("a", &[(1, 100)]);
        let parsed = parse_recording(Cursor::new(data)).unwrap();
        assert_eq!(parsed.kind, Some(MediaKind::Audio));
        let info = parsed.info.unwrap();
        assert_eq!(info.codec, "vp8");
        assert_eq!(info.created_ms, 1000);
        assert_eq!(info.first_frame_ms, 2000);
    }

    #[test]
    fn malformed_info_header_is_a_hard_error() {
        let info = br#"{"t":"a"}"#; // missing c/s/u
        let data = record(b"MJR00002", info);
        let err = parse_recording(Cursor::new(data)).unwrap_err();
        assert!(matches!(err, PlaybackError::MalformedInfoHeader(_)));
    }

    #[test]
    fn empty_index_when_no_frames_parse() {
        let data = record(b"MJR00002", br#"{"t":"a","c":"opus","s":1,"u":2}"#);
        let err = parse_recording(Cursor::new(data)).unwrap_err();
        assert!(matches!(err, PlaybackError::EmptyIndex));
    }

    #[test]
    fn wraparound_is_lifted_into_non_wrapping_domain() {
        // Rises near the 32-bit boundary, wraps to a small value, rises again.
        let frames = [
            (1u16, 0xFFFFFF00u32),
            (2, 0xFFFFFF90),
            (3, 0x00000100),
            (4, 0x00000200),
        ];
        let data = modern_file("v", &frames);
        let parsed = parse_recording(Cursor::new(data)).unwrap();
        let tss: Vec<u64> = parsed.frames.iter().map(|f| f.ts).collect();
        for pair in tss.windows(2) {
            assert!(pair[1] > pair[0], "expected strictly increasing ts, got {tss:?}");
        }
    }

    #[test]
    fn offset_integrity_reads_back_original_packet() {
        let payload = rtp_payload(42, 5000);
        let data = record(b"ME", &payload);
        let parsed = parse_recording(Cursor::new(data.clone()));
        // A lone frame record with no header still parses (no header tags
        // seen just means `kind`/`info` stay `None`).
        let parsed = parsed.unwrap();
        let d = parsed.frames[0];
        let slice = &data[d.offset as usize..d.offset as usize + d.len as usize];
        assert_eq!(slice, payload.as_slice());
    }

    #[test]
    fn picture_slices_share_identical_ts_and_stay_adjacent() {
        let data = modern_file("v", &[(1, 100), (2, 100), (3, 4600)]);
        let parsed = parse_recording(Cursor::new(data)).unwrap();
        assert_eq!(parsed.frames[0].ts, parsed.frames[1].ts);
        assert!(parsed.frames[2].ts > parsed.frames[1].ts);
    }

    #[test]
    fn unknown_tag_is_a_hard_parse_error() {
        let data = record(b"XXXXXXX1", b"hello");
        let err = parse_recording(Cursor::new(data)).unwrap_err();
        assert!(matches!(err, PlaybackError::UnknownTag));
    }
}
