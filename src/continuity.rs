//! RTP continuity rewriter.
//!
//! Splices playback packets into a live peer connection's sequence-number
//! and timestamp domain so that, from the downstream peer's point of view,
//! the packet stream looks like one continuous, monotonically advancing
//! RTP session — even though it was assembled from on-disk frames that had
//! their own unrelated SSRC/seq/ts domain.
//!
//! Grounded on `janus_rtp_header_update2` in the upstream plugin source.

/// Per-direction splicing state. One of these exists per media direction
/// (audio, video) for the lifetime of a playback session.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectionContext {
    pub last_ssrc: u32,
    pub base_ts: u32,
    pub base_ts_prev: u32,
    pub last_ts: u32,
    pub prev_ts: u32,
    pub base_seq: u16,
    pub base_seq_prev: u16,
    pub last_seq: u16,
    pub prev_seq: u16,
    pub last_wall_time_us: i64,
    pub seq_reset: bool,
    pub new_ssrc: bool,
}

/// Audio/video pair of [`DirectionContext`], plus the compatibility toggle
/// for the upstream sequence-reset bug (see module docs and DESIGN.md).
#[derive(Debug, Default, Clone, Copy)]
pub struct ContinuityContext {
    pub audio: DirectionContext,
    pub video: DirectionContext,

    /// When set, the audio direction's sequence-reset branch bumps the
    /// *video* direction's `base_ts_prev` instead of its own, reproducing a
    /// copy-paste bug present in the upstream implementation. Off by
    /// default; only needed for bit-for-bit parity against recordings
    /// captured through the buggy path.
    pub replicate_upstream_seq_reset_bug: bool,
}

impl ContinuityContext {
    /// Mark both directions as having just begun a fresh playout, so the
    /// next packet in each direction takes the sequence-reset branch below.
    pub fn reset_for_new_playout(&mut self) {
        self.audio.seq_reset = true;
        self.video.seq_reset = true;
    }

    /// Rewrite an outgoing packet's header in place so it continues the
    /// monotonic stream this context has been tracking.
    ///
    /// `step` is ABI-compatibility ballast carried over from the upstream
    /// interface; it is accepted but not used.
    pub fn rewrite_header(&mut self, header: &mut [u8], is_video: bool, _step: u32, now_us: i64) {
        debug_assert!(header.len() >= 12, "RTP header must be at least 12 bytes");

        let raw_seq = u16::from_be_bytes([header[2], header[3]]);
        let raw_ts = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
        let raw_ssrc = u32::from_be_bytes([header[8], header[9], header[10], header[11]]);
        let payload_type = header[1] & 0x7f;

        let ContinuityContext {
            audio,
            video,
            replicate_upstream_seq_reset_bug,
        } = self;
        let (ctx, other) = if is_video { (video, audio) } else { (audio, video) };

        if raw_ssrc != ctx.last_ssrc {
            ctx.base_ts = raw_ts;
            ctx.base_ts_prev = ctx.last_ts;
            ctx.base_seq = raw_seq;
            ctx.base_seq_prev = ctx.last_seq;

            if ctx.last_wall_time_us > 0 {
                let time_diff_us = now_us - ctx.last_wall_time_us;
                let rate_per_ms: i64 = if is_video {
                    90
                } else if matches!(payload_type, 0 | 8 | 9) {
                    8
                } else {
                    48
                };
                let mut scaled = (time_diff_us * rate_per_ms) / 1000;
                if scaled < 1 {
                    scaled = 1;
                }
                let scaled = scaled as u32;
                ctx.base_ts_prev = ctx.base_ts_prev.wrapping_add(scaled);
                ctx.last_ts = ctx.last_ts.wrapping_add(scaled);
                if !is_video {
                    ctx.prev_ts = ctx.prev_ts.wrapping_add(scaled);
                }
            }

            ctx.new_ssrc = true;
            ctx.last_ssrc = raw_ssrc;
        }

        if ctx.seq_reset {
            ctx.base_seq_prev = ctx.last_seq;
            ctx.base_seq = raw_seq;
            let bump = ctx.last_ts.wrapping_add(2000);
            ctx.seq_reset = false;

            if !is_video && *replicate_upstream_seq_reset_bug {
                other.base_ts_prev = bump;
            } else {
                ctx.base_ts_prev = bump;
            }
        }

        ctx.prev_ts = ctx.last_ts;
        ctx.prev_seq = ctx.last_seq;
        ctx.last_ts = raw_ts.wrapping_sub(ctx.base_ts).wrapping_add(ctx.base_ts_prev);
        ctx.last_seq = raw_seq
            .wrapping_sub(ctx.base_seq)
            .wrapping_add(ctx.base_seq_prev)
            .wrapping_add(1);
        ctx.last_wall_time_us = now_us;

        header[2..4].copy_from_slice(&ctx.last_seq.to_be_bytes());
        header[4..8].copy_from_slice(&ctx.last_ts.to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(seq: u16, ts: u32, ssrc: u32) -> Vec<u8> {
        let mut h = vec![0x80, 0x60];
        h.extend_from_slice(&seq.to_be_bytes());
        h.extend_from_slice(&ts.to_be_bytes());
        h.extend_from_slice(&ssrc.to_be_bytes());
        h
    }

    fn read_seq(h: &[u8]) -> u16 {
        u16::from_be_bytes([h[2], h[3]])
    }

    fn read_ts(h: &[u8]) -> u32 {
        u32::from_be_bytes([h[4], h[5], h[6], h[7]])
    }

    #[test]
    fn sequence_numbers_are_gap_free_across_a_playback() {
        let mut ctx = ContinuityContext::default();
        ctx.reset_for_new_playout();

        let mut seqs = Vec::new();
        for i in 0..5u16 {
            let mut h = header(100 + i, 1000 + i as u32 * 160, 0xAAAA);
            ctx.rewrite_header(&mut h, false, 960, 1_000_000 + i as i64 * 20_000);
            seqs.push(read_seq(&h));
        }

        for w in seqs.windows(2) {
            assert_eq!(w[1], w[0].wrapping_add(1));
        }
    }

    #[test]
    fn ssrc_change_keeps_timestamps_ahead_of_elapsed_wall_time() {
        let mut ctx = ContinuityContext::default();
        ctx.reset_for_new_playout();

        let mut h1 = header(1, 1000, 0x1111);
        ctx.rewrite_header(&mut h1, true, 4500, 1_000_000);
        let last_ts_before = read_ts(&h1);

        // 100 ms later, a new SSRC appears (splice boundary).
        let mut h2 = header(1, 5000, 0x2222);
        ctx.rewrite_header(&mut h2, true, 4500, 1_100_000);
        let ts_after = read_ts(&h2);

        let rate = 90i64; // video kHz
        let expected_min = last_ts_before.wrapping_add((100_000 * rate / 1000) as u32);
        assert!(ts_after >= expected_min);
    }

    #[test]
    fn seq_reset_bug_is_off_by_default() {
        let mut ctx = ContinuityContext::default();
        assert!(!ctx.replicate_upstream_seq_reset_bug);

        ctx.reset_for_new_playout();
        let mut h = header(1, 1000, 0x1);
        ctx.rewrite_header(&mut h, false, 960, 1_000_000);

        // Fixed behavior: the audio branch must not have touched video's
        // base_ts_prev field away from its default.
        assert_eq!(ctx.video.base_ts_prev, 0);
        assert_ne!(ctx.audio.base_ts_prev, 0);
    }

    #[test]
    fn seq_reset_bug_replicates_when_toggled_on() {
        let mut ctx = ContinuityContext {
            replicate_upstream_seq_reset_bug: true,
            ..Default::default()
        };
        ctx.reset_for_new_playout();

        let mut h = header(1, 1000, 0x1);
        ctx.rewrite_header(&mut h, false, 960, 1_000_000);

        // Bug reproduced: audio's seq-reset wrote into video's field.
        assert_ne!(ctx.video.base_ts_prev, 0);
        assert_eq!(ctx.audio.base_ts_prev, 0);
    }

    #[test]
    fn video_branch_always_bumps_its_own_field() {
        let mut ctx = ContinuityContext {
            replicate_upstream_seq_reset_bug: true,
            ..Default::default()
        };
        ctx.reset_for_new_playout();

        let mut h = header(1, 1000, 0x1);
        ctx.rewrite_header(&mut h, true, 4500, 1_000_000);

        // The bug only ever afflicts the audio branch.
        assert_ne!(ctx.video.base_ts_prev, 0);
        assert_eq!(ctx.audio.base_ts_prev, 0);
    }
}
