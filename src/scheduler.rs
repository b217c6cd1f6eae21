//! The playout worker: a dedicated thread that paces recorded frames out to
//! a live peer connection at wall-clock speed.
//!
//! Grounded on `janus_play_playout_thread` in the upstream plugin source
//! (see original_source/plugins/janus_lua_extra.c). One of these runs per
//! active playback (SPEC_FULL.md §5) — not a `tokio::task`, because the
//! thread spends most of its life blocked in `std::thread::sleep` and file
//! reads, and `THREAD_START` (SPEC_FULL.md §4.4) needs to be a real failure
//! mode a caller can observe, not a detail tokio papers over.

use crate::events::{EVENT_ENDED, EVENT_START, EVENT_STOPPED};
use crate::gateway::Gateway;
use crate::mjr::{FrameDescriptor, AUDIO_CLOCK_KHZ, VIDEO_CLOCK_KHZ};
use crate::recording::TrackHandle;
use crate::session::Session;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// How far ahead of "due" a frame is allowed to go out, to absorb scheduling
/// jitter without visibly front-running the wall clock.
const EARLY_SEND_TOLERANCE_US: i64 = 5000;

/// Per-packet step retained for ABI parity with the upstream interface;
/// `ContinuityContext::rewrite_header` ignores it.
const AUDIO_STEP: u32 = 960;
const VIDEO_STEP: u32 = 4500;

/// Default scratch buffer capacity — large enough for the overwhelming
/// majority of recorded RTP frames; `TrackHandle::read_frame` grows it on
/// demand for anything bigger.
const DEFAULT_SCRATCH_CAPACITY: usize = 1500;

/// Runs one playout to completion. Blocking; intended to be the body of a
/// dedicated `std::thread`, never awaited from async code.
pub fn run_playout<G: Gateway>(
    session: Arc<Session<G>>,
    gateway: Arc<G>,
    transaction: String,
    idle_sleep: Duration,
) {
    gateway.push_event(&session.id, &transaction, EVENT_START);
    session.continuity.lock().unwrap().reset_for_new_playout();

    let mut scratch: Vec<u8> = vec![0u8; DEFAULT_SCRATCH_CAPACITY];
    let mut abefore_us: i64 = 0;
    let mut vbefore_us: i64 = 0;
    let mut audio_started = false;
    let mut video_started = false;
    let mut stopped_by_request = false;

    loop {
        if session.is_destroyed() || !session.is_active() {
            break;
        }

        let mut rec_guard = session.recording.lock().unwrap();
        let handle = match rec_guard.as_mut() {
            Some(h) => h,
            None => break,
        };
        if handle.is_stop_requested() {
            stopped_by_request = true;
            break;
        }

        let now_us = gateway.monotonic_time_us();
        let mut sent_anything = false;

        if let Some(track) = handle.audio.as_mut() {
            sent_anything |= pace_track(
                false,
                AUDIO_CLOCK_KHZ,
                AUDIO_STEP,
                track,
                &mut abefore_us,
                &mut audio_started,
                now_us,
                &mut scratch,
                &session,
                gateway.as_ref(),
            );
        }
        if let Some(track) = handle.video.as_mut() {
            sent_anything |= pace_track(
                true,
                VIDEO_CLOCK_KHZ,
                VIDEO_STEP,
                track,
                &mut vbefore_us,
                &mut video_started,
                now_us,
                &mut scratch,
                &session,
                gateway.as_ref(),
            );
        }

        let audio_done = handle.audio.as_ref().map_or(true, |t| t.exhausted());
        let video_done = handle.video.as_ref().map_or(true, |t| t.exhausted());
        drop(rec_guard);

        if audio_done && video_done {
            break;
        }
        if !sent_anything {
            std::thread::sleep(idle_sleep);
        }
    }

    session.set_active(false);
    *session.recording.lock().unwrap() = None;

    let terminal_event = if stopped_by_request {
        EVENT_STOPPED
    } else {
        EVENT_ENDED
    };
    gateway.push_event(&session.id, &transaction, terminal_event);
    info!(session = %session.id, stopped = stopped_by_request, "playout finished");
}

/// Advance one direction's track by at most one scheduling step. Returns
/// whether anything was sent, so the caller knows whether it's safe to
/// idle-sleep this iteration.
#[allow(clippy::too_many_arguments)]
fn pace_track<G: Gateway>(
    is_video: bool,
    clock_khz: u64,
    step: u32,
    track: &mut TrackHandle,
    before_us: &mut i64,
    started: &mut bool,
    now_us: i64,
    scratch: &mut Vec<u8>,
    session: &Session<G>,
    gateway: &G,
) -> bool {
    if track.exhausted() {
        return false;
    }

    if !*started {
        // The very first packet(s): for video, every frame sharing the
        // initial timestamp (a picture's slices) goes out together.
        let shared_ts = track.frames[track.cursor].ts;
        loop {
            let frame = track.frames[track.cursor];
            send_frame(is_video, step, track, &frame, scratch, session, gateway, now_us);
            track.advance();
            if !is_video || track.exhausted() || track.frames[track.cursor].ts != shared_ts {
                break;
            }
        }
        *before_us = now_us;
        *started = true;
        return true;
    }

    let idx = track.cursor;
    let cur = track.frames[idx];
    let prev = track.frames[idx - 1];
    let delta_ts = cur.ts.saturating_sub(prev.ts);
    let due_us = (delta_ts * 1000 / clock_khz) as i64;
    let elapsed_us = now_us - *before_us;
    if elapsed_us < due_us - EARLY_SEND_TOLERANCE_US {
        return false;
    }
    *before_us += due_us;

    // Picture slices: every video frame sharing the just-matured frame's
    // timestamp goes out in this same iteration.
    let shared_ts = cur.ts;
    let mut sent_any = false;
    loop {
        if track.exhausted() {
            break;
        }
        let frame = track.frames[track.cursor];
        if sent_any && frame.ts != shared_ts {
            break;
        }
        send_frame(is_video, step, track, &frame, scratch, session, gateway, now_us);
        track.advance();
        sent_any = true;
        if !is_video {
            break;
        }
    }
    true
}

fn send_frame<G: Gateway>(
    is_video: bool,
    step: u32,
    track: &mut TrackHandle,
    frame: &FrameDescriptor,
    scratch: &mut Vec<u8>,
    session: &Session<G>,
    gateway: &G,
    now_us: i64,
) {
    let n = track.read_frame(frame, scratch);
    if n < 12 {
        return;
    }
    session
        .continuity
        .lock()
        .unwrap()
        .rewrite_header(&mut scratch[..n], is_video, step, now_us);
    gateway.relay_rtp(&session.peer, is_video, &scratch[..n]);
}
