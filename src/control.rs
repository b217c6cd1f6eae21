//! The control surface: `start_playing` / `stop_playing` and the session
//! table they operate on.
//!
//! Grounded on `janus_lua_method_play` / `janus_lua_method_stopplay` in the
//! upstream plugin source, and on the teacher's `RoomRegistry` for the
//! lock-order pattern (a top-level map mutex, then a per-entry mutex —
//! SPEC_FULL.md §5).

use crate::gateway::Gateway;
use crate::recording::RecordingHandle;
use crate::scheduler;
use crate::session::Session;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

/// Mirrors the upstream plugin's integer return codes exactly
/// (SPEC_FULL.md §4.4) so a caller can match on them without string
/// comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnCode {
    Ok = 0,
    WrongArgs = 1000,
    SessionNotFound = 1001,
    InvalidRecording = 1002,
    ThreadStart = 1003,
}

impl ReturnCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Arguments accepted by [`start_playing`]. At least one of `audio`/`video`
/// must be `Some`; recording directory resolution is per-track
/// (`recordings_dir`, `file_name`).
pub struct PlayArgs<'a> {
    pub session_id: &'a str,
    pub transaction: &'a str,
    pub recordings_dir: &'a str,
    pub audio_file: Option<&'a str>,
    pub video_file: Option<&'a str>,
}

/// All live sessions known to this control surface, keyed by session id.
/// The map's own mutex protects only membership; per-session mutation goes
/// through each `Session`'s own locks once looked up.
pub struct SessionTable<G: Gateway> {
    sessions: Mutex<HashMap<String, Arc<Session<G>>>>,
    gateway: Arc<G>,
    idle_sleep: Duration,
}

impl<G: Gateway> SessionTable<G> {
    pub fn new(gateway: Arc<G>, idle_sleep: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            gateway,
            idle_sleep,
        }
    }

    pub fn insert(&self, session: Arc<Session<G>>) {
        self.sessions.lock().unwrap().insert(session.id.clone(), session);
    }

    pub fn remove(&self, session_id: &str) -> Option<Arc<Session<G>>> {
        let session = self.sessions.lock().unwrap().remove(session_id);
        if let Some(s) = &session {
            s.destroy();
        }
        session
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<Session<G>>> {
        self.sessions.lock().unwrap().get(session_id).cloned()
    }

    /// `start_playing`: validate arguments, parse the requested track(s),
    /// and spawn a dedicated playout thread. Returns as soon as the thread
    /// is confirmed spawned (or a failure code); the playout itself runs
    /// asynchronously to completion.
    pub fn start_playing(&self, args: PlayArgs<'_>) -> ReturnCode {
        if args.audio_file.is_none() && args.video_file.is_none() {
            return ReturnCode::WrongArgs;
        }

        let session = match self.get(args.session_id) {
            Some(s) if !s.is_destroyed() && !s.is_recorder => s,
            _ => return ReturnCode::SessionNotFound,
        };

        let audio = args.audio_file.map(|f| (args.recordings_dir, f));
        let video = args.video_file.map(|f| (args.recordings_dir, f));
        let handle = RecordingHandle::build(audio, video);
        if handle.is_empty() {
            return ReturnCode::InvalidRecording;
        }

        *session.recording.lock().unwrap() = Some(handle);
        *session.transaction.lock().unwrap() = args.transaction.to_string();
        session.set_active(true);

        let spawned = Arc::clone(&session);
        let gateway = Arc::clone(&self.gateway);
        let transaction = args.transaction.to_string();
        let idle_sleep = self.idle_sleep;

        let spawn_result = std::thread::Builder::new()
            .name(format!("playout-{}", args.session_id))
            .spawn(move || scheduler::run_playout(spawned, gateway, transaction, idle_sleep));

        match spawn_result {
            Ok(_join_handle) => {
                info!(session = args.session_id, "playout thread started");
                ReturnCode::Ok
            }
            Err(e) => {
                warn!(session = args.session_id, error = %e, "failed to spawn playout thread");
                session.set_active(false);
                *session.recording.lock().unwrap() = None;
                self.gateway.close_pc(&session.peer);
                ReturnCode::ThreadStart
            }
        }
    }

    /// `stop_playing`: signal the active playout (if any) to stop. The
    /// thread itself notices the flag and performs cleanup; this call does
    /// not block on it.
    pub fn stop_playing(&self, session_id: &str) -> ReturnCode {
        let session = match self.get(session_id) {
            Some(s) if !s.is_destroyed() => s,
            _ => return ReturnCode::SessionNotFound,
        };

        let rec = session.recording.lock().unwrap();
        match rec.as_ref() {
            Some(handle) => {
                handle.request_stop();
                ReturnCode::Ok
            }
            None => ReturnCode::Ok, // nothing playing is not an error
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    struct NullGateway {
        now: AtomicI64,
    }

    impl Gateway for NullGateway {
        type PeerHandle = ();
        fn relay_rtp(&self, _peer: &(), _is_video: bool, _bytes: &[u8]) {}
        fn close_pc(&self, _peer: &()) {}
        fn monotonic_time_us(&self) -> i64 {
            self.now.fetch_add(1000, Ordering::SeqCst)
        }
        fn push_event(&self, _session_id: &str, _transaction: &str, _json: &str) {}
    }

    fn table() -> SessionTable<NullGateway> {
        SessionTable::new(
            Arc::new(NullGateway { now: AtomicI64::new(0) }),
            Duration::from_millis(0),
        )
    }

    #[test]
    fn wrong_args_when_no_tracks_requested() {
        let t = table();
        t.insert(Arc::new(Session::new("s1", (), false)));
        let rc = t.start_playing(PlayArgs {
            session_id: "s1",
            transaction: "tx",
            recordings_dir: "/tmp",
            audio_file: None,
            video_file: None,
        });
        assert_eq!(rc, ReturnCode::WrongArgs);
    }

    #[test]
    fn session_not_found_for_unknown_id() {
        let t = table();
        let rc = t.start_playing(PlayArgs {
            session_id: "ghost",
            transaction: "tx",
            recordings_dir: "/tmp",
            audio_file: Some("audio"),
            video_file: None,
        });
        assert_eq!(rc, ReturnCode::SessionNotFound);
    }

    #[test]
    fn invalid_recording_when_track_does_not_parse() {
        let t = table();
        t.insert(Arc::new(Session::new("s1", (), false)));
        let rc = t.start_playing(PlayArgs {
            session_id: "s1",
            transaction: "tx",
            recordings_dir: "/nonexistent-dir",
            audio_file: Some("audio"),
            video_file: None,
        });
        assert_eq!(rc, ReturnCode::InvalidRecording);
    }

    #[test]
    fn stop_playing_on_idle_session_is_ok() {
        let t = table();
        t.insert(Arc::new(Session::new("s1", (), false)));
        assert_eq!(t.stop_playing("s1"), ReturnCode::Ok);
    }

    #[test]
    fn stop_playing_unknown_session_not_found() {
        let t = table();
        assert_eq!(t.stop_playing("ghost"), ReturnCode::SessionNotFound);
    }
}
