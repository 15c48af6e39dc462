// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Encoder sink: one `ffmpeg` subprocess per destination, fed raw frames on
//! stdin and pushing out H.264/RTP. A sink always has *some* encoder process
//! attached once started — there is no "no current child" steady state, and
//! swapping profiles means tearing down the old process and spawning a new
//! one, not reconfiguring a live one (ffmpeg has no such knob for this
//! pipeline shape).

use std::io::Write;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::error::{RestreamerError, Result};
use crate::profile::EncodingProfile;

const GRACEFUL_WAIT: Duration = Duration::from_millis(500);
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone)]
pub struct SinkEndpoint {
    pub host: String,
    pub port: u16,
}

struct SinkState {
    profile: EncodingProfile,
    child: Option<Child>,
}

/// What actually gets spawned as "the encoder". Production sinks always use
/// `Ffmpeg`; `Raw` substitutes an arbitrary program run with no arguments,
/// reading frames from stdin and discarding them — used by tests to
/// exercise hot-swap and broken-pipe behavior without a real ffmpeg.
enum Encoder {
    Ffmpeg,
    Raw(String),
}

pub struct EncoderSink {
    name: String,
    endpoint: SinkEndpoint,
    encoder: Encoder,
    state: Mutex<SinkState>,
}

impl EncoderSink {
    /// Constructs the sink and immediately spawns the encoder at `profile` —
    /// a sink exists only in the "has a running (or just-closed) process"
    /// state, there's no separate construct-then-start step.
    pub fn new(name: impl Into<String>, endpoint: SinkEndpoint, profile: EncodingProfile) -> Result<Self> {
        let name = name.into();
        let child = spawn_ffmpeg(&name, &endpoint, &profile)?;
        Ok(Self {
            name,
            endpoint,
            encoder: Encoder::Ffmpeg,
            state: Mutex::new(SinkState { profile, child: Some(child) }),
        })
    }

    /// Constructs a sink backed by an arbitrary `program` instead of
    /// ffmpeg, invoked with no arguments. Exists for tests.
    pub fn with_program(
        name: impl Into<String>,
        endpoint: SinkEndpoint,
        profile: EncodingProfile,
        program: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        let program = program.into();
        let child = spawn_program(&program, &name)?;
        Ok(Self {
            name,
            endpoint,
            encoder: Encoder::Raw(program),
            state: Mutex::new(SinkState { profile, child: Some(child) }),
        })
    }

    /// Writes one raw BGR frame to the encoder's stdin. A broken pipe (the
    /// encoder died on its own) is logged and swallowed — the next
    /// `apply_profile` or monitoring cycle will notice and respawn it.
    pub fn consume_frame(&self, frame: &[u8]) {
        let mut guard = self.state.lock();
        let Some(child) = guard.child.as_mut() else { return };
        let Some(stdin) = child.stdin.as_mut() else { return };
        if let Err(e) = stdin.write_all(frame) {
            if e.kind() == std::io::ErrorKind::BrokenPipe {
                warn!(sink = self.name, "encoder pipe closed, dropping frame");
            } else {
                warn!(sink = self.name, error = %e, "failed to write frame to encoder");
            }
        }
    }

    /// Swaps the active encoding profile: closes the current process and
    /// spawns a fresh one at the new profile. A no-op if already running at
    /// this exact profile.
    pub fn apply_profile(&self, profile: EncodingProfile) -> Result<()> {
        let mut guard = self.state.lock();
        if guard.profile == profile && guard.child.is_some() {
            return Ok(());
        }
        if let Some(old) = guard.child.take() {
            close_child(&self.name, old);
        }
        let child = match &self.encoder {
            Encoder::Ffmpeg => spawn_ffmpeg(&self.name, &self.endpoint, &profile)?,
            Encoder::Raw(program) => spawn_program(program, &self.name)?,
        };
        guard.child = Some(child);
        guard.profile = profile;
        info!(sink = self.name, resolution = profile.resolution_str(), bitrate = profile.bitrate_kbps, "applied profile");
        Ok(())
    }

    /// Alias for `apply_profile`, kept for call sites that express "update"
    /// rather than "start"; identical semantics, idempotent on repeat calls
    /// with the same profile.
    pub fn update_profile(&self, profile: EncodingProfile) -> Result<()> {
        self.apply_profile(profile)
    }

    pub fn current_profile(&self) -> EncodingProfile {
        self.state.lock().profile
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().child.is_some()
    }

    /// Marks the sink as actively streaming. The encoder subprocess is
    /// already running by the time a sink exists (spawned in `new`/
    /// `with_program`), so this is purely a state transition — kept as a
    /// named operation for symmetry with `stop_streaming`/`apply_profile`.
    pub fn start_streaming(&self) {
        info!(sink = self.name, "sink streaming started");
    }

    /// Synonym for `close`: terminates the subprocess and releases the
    /// handle, taking the sink out of the streaming state.
    pub fn stop_streaming(&self) {
        self.close();
    }

    /// Closes the encoder process without spawning a replacement.
    pub fn close(&self) {
        let mut guard = self.state.lock();
        if let Some(child) = guard.child.take() {
            close_child(&self.name, child);
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

fn spawn_ffmpeg(name: &str, endpoint: &SinkEndpoint, profile: &EncodingProfile) -> Result<Child> {
    let url = format!("rtp://{}:{}/{}", endpoint.host, endpoint.port, name);
    let child = Command::new("ffmpeg")
        .args([
            "-f", "rawvideo",
            "-pix_fmt", "bgr24",
            "-s", &profile.resolution_str(),
            "-r", &profile.fps.to_string(),
            "-i", "-",
            "-an",
            "-c:v", "libx264",
            "-preset", "ultrafast",
            "-tune", "zerolatency",
            "-b:v", &format!("{}k", profile.bitrate_kbps),
            "-g", &profile.fps.to_string(),
            "-bsf:v", "h264_mp4toannexb",
            "-f", "rtp",
            &url,
        ])
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| RestreamerError::SinkSpawnFailed { name: name.to_string(), reason: e.to_string() })?;

    info!(sink = name, url, "ffmpeg encoder spawned");
    Ok(child)
}

/// Spawns an arbitrary program with no arguments as a stand-in encoder,
/// piping its stdin and discarding stdout/stderr. Used by tests in place of
/// `ffmpeg` to exercise hot-swap and broken-pipe behavior without depending
/// on a real encoder being installed.
fn spawn_program(program: &str, name: &str) -> Result<Child> {
    let child = Command::new(program)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| RestreamerError::SinkSpawnFailed { name: name.to_string(), reason: e.to_string() })?;

    info!(sink = name, program, "stand-in encoder spawned");
    Ok(child)
}

/// Closes stdin to signal ffmpeg to flush and exit, waits briefly, then
/// kills it if it's still alive. Never blocks longer than `GRACEFUL_WAIT`.
fn close_child(name: &str, mut child: Child) {
    drop(child.stdin.take());

    let deadline = Instant::now() + GRACEFUL_WAIT;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return,
            Ok(None) if Instant::now() < deadline => {
                std::thread::sleep(WAIT_POLL_INTERVAL);
            }
            Ok(None) => break,
            Err(e) => {
                warn!(sink = name, error = %e, "error waiting for encoder to exit");
                return;
            }
        }
    }

    warn!(sink = name, "encoder did not exit gracefully, killing");
    if let Err(e) = child.kill() {
        warn!(sink = name, error = %e, "failed to kill encoder process");
    }
    let _ = child.wait();
}
