// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Restreamer controller: wires every configured device to a source and a
//! sink, owns both maps for the process lifetime, and — in adaptive mode —
//! runs the monitoring loop that reconciles uplink quality with the active
//! ladder level.
//!
//! `sources` and `sinks` are built once in [`RestreamerController::new`] and
//! never mutated afterward (no hot add/remove of sources — spec non-goal),
//! so reads of the entry map need no lock; only `current_level` and the
//! per-source/per-sink internals are touched concurrently.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::ladder::ProfileLadder;
use crate::sink::{EncoderSink, SinkEndpoint};
use crate::source::local::LocalCameraSource;
use crate::source::network::NetworkCameraSource;
use crate::source::InputSource;
use crate::uplink::UplinkProbe;

const DEFAULT_POLL_SECS: u64 = 5;
const MONITOR_JOIN_TIMEOUT: Duration = Duration::from_secs(2);
const BACKOFF_EXTRA: Duration = Duration::from_secs(5);
const SLEEP_TICK: Duration = Duration::from_millis(200);

/// The local camera isn't listed in `input_devices` (that section is
/// network-only per the config contract) — it's a single fixed device,
/// always present, named and pathed the same way every run.
const LOCAL_SOURCE_NAME: &str = "local";
const LOCAL_DEVICE_PATH: &str = "/dev/video0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    Network,
    Local,
}

struct Entry {
    kind: SourceKind,
    source: Arc<dyn InputSource>,
    sink: Arc<EncoderSink>,
}

/// Snapshot used by the monitoring task, which outlives any borrow of
/// `&RestreamerController` — everything it touches is `Arc`'d.
#[derive(Clone)]
struct MonitorEntry {
    name: String,
    kind: SourceKind,
    source: Arc<dyn InputSource>,
    sink: Arc<EncoderSink>,
}

/// Snapshot returned by [`RestreamerController::get_status`].
#[derive(Debug, Clone)]
pub struct ControllerStatus {
    pub current_level: usize,
    pub running: bool,
    pub source_active: HashMap<String, bool>,
    pub sink_active: HashMap<String, bool>,
}

pub struct RestreamerController {
    ladder: Arc<ProfileLadder>,
    entries: HashMap<String, Entry>,
    probe: UplinkProbe,
    poll_interval: Duration,
    adaptive: bool,
    running: Arc<AtomicBool>,
    current_level: Arc<AtomicUsize>,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl RestreamerController {
    /// Builds every source/sink pair from `config` and spawns each sink's
    /// encoder at the ladder's base profile. Does not start anything —
    /// call [`RestreamerController::start`] for that.
    pub fn new(config: &Config) -> Result<Self> {
        let ladder = Arc::new(ProfileLadder::new(config.profile.base, config.profile.degradation_steps)?);
        let base = ladder.base();
        let endpoint = SinkEndpoint {
            host: config.profile.camera_output_host.clone(),
            port: config.profile.camera_output_port,
        };

        let mut entries = HashMap::new();

        for device in &config.profile.devices {
            let pull_url = format!(
                "rtsp://{login}:{password}@{ip}:{port}{path}",
                login = config.profile.camera_login,
                password = config.profile.camera_password,
                ip = device.ip,
                port = config.profile.camera_port,
                path = device.path,
            );
            let source: Arc<dyn InputSource> = Arc::new(NetworkCameraSource::new(device.name.clone(), pull_url));
            let sink = Arc::new(EncoderSink::new(device.name.clone(), endpoint.clone(), base)?);
            wire(&source, &sink);
            entries.insert(device.name.clone(), Entry { kind: SourceKind::Network, source, sink });
        }

        let local_source: Arc<dyn InputSource> = Arc::new(LocalCameraSource::new(
            LOCAL_SOURCE_NAME,
            LOCAL_DEVICE_PATH,
            base.width,
            base.height,
            base.fps,
        ));
        let local_sink = Arc::new(EncoderSink::new(LOCAL_SOURCE_NAME, endpoint, base)?);
        wire(&local_source, &local_sink);
        entries.insert(
            LOCAL_SOURCE_NAME.to_string(),
            Entry { kind: SourceKind::Local, source: local_source, sink: local_sink },
        );

        let probe_timeout = Duration::from_secs(config.settings.timeout.max(1));
        let probe = UplinkProbe::new(
            config.router.ip_addr.clone(),
            config.router.login.clone(),
            config.router.password.clone(),
            probe_timeout,
            ladder.max_level(),
        )?;

        let poll_secs = if config.settings.timeout == 0 { DEFAULT_POLL_SECS } else { config.settings.timeout };

        Ok(Self {
            ladder,
            entries,
            probe,
            poll_interval: Duration::from_secs(poll_secs),
            adaptive: config.adaptive_mode.enabled,
            running: Arc::new(AtomicBool::new(false)),
            current_level: Arc::new(AtomicUsize::new(0)),
            monitor: Mutex::new(None),
        })
    }

    /// Authenticates against the router once, surfacing
    /// [`crate::error::RestreamerError::AuthFailed`] on rejection. Meant to
    /// be called once at startup, before [`RestreamerController::start`].
    pub async fn verify_uplink(&self) -> Result<()> {
        self.probe.authenticate().await?;
        Ok(())
    }

    /// Starts every source and sink, in fixed-quality or adaptive mode
    /// depending on `[adaptive_mode].enabled`. In adaptive mode this also
    /// spawns the monitoring task.
    pub fn start(&self) -> Result<()> {
        if self.adaptive {
            self.start_adaptive()
        } else {
            self.start_fixed()
        }
    }

    fn start_fixed(&self) -> Result<()> {
        let base = self.ladder.base();
        for (name, entry) in &self.entries {
            if let Err(e) = entry.source.start() {
                warn!(source = name, error = %e, "failed to start source in fixed-quality mode");
            }
            if let Err(e) = entry.sink.apply_profile(base) {
                warn!(sink = name, error = %e, "failed to apply base profile in fixed-quality mode");
            } else {
                entry.sink.start_streaming();
            }
        }
        self.running.store(true, Ordering::SeqCst);
        info!("restreamer started in fixed-quality mode");
        Ok(())
    }

    fn start_adaptive(&self) -> Result<()> {
        let p0 = self.ladder.profile_at(0);
        for (name, entry) in &self.entries {
            if let Err(e) = entry.source.start() {
                warn!(source = name, error = %e, "failed to start source at startup");
            }
            if let Err(e) = entry.sink.apply_profile(p0) {
                warn!(sink = name, error = %e, "failed to apply P0 at startup");
            } else {
                entry.sink.start_streaming();
            }
        }

        self.running.store(true, Ordering::SeqCst);
        self.current_level.store(0, Ordering::SeqCst);

        let snapshot: Vec<MonitorEntry> = self
            .entries
            .iter()
            .map(|(name, entry)| MonitorEntry {
                name: name.clone(),
                kind: entry.kind,
                source: entry.source.clone(),
                sink: entry.sink.clone(),
            })
            .collect();

        let running = self.running.clone();
        let current_level = self.current_level.clone();
        let probe = self.probe.clone();
        let poll_interval = self.poll_interval;
        let ladder = self.ladder.clone();

        let handle = tokio::spawn(async move {
            monitor_loop(running, current_level, probe, poll_interval, ladder, snapshot).await;
        });
        *self.monitor.lock() = Some(handle);

        info!(poll_interval = ?self.poll_interval, "restreamer started in adaptive mode");
        Ok(())
    }

    /// Clears `running`, joins the monitoring task (bounded by a ~2s
    /// budget), then stops every source and closes every sink. Per-entity
    /// errors are logged and don't abort the sweep.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);

        let handle = self.monitor.lock().take();
        if let Some(handle) = handle {
            if tokio::time::timeout(MONITOR_JOIN_TIMEOUT, handle).await.is_err() {
                warn!("monitoring task did not exit within the join budget");
            }
        }

        for (name, entry) in &self.entries {
            entry.source.stop();
            entry.sink.close();
            info!(source = name, "source stopped, sink closed");
        }

        info!("restreamer controller stopped");
    }

    pub fn get_status(&self) -> ControllerStatus {
        let mut source_active = HashMap::new();
        let mut sink_active = HashMap::new();
        for (name, entry) in &self.entries {
            source_active.insert(name.clone(), entry.source.is_active());
            sink_active.insert(name.clone(), entry.sink.is_active());
        }
        ControllerStatus {
            current_level: self.current_level.load(Ordering::SeqCst),
            running: self.running.load(Ordering::SeqCst),
            source_active,
            sink_active,
        }
    }

    pub fn ladder(&self) -> &ProfileLadder {
        &self.ladder
    }
}

fn wire(source: &Arc<dyn InputSource>, sink: &Arc<EncoderSink>) {
    let sink = sink.clone();
    source.add_consumer(Arc::new(move |frame: &[u8]| sink.consume_frame(frame)));
}

async fn monitor_loop(
    running: Arc<AtomicBool>,
    current_level: Arc<AtomicUsize>,
    probe: UplinkProbe,
    poll_interval: Duration,
    ladder: Arc<ProfileLadder>,
    entries: Vec<MonitorEntry>,
) {
    while running.load(Ordering::SeqCst) {
        if let Err(e) = probe.authenticate().await {
            warn!(error = %e, "uplink authentication failed during monitoring, backing off");
            sleep_cooperative(&running, poll_interval + BACKOFF_EXTRA).await;
            continue;
        }

        let report = match probe.get_connection_info().await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "uplink probe failed, backing off");
                sleep_cooperative(&running, poll_interval + BACKOFF_EXTRA).await;
                continue;
            }
        };

        let previous = current_level.load(Ordering::SeqCst);
        if report.level != previous {
            info!(from = previous, to = report.level, score = report.score, "uplink quality level changed");
            apply_quality_policy(&ladder, &entries, report.level);
            current_level.store(report.level, Ordering::SeqCst);
        }

        sleep_cooperative(&running, poll_interval).await;
    }
}

/// Reconciles every source/sink with `level`: at the worst level, every
/// network-camera source (and its sink) is torn down and only the local
/// camera is kept live; otherwise every source is (re)started if idle and
/// every sink is moved to the profile for `level`. Per-entry failures are
/// logged and don't stop the sweep over the remaining entries.
fn apply_quality_policy(ladder: &ProfileLadder, entries: &[MonitorEntry], level: usize) {
    let level = level.min(ladder.max_level());
    let worst = level == ladder.max_level();

    for entry in entries {
        if worst && entry.kind == SourceKind::Network {
            entry.source.stop();
            entry.sink.close();
            continue;
        }

        if !entry.source.is_active() {
            if let Err(e) = entry.source.start() {
                warn!(source = entry.name, error = %e, "failed to restart source during policy application");
            }
        }

        if let Err(e) = entry.sink.apply_profile(ladder.profile_at(level)) {
            warn!(sink = entry.name, error = %e, "failed to apply profile during policy application");
        }
    }
}

async fn sleep_cooperative(running: &AtomicBool, total: Duration) {
    let mut remaining = total;
    while remaining > Duration::ZERO && running.load(Ordering::SeqCst) {
        let step = remaining.min(SLEEP_TICK);
        tokio::time::sleep(step).await;
        remaining = remaining.saturating_sub(step);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributor::Consumer;
    use crate::profile::EncodingProfile;
    use std::sync::atomic::{AtomicBool as StdAtomicBool, Ordering as StdOrdering};

    struct FakeSource {
        name: String,
        active: StdAtomicBool,
        fail_start: StdAtomicBool,
        start_calls: StdAtomicBool,
    }

    impl FakeSource {
        fn new(name: &str, initially_active: bool) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                active: StdAtomicBool::new(initially_active),
                fail_start: StdAtomicBool::new(false),
                start_calls: StdAtomicBool::new(false),
            })
        }
    }

    impl InputSource for FakeSource {
        fn start(&self) -> Result<()> {
            self.start_calls.store(true, StdOrdering::SeqCst);
            if self.fail_start.load(StdOrdering::SeqCst) {
                return Err(crate::error::RestreamerError::SourceOpenFailed {
                    name: self.name.clone(),
                    reason: "forced failure".into(),
                });
            }
            self.active.store(true, StdOrdering::SeqCst);
            Ok(())
        }

        fn stop(&self) {
            self.active.store(false, StdOrdering::SeqCst);
        }

        fn add_consumer(&self, _consumer: Consumer) -> usize {
            0
        }

        fn remove_consumer(&self, _id: usize) {}

        fn is_active(&self) -> bool {
            self.active.load(StdOrdering::SeqCst)
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    fn fake_sink(name: &str, profile: EncodingProfile) -> Arc<EncoderSink> {
        Arc::new(
            EncoderSink::with_program(
                name,
                SinkEndpoint { host: "127.0.0.1".into(), port: 5000 },
                profile,
                "cat",
            )
            .expect("spawning `cat` as a fake encoder should never fail in test environments"),
        )
    }

    fn base() -> EncodingProfile {
        EncodingProfile::new(1920, 1080, 4500, 30).unwrap()
    }

    #[test]
    fn worst_level_sheds_network_sources_and_keeps_local() {
        let ladder = ProfileLadder::new(base(), 4).unwrap();

        let net_source = FakeSource::new("cam1", true);
        let net_sink = fake_sink("cam1", ladder.profile_at(0));
        let local_source = FakeSource::new("local", true);
        let local_sink = fake_sink("local", ladder.profile_at(0));

        let entries = vec![
            MonitorEntry {
                name: "cam1".into(),
                kind: SourceKind::Network,
                source: net_source.clone(),
                sink: net_sink.clone(),
            },
            MonitorEntry {
                name: "local".into(),
                kind: SourceKind::Local,
                source: local_source.clone(),
                sink: local_sink.clone(),
            },
        ];

        apply_quality_policy(&ladder, &entries, ladder.max_level());

        assert!(!net_source.is_active());
        assert!(!net_sink.is_active());
        assert!(local_source.is_active());
        assert_eq!(local_sink.current_profile(), ladder.profile_at(ladder.max_level()));
    }

    #[test]
    fn non_worst_level_restarts_idle_sources_and_applies_profile() {
        let ladder = ProfileLadder::new(base(), 4).unwrap();

        let net_source = FakeSource::new("cam1", false);
        let net_sink = fake_sink("cam1", ladder.profile_at(4));

        let entries = vec![MonitorEntry {
            name: "cam1".into(),
            kind: SourceKind::Network,
            source: net_source.clone(),
            sink: net_sink.clone(),
        }];

        apply_quality_policy(&ladder, &entries, 1);

        assert!(net_source.is_active());
        assert_eq!(net_sink.current_profile(), ladder.profile_at(1));
    }

    #[test]
    fn source_restart_failure_does_not_block_other_entries() {
        let ladder = ProfileLadder::new(base(), 2).unwrap();

        let failing = FakeSource::new("cam1", false);
        failing.fail_start.store(true, StdOrdering::SeqCst);
        let failing_sink = fake_sink("cam1", ladder.profile_at(2));

        let healthy = FakeSource::new("cam2", false);
        let healthy_sink = fake_sink("cam2", ladder.profile_at(2));

        let entries = vec![
            MonitorEntry { name: "cam1".into(), kind: SourceKind::Network, source: failing.clone(), sink: failing_sink.clone() },
            MonitorEntry { name: "cam2".into(), kind: SourceKind::Network, source: healthy.clone(), sink: healthy_sink.clone() },
        ];

        apply_quality_policy(&ladder, &entries, 0);

        assert!(!failing.is_active());
        // The sink profile is still applied even though the source failed to restart.
        assert_eq!(failing_sink.current_profile(), ladder.profile_at(0));
        assert!(healthy.is_active());
        assert_eq!(healthy_sink.current_profile(), ladder.profile_at(0));
    }

    #[test]
    fn level_clamped_to_ladder_max() {
        let ladder = ProfileLadder::new(base(), 3).unwrap();
        let source = FakeSource::new("cam1", true);
        let sink = fake_sink("cam1", ladder.profile_at(0));
        let entries = vec![MonitorEntry { name: "cam1".into(), kind: SourceKind::Network, source: source.clone(), sink: sink.clone() }];

        // Level way beyond max_level should behave exactly like max_level (worst).
        apply_quality_policy(&ladder, &entries, 99);

        assert!(!source.is_active());
        assert!(!sink.is_active());
    }
}
