//! Locally-attached camera source (e.g. a USB/V4L2 depth-or-color camera).
//!
//! Unlike the networked source, this one is polled non-blockingly: the
//! worker asks the appsink for a sample with a zero timeout and sleeps
//! briefly when none is ready, rather than blocking on the device.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use gstreamer as gst;
use gstreamer::prelude::*;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::distributor::{Consumer, FrameDistributor};
use crate::error::{RestreamerError, Result};
use crate::source::{gst_pipeline, join_bounded, InputSource};

const JOIN_TIMEOUT: Duration = Duration::from_secs(2);
const POLL_SLEEP: Duration = Duration::from_millis(1);

pub struct LocalCameraSource {
    name: String,
    device: String,
    width: u32,
    height: u32,
    fps: u32,
    distributor: Arc<FrameDistributor>,
    running: Arc<AtomicBool>,
    pipeline: Mutex<Option<gst::Pipeline>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl LocalCameraSource {
    pub fn new(name: impl Into<String>, device: impl Into<String>, width: u32, height: u32, fps: u32) -> Self {
        Self {
            name: name.into(),
            device: device.into(),
            width,
            height,
            fps,
            distributor: Arc::new(FrameDistributor::new()),
            running: Arc::new(AtomicBool::new(false)),
            pipeline: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }
}

impl InputSource for LocalCameraSource {
    fn start(&self) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            warn!(source = self.name, "start() called while already running, ignoring");
            return Ok(());
        }

        let description = format!(
            "v4l2src device={device} ! videoconvert ! \
             video/x-raw,format=BGR,width={w},height={h},framerate={fps}/1 ! \
             appsink name=sink emit-signals=false max-buffers=4 drop=true sync=false",
            device = self.device,
            w = self.width,
            h = self.height,
            fps = self.fps,
        );

        let (pipeline, appsink) = gst_pipeline::build_pipeline(&description, "sink").map_err(|e| {
            RestreamerError::SourceOpenFailed { name: self.name.clone(), reason: e.to_string() }
        })?;

        self.running.store(true, Ordering::SeqCst);
        *self.pipeline.lock() = Some(pipeline.clone());

        let running = self.running.clone();
        let distributor = self.distributor.clone();

        let handle = std::thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                match appsink.try_pull_sample(gst::ClockTime::ZERO) {
                    Some(sample) => {
                        let Some(buffer) = sample.buffer() else { continue };
                        let Ok(map) = buffer.map_readable() else { continue };
                        distributor.distribute(map.as_slice());
                    }
                    None => std::thread::sleep(POLL_SLEEP),
                }
            }
        });

        *self.worker.lock() = Some(handle);
        info!(source = self.name, device = self.device, "local camera source started");
        Ok(())
    }

    fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(pipeline) = self.pipeline.lock().take() {
            gst_pipeline::teardown_pipeline(&pipeline);
        }
        if let Some(handle) = self.worker.lock().take() {
            if !join_bounded(handle, JOIN_TIMEOUT) {
                warn!(source = self.name, "worker thread did not exit within timeout");
            }
        }
        info!(source = self.name, "local camera source stopped");
    }

    fn add_consumer(&self, consumer: Consumer) -> usize {
        self.distributor.add_consumer(consumer)
    }

    fn remove_consumer(&self, id: usize) {
        self.distributor.remove_consumer(id)
    }

    fn is_active(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
