//! Networked IP camera source: pulls H.264/RTP from an RTSP URL.
//!
//! `start()` opens the pipeline once; if it fails to open, that failure is
//! fatal for this cycle — there is no background reconnect loop here. The
//! next time the controller reaches for this source (the next ladder
//! transition), it calls `start()` again.

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

pub struct NetworkCameraSource {
    name: String,
    pull_url: String,
    distributor: Arc<FrameDistributor>,
    running: Arc<AtomicBool>,
    pipeline: Mutex<Option<gst::Pipeline>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl NetworkCameraSource {
    pub fn new(name: impl Into<String>, pull_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pull_url: pull_url.into(),
            distributor: Arc::new(FrameDistributor::new()),
            running: Arc::new(AtomicBool::new(false)),
            pipeline: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }
}

impl InputSource for NetworkCameraSource {
    fn start(&self) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            warn!(source = self.name, "start() called while already running, ignoring");
            return Ok(());
        }

        let description = format!(
            "rtspsrc location={url} latency=200 protocols=tcp ! \
             rtph264depay ! h264parse ! avdec_h264 ! videoconvert ! \
             video/x-raw,format=BGR ! \
             appsink name=sink emit-signals=false max-buffers=8 drop=true sync=false",
            url = self.pull_url
        );

        let (pipeline, appsink) = gst_pipeline::build_pipeline(&description, "sink").map_err(|e| {
            RestreamerError::SourceOpenFailed { name: self.name.clone(), reason: e.to_string() }
        })?;

        self.running.store(true, Ordering::SeqCst);
        *self.pipeline.lock() = Some(pipeline.clone());

        let running = self.running.clone();
        let distributor = self.distributor.clone();
        let name = self.name.clone();

        let handle = std::thread::spawn(move || loop {
            if !running.load(Ordering::SeqCst) {
                break;
            }
            match appsink.pull_sample() {
                Ok(sample) => {
                    let Some(buffer) = sample.buffer() else { continue };
                    let Ok(map) = buffer.map_readable() else { continue };
                    distributor.distribute(map.as_slice());
                }
                Err(_) => {
                    // EOS, Null-state transition, or a genuine read error —
                    // all look the same from here: the stream is done.
                    info!(source = name, "read loop ending, pipeline stopped or errored");
                    running.store(false, Ordering::SeqCst);
                    break;
                }
            }
        });

        *self.worker.lock() = Some(handle);
        info!(source = self.name, url = self.pull_url, "network camera source started");
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
        info!(source = self.name, "network camera source stopped");
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
