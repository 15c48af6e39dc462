//! Shared GStreamer plumbing used by both source variants: build a pipeline
//! from a description string, pull out its named `appsink`, and tear it
//! down. Kept free-standing rather than behind a shared base type — both
//! callers just need the same three steps, not an inheritance hierarchy.

use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;

use crate::error::{RestreamerError, Result};

static GST_INIT: std::sync::Once = std::sync::Once::new();

pub fn ensure_initialized() -> Result<()> {
    let mut init_err = None;
    GST_INIT.call_once(|| {
        if let Err(e) = gst::init() {
            init_err = Some(e.to_string());
        }
    });
    match init_err {
        Some(e) => Err(RestreamerError::GStreamer(format!("gst::init: {e}"))),
        None => Ok(()),
    }
}

/// Parses `description` and extracts the `appsink` named `sink_name`,
/// configured for manual (pull-based) sample retrieval — no
/// `new_sample`/`emit-signals` callback wiring here, callers pull samples
/// themselves from their own worker thread.
pub fn build_pipeline(description: &str, sink_name: &str) -> Result<(gst::Pipeline, gst_app::AppSink)> {
    ensure_initialized()?;

    let pipeline = gst::parse::launch(description)
        .map_err(|e| RestreamerError::GStreamer(format!("parse_launch: {e}")))?
        .downcast::<gst::Pipeline>()
        .map_err(|_| RestreamerError::GStreamer("parsed element is not a Pipeline".into()))?;

    let appsink = pipeline
        .by_name(sink_name)
        .ok_or_else(|| RestreamerError::GStreamer(format!("appsink '{sink_name}' not found")))?
        .downcast::<gst_app::AppSink>()
        .map_err(|_| RestreamerError::GStreamer("named element is not an AppSink".into()))?;

    pipeline
        .set_state(gst::State::Playing)
        .map_err(|e| RestreamerError::GStreamer(format!("set_state Playing: {e}")))?;

    Ok((pipeline, appsink))
}

/// Stops and releases a pipeline. Logged, never panics — called from
/// worker-thread teardown where there's nothing useful to do with an error
/// besides noting it.
pub fn teardown_pipeline(pipeline: &gst::Pipeline) {
    if let Err(e) = pipeline.set_state(gst::State::Null) {
        tracing::warn!(error = %e, "failed to set pipeline to Null on teardown");
    }
}
