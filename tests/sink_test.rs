//! Encoder sink integration tests: hot-swap and broken-pipe recovery,
//! using stand-in programs (`cat`, `true`) in place of `ffmpeg` so these
//! don't depend on an encoder actually being installed.
//!
//! Run with: `cargo test`

use restreamer::profile::EncodingProfile;
use restreamer::sink::{EncoderSink, SinkEndpoint};

fn endpoint() -> SinkEndpoint {
    SinkEndpoint { host: "127.0.0.1".into(), port: 5004 }
}

fn profile(bitrate_kbps: u32) -> EncodingProfile {
    EncodingProfile::new(1920, 1080, bitrate_kbps, 30).unwrap()
}

#[test]
fn apply_profile_swaps_to_the_new_profile_and_stays_active() {
    let sink = EncoderSink::with_program("cam1", endpoint(), profile(4500), "cat").expect("spawn cat");
    assert_eq!(sink.current_profile(), profile(4500));
    assert!(sink.is_active());

    sink.consume_frame(b"frame-at-old-profile");

    sink.apply_profile(profile(1200)).expect("apply_profile should succeed");

    assert_eq!(sink.current_profile(), profile(1200));
    assert!(sink.is_active());

    sink.consume_frame(b"frame-at-new-profile");

    sink.close();
    assert!(!sink.is_active());
}

#[test]
fn apply_profile_with_identical_profile_is_a_no_op() {
    let sink = EncoderSink::with_program("cam1", endpoint(), profile(4500), "cat").expect("spawn cat");
    sink.apply_profile(profile(4500)).expect("idempotent apply_profile should succeed");
    assert_eq!(sink.current_profile(), profile(4500));
    assert!(sink.is_active());
    sink.close();
}

#[test]
fn broken_pipe_is_swallowed_and_sink_recovers_on_next_apply_profile() {
    // `true` exits immediately, so its stdin is closed almost at once —
    // the next `consume_frame` hits a broken pipe.
    let sink = EncoderSink::with_program("cam1", endpoint(), profile(4500), "true").expect("spawn true");
    std::thread::sleep(std::time::Duration::from_millis(50));

    // Must not panic or propagate the broken-pipe error to the caller.
    sink.consume_frame(b"frame-after-process-exited");

    // The next apply_profile respawns a fresh child and frames are accepted again.
    sink.apply_profile(profile(1200)).expect("apply_profile should succeed even after a broken pipe");
    sink.consume_frame(b"frame-after-recovery");

    sink.close();
}

#[test]
fn close_then_consume_frame_is_a_silent_no_op() {
    let sink = EncoderSink::with_program("cam1", endpoint(), profile(4500), "cat").expect("spawn cat");
    sink.close();
    assert!(!sink.is_active());
    sink.consume_frame(b"dropped-because-sink-is-closed");
}
