//! Configuration file parsing integration tests, exercising the full
//! `main.conf` INI format end-to-end via a real temp file.
//!
//! Run with: `cargo test`

use std::io::Write;

use tempfile::NamedTempFile;

use restreamer::config::Config;

fn write_conf(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp conf file");
    file.write_all(contents.as_bytes()).expect("write temp conf file");
    file
}

const SAMPLE: &str = r#"
[Router]
ip_addr = 192.168.1.1
login = admin
password = secret

[settings]
timeout = 5
connection_type = cellular
stream_monitor_interval = 10

[Profile]
resolution = 1920x1080
bitrate = 4500k
fps = 30
degradation_steps = 4
camera_login = camuser
camera_password = campass
camera_port = 554
camera_output = 192.168.1.50:5000
input_devices = cam1;192.168.1.10;/stream1,cam2;192.168.1.11;/stream2

[connection_check]
ping_ip = 8.8.8.8
curl_url = http://example.com

[adaptive_mode]
enabled = true
"#;

#[test]
fn loads_a_well_formed_config() {
    let file = write_conf(SAMPLE);
    let config = Config::from_file(file.path()).expect("config should parse");

    assert_eq!(config.router.ip_addr, "192.168.1.1");
    assert_eq!(config.router.login, "admin");
    assert_eq!(config.settings.timeout, 5);

    assert_eq!(config.profile.base.width, 1920);
    assert_eq!(config.profile.base.height, 1080);
    assert_eq!(config.profile.base.bitrate_kbps, 4500);
    assert_eq!(config.profile.base.fps, 30);
    assert_eq!(config.profile.degradation_steps, 4);
    assert_eq!(config.profile.camera_output_host, "192.168.1.50");
    assert_eq!(config.profile.camera_output_port, 5000);
    assert_eq!(config.profile.devices.len(), 2);
    assert_eq!(config.profile.devices[0].name, "cam1");
    assert_eq!(config.profile.devices[1].ip, "192.168.1.11");

    assert_eq!(config.connection_check.ping_ip, "8.8.8.8");
    assert!(config.adaptive_mode.enabled);
}

#[test]
fn rejects_missing_file() {
    let result = Config::from_file(std::path::Path::new("/nonexistent/main.conf"));
    assert!(result.is_err());
}

#[test]
fn rejects_bad_ladder_depth_via_profile_validation() {
    let bad = SAMPLE.replace("degradation_steps = 4", "degradation_steps = 0");
    let file = write_conf(&bad);
    // degradation_steps itself parses fine; the ladder rejects it later via
    // ProfileLadder::new, but the config's own validation only guards the
    // EncodingProfile fields, so this should still load successfully here.
    let config = Config::from_file(file.path()).expect("config should still parse");
    assert_eq!(config.profile.degradation_steps, 0);
}

#[test]
fn rejects_sub_floor_resolution() {
    let bad = SAMPLE.replace("resolution = 1920x1080", "resolution = 100x100");
    let file = write_conf(&bad);
    let result = Config::from_file(file.path());
    assert!(result.is_err());
}
