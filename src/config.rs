// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Configuration loading. The on-disk format is INI (`main.conf`), matching
//! the deployment this system replaces; parsing follows the same
//! "read file, parse section by section, validate, return typed struct"
//! shape as before, just with a different wire format.

use std::path::Path;

use ini::Ini;
use tracing::warn;

use crate::error::{RestreamerError, Result};
use crate::profile::EncodingProfile;

/// One entry from `[Profile] input_devices`: a network camera this process
/// should pull from and re-encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkDevice {
    pub name: String,
    pub ip: String,
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub ip_addr: String,
    pub login: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct SettingsConfig {
    /// Seconds between uplink-quality polls in adaptive mode.
    pub timeout: u64,
    /// Stored for parity with the deployment's config file; not consulted
    /// anywhere in the control flow (quality classification is derived from
    /// the router's own JSON, not from this field).
    pub connection_type: String,
    /// Stored, currently unused by any control-flow decision.
    pub stream_monitor_interval: u64,
}

#[derive(Debug, Clone)]
pub struct ProfileConfig {
    pub base: EncodingProfile,
    pub degradation_steps: u32,
    pub camera_login: String,
    pub camera_password: String,
    pub camera_port: u16,
    pub camera_output_host: String,
    pub camera_output_port: u16,
    pub devices: Vec<NetworkDevice>,
}

#[derive(Debug, Clone)]
pub struct ConnectionCheckConfig {
    pub ping_ip: String,
    pub curl_url: String,
}

#[derive(Debug, Clone)]
pub struct AdaptiveModeConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub router: RouterConfig,
    pub settings: SettingsConfig,
    pub profile: ProfileConfig,
    pub connection_check: ConnectionCheckConfig,
    pub adaptive_mode: AdaptiveModeConfig,
}

impl Config {
    /// Load and validate `main.conf`-style INI configuration from `path`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let ini = Ini::load_from_file(path)
            .map_err(|e| RestreamerError::Config(format!("cannot read config file: {e}")))?;

        let router = RouterConfig {
            ip_addr: get(&ini, "Router", "ip_addr")?,
            login: get(&ini, "Router", "login")?,
            password: get(&ini, "Router", "password")?,
        };

        let settings = SettingsConfig {
            timeout: get_parsed(&ini, "settings", "timeout")?,
            connection_type: get(&ini, "settings", "connection_type")?,
            stream_monitor_interval: get_parsed(&ini, "settings", "stream_monitor_interval")?,
        };

        let (width, height) = parse_resolution(&get(&ini, "Profile", "resolution")?)?;
        let bitrate_kbps = parse_bitrate(&get(&ini, "Profile", "bitrate")?)?;
        let fps: u32 = get_parsed(&ini, "Profile", "fps")?;
        let base = EncodingProfile::new(width, height, bitrate_kbps, fps)?;

        let (camera_output_host, camera_output_port) =
            parse_host_port(&get(&ini, "Profile", "camera_output")?)?;

        let devices = parse_input_devices(&get(&ini, "Profile", "input_devices")?);

        let profile = ProfileConfig {
            base,
            degradation_steps: get_parsed(&ini, "Profile", "degradation_steps")?,
            camera_login: get(&ini, "Profile", "camera_login")?,
            camera_password: get(&ini, "Profile", "camera_password")?,
            camera_port: get_parsed(&ini, "Profile", "camera_port")?,
            camera_output_host,
            camera_output_port,
            devices,
        };

        let connection_check = ConnectionCheckConfig {
            ping_ip: get(&ini, "connection_check", "ping_ip")?,
            curl_url: get(&ini, "connection_check", "curl_url")?,
        };

        let adaptive_mode = AdaptiveModeConfig {
            enabled: get_parsed::<String>(&ini, "adaptive_mode", "enabled")?
                .eq_ignore_ascii_case("true"),
        };

        Ok(Self { router, settings, profile, connection_check, adaptive_mode })
    }
}

fn get(ini: &Ini, section: &str, key: &str) -> Result<String> {
    ini.section(Some(section))
        .and_then(|s| s.get(key))
        .map(str::to_owned)
        .ok_or_else(|| RestreamerError::Config(format!("missing [{section}] {key}")))
}

fn get_parsed<T: std::str::FromStr>(ini: &Ini, section: &str, key: &str) -> Result<T> {
    let raw = get(ini, section, key)?;
    raw.trim()
        .parse::<T>()
        .map_err(|_| RestreamerError::Config(format!("[{section}] {key} = '{raw}' is not valid")))
}

fn parse_resolution(raw: &str) -> Result<(u32, u32)> {
    let (w, h) = raw
        .split_once('x')
        .ok_or_else(|| RestreamerError::Config(format!("invalid resolution '{raw}'")))?;
    let width = w
        .trim()
        .parse()
        .map_err(|_| RestreamerError::Config(format!("invalid resolution width in '{raw}'")))?;
    let height = h
        .trim()
        .parse()
        .map_err(|_| RestreamerError::Config(format!("invalid resolution height in '{raw}'")))?;
    Ok((width, height))
}

/// `bitrate` is given like `4500k`; the trailing unit is optional.
fn parse_bitrate(raw: &str) -> Result<u32> {
    let trimmed = raw.trim().trim_end_matches(['k', 'K']);
    trimmed
        .parse()
        .map_err(|_| RestreamerError::Config(format!("invalid bitrate '{raw}'")))
}

fn parse_host_port(raw: &str) -> Result<(String, u16)> {
    let (host, port) = raw
        .rsplit_once(':')
        .ok_or_else(|| RestreamerError::Config(format!("invalid host:port '{raw}'")))?;
    let port: u16 = port
        .parse()
        .map_err(|_| RestreamerError::Config(format!("invalid port in '{raw}'")))?;
    Ok((host.to_string(), port))
}

/// Parses `name;ip;path` triples separated by commas. Entries with fewer
/// than three fields are skipped with a warning rather than aborting
/// startup — a malformed line shouldn't take down every other camera.
fn parse_input_devices(raw: &str) -> Vec<NetworkDevice> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let fields: Vec<&str> = entry.split(';').map(str::trim).collect();
            if fields.len() < 3 {
                warn!(entry, "skipping malformed input_devices entry, expected name;ip;path");
                return None;
            }
            Some(NetworkDevice {
                name: fields[0].to_string(),
                ip: fields[1].to_string(),
                path: fields[2].to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_devices() {
        let devices = parse_input_devices("cam1;192.168.1.10;/stream1,cam2;192.168.1.11;/stream2");
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].name, "cam1");
        assert_eq!(devices[1].ip, "192.168.1.11");
    }

    #[test]
    fn skips_malformed_entries_without_failing() {
        let devices =
            parse_input_devices("cam1;192.168.1.10;/stream1,bad_entry,cam2;192.168.1.11;/stream2");
        assert_eq!(devices.len(), 2);
    }

    #[test]
    fn parses_resolution_and_bitrate() {
        assert_eq!(parse_resolution("1920x1080").unwrap(), (1920, 1080));
        assert_eq!(parse_bitrate("4500k").unwrap(), 4500);
        assert_eq!(parse_bitrate("4500").unwrap(), 4500);
    }

    #[test]
    fn parses_host_port() {
        assert_eq!(
            parse_host_port("192.168.1.50:5000").unwrap(),
            ("192.168.1.50".to_string(), 5000)
        );
    }
}
