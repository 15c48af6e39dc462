// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Uplink probe: authenticates against the router's JSON-over-HTTP
//! management interface (RCI — "Remote Control Interface", the Keenetic
//! router API this was modeled on) and turns its interface inventory into a
//! [`QualityReport`].
//!
//! Authentication is HTTP digest-ish challenge/response: a GET that comes
//! back `401` carries a realm and challenge in headers; the client hashes
//! `login:realm:password` with MD5, then SHA-256s the challenge against that
//! hash, and POSTs the result back as the password. An already-`200` GET
//! means the session (held via the client's cookie jar) is still live.

use std::time::Duration;

use md5::{Digest as _, Md5};
use reqwest::Client;
use serde_json::Value;
use sha2::{Digest as _, Sha256};

use crate::error::{RestreamerError, Result};

/// Uplink quality summary: a 0-100 score and the degradation level it maps
/// to under the configured ladder depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityReport {
    pub score: u32,
    pub level: usize,
}

/// Maps a 0-100 score onto a degradation level in `[0, max_level]`. Higher
/// score means lower (better) level. `step = 100 / max_level`; `max_level`
/// is always in `1..=10` (enforced by [`crate::ladder::ProfileLadder::new`]),
/// so `step` is never zero.
pub fn level_from_score(score: u32, max_level: usize) -> usize {
    let step = 100 / max_level as u32;
    let level = (100u32.saturating_sub(score)) / step;
    (level as usize).min(max_level)
}

fn normalize(value: f64, min: f64, max: f64) -> f64 {
    ((value - min) / (max - min)).clamp(0.0, 1.0)
}

fn field_f64(obj: &serde_json::Map<String, Value>, key: &str) -> Result<f64> {
    match obj.get(key) {
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| RestreamerError::ProbeFailed(format!("field '{key}' is not numeric"))),
        Some(Value::String(s)) => s
            .parse()
            .map_err(|_| RestreamerError::ProbeFailed(format!("field '{key}' = '{s}' is not a number"))),
        _ => Err(RestreamerError::ProbeFailed(format!("missing field '{key}'"))),
    }
}

/// Walks the interface tree looking for the highest-`priority` node marked
/// connected (`connected == "yes"` or `status == "connected"`), returning
/// its `id`. A node with `priority <= 0` never wins, even if it's the only
/// connected one — this mirrors the router client this was modeled on
/// exactly (its `priority` accumulator starts at zero and only a strictly
/// greater candidate replaces it).
fn find_used_connection(data: &Value) -> Option<String> {
    let mut best_id: Option<String> = None;
    let mut best_priority: i64 = 0;

    fn recurse(node: &Value, best_id: &mut Option<String>, best_priority: &mut i64) {
        match node {
            Value::Object(map) => {
                let connected = map.get("connected").and_then(Value::as_str) == Some("yes");
                let status_connected = map.get("status").and_then(Value::as_str) == Some("connected");
                if connected || status_connected {
                    let priority = map.get("priority").and_then(Value::as_i64).unwrap_or(0);
                    if priority > *best_priority {
                        if let Some(id) = map.get("id").and_then(Value::as_str) {
                            *best_id = Some(id.to_string());
                            *best_priority = priority;
                        }
                    }
                }
                for value in map.values() {
                    recurse(value, best_id, best_priority);
                }
            }
            Value::Array(items) => {
                for item in items {
                    recurse(item, best_id, best_priority);
                }
            }
            _ => {}
        }
    }

    recurse(data, &mut best_id, &mut best_priority);
    best_id
}

fn score_cellular(iface: &serde_json::Map<String, Value>) -> Result<u32> {
    let rssi = field_f64(iface, "rssi")?;
    let rsrp = field_f64(iface, "rsrp")?;
    let cinr = field_f64(iface, "cinr")?;

    let rssi_n = normalize(rssi, -80.0, -50.0);
    let rsrp_n = normalize(rsrp, -120.0, -85.0);
    let cinr_n = normalize(cinr, 0.0, 20.0);

    let score = (rssi_n * 30.0 + rsrp_n * 40.0 + cinr_n * 30.0).round();
    Ok((score as i64).clamp(0, 100) as u32)
}

fn score_wifi_station(iface: &serde_json::Map<String, Value>) -> Result<u32> {
    let rssi = field_f64(iface, "rssi")?;
    let noise = field_f64(iface, "noise")?;
    let mcs = field_f64(iface, "mcs")?;
    let nss = field_f64(iface, "nss")?;

    let snr_n = normalize(rssi - noise, 0.0, 50.0);
    let mcs_n = normalize(mcs, 0.0, 11.0);
    let nss_n = normalize(nss, 1.0, 4.0);

    let score = (snr_n * 50.0 + mcs_n * 30.0 + nss_n * 20.0).round();
    Ok((score as i64).clamp(0, 100) as u32)
}

/// Authenticates to and interrogates one router over its JSON-over-HTTP
/// management surface. Cheap to clone: the `reqwest::Client` is internally
/// `Arc`'d, and the cookie jar it carries is what keeps a session live
/// across calls.
#[derive(Clone)]
pub struct UplinkProbe {
    ip: String,
    login: String,
    password: String,
    timeout: Duration,
    max_level: usize,
    client: Client,
}

impl UplinkProbe {
    pub fn new(ip: String, login: String, password: String, timeout: Duration, max_level: usize) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .map_err(RestreamerError::Http)?;
        Ok(Self { ip, login, password, timeout, max_level, client })
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}/{}", self.ip, path)
    }

    /// Performs the digest challenge/response against `/auth`. Returns
    /// `Ok(true)` once the session is authenticated (either immediately, or
    /// after a successful challenge response); any rejection or unexpected
    /// status surfaces as [`RestreamerError::AuthFailed`].
    pub async fn authenticate(&self) -> Result<bool> {
        let resp = self.client.get(self.url("auth")).send().await?;

        match resp.status().as_u16() {
            200 => Ok(true),
            401 => {
                let realm = header_str(&resp, "X-NDM-Realm");
                let challenge = header_str(&resp, "X-NDM-Challenge");

                let h1 = hex::encode(Md5::digest(
                    format!("{}:{}:{}", self.login, realm, self.password).as_bytes(),
                ));
                let response_hash = hex::encode(Sha256::digest(format!("{challenge}{h1}").as_bytes()));

                let post = self
                    .client
                    .post(self.url("auth"))
                    .json(&serde_json::json!({ "login": self.login, "password": response_hash }))
                    .send()
                    .await?;

                if post.status().is_success() {
                    Ok(true)
                } else {
                    Err(RestreamerError::AuthFailed(format!(
                        "router rejected challenge response: {}",
                        post.status()
                    )))
                }
            }
            other => Err(RestreamerError::AuthFailed(format!("unexpected status from /auth: {other}"))),
        }
    }

    /// Fetches the interface inventory once, finds the active uplink, and
    /// scores it. Called exactly once per monitoring iteration — earlier
    /// revisions of the system this was modeled on called this twice per
    /// loop and discarded the first result, with no documented reason; that
    /// is not reproduced here.
    pub async fn get_connection_info(&self) -> Result<QualityReport> {
        let resp = self.client.get(self.url("rci/show/interface")).send().await?;
        let data: Value = resp
            .json()
            .await
            .map_err(|e| RestreamerError::ProbeFailed(format!("invalid JSON from router: {e}")))?;

        let id = find_used_connection(&data)
            .ok_or_else(|| RestreamerError::ProbeFailed("no connected uplink found".into()))?;

        let iface = data
            .get(&id)
            .and_then(Value::as_object)
            .ok_or_else(|| RestreamerError::ProbeFailed(format!("interface '{id}' missing from response")))?;

        let kind = iface.get("type").and_then(Value::as_str).unwrap_or_default();
        let score = if kind == "WifiStation" {
            score_wifi_station(iface)?
        } else {
            score_cellular(iface)?
        };

        let level = level_from_score(score, self.max_level);
        Ok(QualityReport { score, level })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

fn header_str(resp: &reqwest::Response, name: &str) -> String {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn level_from_score_matches_worked_example() {
        // Scenario S3: score=53, L=5 -> level=2.
        assert_eq!(level_from_score(53, 5), 2);
    }

    #[test]
    fn level_from_score_is_inverse_monotone() {
        let max_level = 5;
        let scores = [0u32, 10, 33, 50, 53, 70, 90, 100];
        for &a in &scores {
            for &b in &scores {
                if a >= b {
                    assert!(level_from_score(a, max_level) <= level_from_score(b, max_level));
                }
            }
        }
    }

    #[test]
    fn level_from_score_clamped_to_max() {
        assert_eq!(level_from_score(0, 5), 5);
        assert_eq!(level_from_score(100, 5), 0);
    }

    #[test]
    fn cellular_scoring_matches_worked_example() {
        // Scenario S3: rssi=-65, rsrp=-100, cinr=10 -> score=53.
        let iface = json!({ "rssi": -65, "rsrp": -100, "cinr": 10 });
        let score = score_cellular(iface.as_object().unwrap()).unwrap();
        assert_eq!(score, 53);
    }

    #[test]
    fn cellular_scoring_accepts_stringified_numbers() {
        let iface = json!({ "rssi": "-65", "rsrp": "-100", "cinr": "10" });
        let score = score_cellular(iface.as_object().unwrap()).unwrap();
        assert_eq!(score, 53);
    }

    #[test]
    fn wifi_scoring_rewards_higher_snr_mcs_nss() {
        let weak = json!({ "rssi": -70, "noise": -90, "mcs": 2, "nss": 1 });
        let strong = json!({ "rssi": -40, "noise": -95, "mcs": 10, "nss": 3 });
        let weak_score = score_wifi_station(weak.as_object().unwrap()).unwrap();
        let strong_score = score_wifi_station(strong.as_object().unwrap()).unwrap();
        assert!(strong_score > weak_score);
    }

    #[test]
    fn find_used_connection_picks_highest_priority_connected_node() {
        let data = json!({
            "Gi0": { "connected": "no", "priority": 5, "id": "Gi0" },
            "usb0": { "connected": "yes", "priority": 1, "id": "usb0", "type": "Cellular" },
            "WifiStation0": { "status": "connected", "priority": 2, "id": "WifiStation0", "type": "WifiStation" },
        });
        assert_eq!(find_used_connection(&data).as_deref(), Some("WifiStation0"));
    }

    #[test]
    fn find_used_connection_ignores_zero_priority_nodes() {
        let data = json!({
            "lan0": { "connected": "yes", "priority": 0, "id": "lan0" },
        });
        assert_eq!(find_used_connection(&data), None);
    }

    #[test]
    fn find_used_connection_recurses_into_nested_arrays() {
        let data = json!({
            "interfaces": [
                { "connected": "no", "priority": 9, "id": "decoy" },
                { "connected": "yes", "priority": 3, "id": "real", "type": "Cellular" }
            ]
        });
        assert_eq!(find_used_connection(&data).as_deref(), Some("real"));
    }
}
