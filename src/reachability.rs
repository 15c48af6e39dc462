//! Startup-time reachability check: one ICMP echo and one HTTP GET, both of
//! which must succeed. Run exactly once, before the controller starts
//! anything — if it fails, the process exits rather than limping along on a
//! link that can't even pass a sanity check.

use std::net::IpAddr;
use std::time::Duration;

use surge_ping::{Client, Config, PingIdentifier, PingSequence};
use tracing::warn;

/// Pings `ping_ip` and GETs `curl_url`, concurrently, both bounded by
/// `timeout`. Returns `true` only if both succeed.
pub async fn check_connection(ping_ip: &str, curl_url: &str, timeout: Duration) -> bool {
    let (ping_ok, http_ok) = tokio::join!(check_ping(ping_ip, timeout), check_http(curl_url, timeout));
    ping_ok && http_ok
}

async fn check_ping(ping_ip: &str, timeout: Duration) -> bool {
    let addr: IpAddr = match ping_ip.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!(ping_ip, error = %e, "reachability check: invalid ping address");
            return false;
        }
    };

    let client = match Client::new(&Config::default()) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "reachability check: failed to create ICMP client");
            return false;
        }
    };

    let mut pinger = client.pinger(addr, PingIdentifier(std::process::id() as u16)).await;
    pinger.timeout(timeout);

    match tokio::time::timeout(timeout, pinger.ping(PingSequence(0), b"restreamer-reachability")).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            warn!(ping_ip, error = %e, "reachability check: ping failed");
            false
        }
        Err(_) => {
            warn!(ping_ip, "reachability check: ping timed out");
            false
        }
    }
}

async fn check_http(curl_url: &str, timeout: Duration) -> bool {
    let client = match reqwest::Client::builder().timeout(timeout).build() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "reachability check: failed to build HTTP client");
            return false;
        }
    };

    match client.get(curl_url).send().await {
        Ok(resp) => resp.status().is_success(),
        Err(e) => {
            warn!(curl_url, error = %e, "reachability check: HTTP GET failed");
            false
        }
    }
}
