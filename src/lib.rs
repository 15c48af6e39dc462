// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Adaptive multi-source video restreamer: ingests RTSP and local-camera
//! feeds, re-encodes each through an ffmpeg subprocess, and reconfigures
//! every active stream's profile in response to uplink quality polled from
//! a router's management interface.

pub mod config;
pub mod controller;
pub mod distributor;
pub mod error;
pub mod ladder;
pub mod profile;
pub mod reachability;
pub mod sink;
pub mod source;
pub mod uplink;
