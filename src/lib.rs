//! Real-time waste detection and counting.
//!
//! `domain` holds the pure rules (ROI filter, dedup tracker, counts, session
//! states), `application` the ports, services and the detection loop, and
//! `adapters` the V4L2 camera, ONNX Runtime detector, JPEG renderer and the
//! axum dashboard API.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
