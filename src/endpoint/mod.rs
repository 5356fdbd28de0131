//! Endpoint (end-of-utterance) detection
//!
//! One energy-threshold detector per capture. The sampler polls the live
//! level on a fixed cadence and stops as soon as capture does.

mod detector;
mod sampler;

pub use detector::{DetectorEvent, EndpointDetector};
pub use sampler::{EndpointReason, Sampler};
