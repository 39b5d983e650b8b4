//! Real-time signal path of a three-band parametric equalizer
//!
//! Low-cut, peak and high-cut filters built from cascaded biquads, applied
//! to a stereo stream with lock-free coefficient updates.

pub mod domain;
