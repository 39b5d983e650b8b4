//! Audio stream abstractions and domain errors
//!
//! This module defines the vocabulary shared by the signal path: the error
//! taxonomy, a validated sample rate and the two channels of a stereo stream.
//! Host integration (device negotiation, buffer formats) lives outside the core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur in the signal path
///
/// Variants carry plain values and are `Copy`; building one on the audio
/// thread never allocates. Text is produced only when displayed.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum AudioError {
    /// A corner or center frequency outside (0, Nyquist)
    #[error("Invalid frequency: {freq} Hz outside (0, {nyquist}) Hz")]
    InvalidFrequency { freq: f32, nyquist: f32 },

    /// A quality factor that is not strictly positive and finite
    #[error("Invalid quality: {0} must be positive")]
    InvalidQuality(f32),

    /// A gain that is not finite
    #[error("Invalid gain: {0} dB is not finite")]
    InvalidGain(f32),

    /// A host slope choice outside the slope list
    #[error("Invalid slope index: {0} outside 0..=3")]
    InvalidSlopeIndex(usize),

    /// The sample rate is zero, negative or not finite
    #[error("Invalid sample rate: {0} Hz")]
    InvalidSampleRate(f32),
}

pub type Result<T> = std::result::Result<T, AudioError>;

/// Audio sample rate in Hz
///
/// Always strictly positive and finite once constructed.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct SampleRate(f32);

impl SampleRate {
    pub const HZ_44100: SampleRate = SampleRate(44100.0);
    pub const HZ_48000: SampleRate = SampleRate(48000.0);

    pub fn new(hz: f32) -> Result<Self> {
        if hz.is_finite() && hz > 0.0 {
            Ok(Self(hz))
        } else {
            Err(AudioError::InvalidSampleRate(hz))
        }
    }

    pub fn hz(&self) -> f32 {
        self.0
    }

    pub fn nyquist(&self) -> f32 {
        self.0 * 0.5
    }
}

impl TryFrom<f32> for SampleRate {
    type Error = AudioError;

    fn try_from(hz: f32) -> Result<Self> {
        Self::new(hz)
    }
}

impl From<SampleRate> for f32 {
    fn from(rate: SampleRate) -> Self {
        rate.0
    }
}

impl Default for SampleRate {
    fn default() -> Self {
        Self::HZ_48000
    }
}

/// One side of the stereo signal path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Left,
    Right,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Left, Channel::Right];

    pub fn index(&self) -> usize {
        match self {
            Channel::Left => 0,
            Channel::Right => 1,
        }
    }
}
