//! Settings snapshot for the equalizer
//!
//! [`ChainSettings`] captures every user-facing parameter at the moment a
//! coefficient update is triggered. It is a plain value: the host builds a
//! fresh one from its parameter registry on every request.
//!
//! [`ParameterStore`] is a lock-free registry the control context writes and
//! any context may snapshot.

use crate::domain::audio::{AudioError, Result, SampleRate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

/// Parameter ranges exposed to the host
///
/// The designer itself accepts anything inside (0, Nyquist); these are the
/// ranges a control surface offers, used by [`ChainSettings::sanitized`].
pub mod params {
    /// Frequency range for all three bands (Hz)
    pub const FREQ_MIN: f32 = 20.0;
    pub const FREQ_MAX: f32 = 20000.0;

    /// Peak gain range (dB)
    pub const GAIN_MIN: f32 = -24.0;
    pub const GAIN_MAX: f32 = 24.0;

    /// Peak quality range
    pub const Q_MIN: f32 = 0.1;
    pub const Q_MAX: f32 = 10.0;

    /// Defaults of a freshly instantiated processor
    pub const DEFAULT_PEAK_FREQ: f32 = 750.0;
    pub const DEFAULT_PEAK_Q: f32 = 1.0;

    /// Highest usable frequency as a fraction of Nyquist
    pub const NYQUIST_MARGIN: f32 = 0.999;
}

/// Roll-off of a cut filter
///
/// Each step adds one second-order stage, i.e. 12 dB/octave.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slope {
    #[default]
    Db12,
    Db24,
    Db36,
    Db48,
}

impl Slope {
    pub const ALL: [Slope; 4] = [Slope::Db12, Slope::Db24, Slope::Db36, Slope::Db48];

    /// Number of cascaded biquad stages
    pub fn order(&self) -> usize {
        match self {
            Slope::Db12 => 1,
            Slope::Db24 => 2,
            Slope::Db36 => 3,
            Slope::Db48 => 4,
        }
    }

    pub fn db_per_octave(&self) -> u32 {
        12 * self.order() as u32
    }

    /// Map a host choice index (0 = 12 dB/oct) to a slope
    pub fn from_index(index: usize) -> Result<Self> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or(AudioError::InvalidSlopeIndex(index))
    }

    pub fn index(&self) -> usize {
        self.order() - 1
    }
}

impl fmt::Display for Slope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} dB/oct", self.db_per_octave())
    }
}

/// Snapshot of every equalizer parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainSettings {
    pub peak_freq: f32,
    pub peak_gain_db: f32,
    pub peak_quality: f32,
    pub low_cut_freq: f32,
    pub high_cut_freq: f32,
    pub low_cut_slope: Slope,
    pub high_cut_slope: Slope,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            peak_freq: params::DEFAULT_PEAK_FREQ,
            peak_gain_db: 0.0,
            peak_quality: params::DEFAULT_PEAK_Q,
            low_cut_freq: params::FREQ_MIN,
            high_cut_freq: params::FREQ_MAX,
            low_cut_slope: Slope::Db12,
            high_cut_slope: Slope::Db12,
        }
    }
}

impl ChainSettings {
    /// Clamp every field into the host ranges and below Nyquist
    ///
    /// Non-finite values fall back to the defaults. This is the
    /// settings-collection step; the designer never clamps.
    #[must_use]
    pub fn sanitized(&self, sample_rate: SampleRate) -> Self {
        let defaults = Self::default();
        let upper = params::FREQ_MAX.min(sample_rate.nyquist() * params::NYQUIST_MARGIN);
        let lower = params::FREQ_MIN.min(upper);

        let freq = |value: f32, fallback: f32| {
            (if value.is_finite() { value } else { fallback }).clamp(lower, upper)
        };
        let finite_or = |value: f32, fallback: f32| {
            if value.is_finite() {
                value
            } else {
                fallback
            }
        };

        Self {
            peak_freq: freq(self.peak_freq, defaults.peak_freq),
            peak_gain_db: finite_or(self.peak_gain_db, defaults.peak_gain_db)
                .clamp(params::GAIN_MIN, params::GAIN_MAX),
            peak_quality: finite_or(self.peak_quality, defaults.peak_quality)
                .clamp(params::Q_MIN, params::Q_MAX),
            low_cut_freq: freq(self.low_cut_freq, defaults.low_cut_freq),
            high_cut_freq: freq(self.high_cut_freq, defaults.high_cut_freq),
            low_cut_slope: self.low_cut_slope,
            high_cut_slope: self.high_cut_slope,
        }
    }
}

/// Pull-style accessor for the current settings
pub trait SettingsSource: Send + Sync {
    fn chain_settings(&self) -> ChainSettings;
}

impl SettingsSource for ChainSettings {
    fn chain_settings(&self) -> ChainSettings {
        *self
    }
}

/// Lock-free parameter registry
///
/// Each field is stored as the bit pattern of an `f32` (or a slope index) in
/// its own atomic, so writers never block readers. A snapshot may combine
/// fields written by two different `store` calls; each field is always whole.
#[derive(Debug)]
pub struct ParameterStore {
    peak_freq: AtomicU32,
    peak_gain_db: AtomicU32,
    peak_quality: AtomicU32,
    low_cut_freq: AtomicU32,
    high_cut_freq: AtomicU32,
    low_cut_slope: AtomicU8,
    high_cut_slope: AtomicU8,
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new(ChainSettings::default())
    }
}

impl ParameterStore {
    pub fn new(settings: ChainSettings) -> Self {
        Self {
            peak_freq: AtomicU32::new(settings.peak_freq.to_bits()),
            peak_gain_db: AtomicU32::new(settings.peak_gain_db.to_bits()),
            peak_quality: AtomicU32::new(settings.peak_quality.to_bits()),
            low_cut_freq: AtomicU32::new(settings.low_cut_freq.to_bits()),
            high_cut_freq: AtomicU32::new(settings.high_cut_freq.to_bits()),
            low_cut_slope: AtomicU8::new(settings.low_cut_slope.index() as u8),
            high_cut_slope: AtomicU8::new(settings.high_cut_slope.index() as u8),
        }
    }

    /// Replace every parameter
    pub fn store(&self, settings: &ChainSettings) {
        self.set_peak(settings.peak_freq, settings.peak_gain_db, settings.peak_quality);
        self.set_low_cut(settings.low_cut_freq, settings.low_cut_slope);
        self.set_high_cut(settings.high_cut_freq, settings.high_cut_slope);
    }

    pub fn set_peak(&self, freq: f32, gain_db: f32, quality: f32) {
        self.peak_freq.store(freq.to_bits(), Ordering::Release);
        self.peak_gain_db.store(gain_db.to_bits(), Ordering::Release);
        self.peak_quality.store(quality.to_bits(), Ordering::Release);
    }

    pub fn set_low_cut(&self, freq: f32, slope: Slope) {
        self.low_cut_freq.store(freq.to_bits(), Ordering::Release);
        self.low_cut_slope.store(slope.index() as u8, Ordering::Release);
    }

    pub fn set_high_cut(&self, freq: f32, slope: Slope) {
        self.high_cut_freq.store(freq.to_bits(), Ordering::Release);
        self.high_cut_slope.store(slope.index() as u8, Ordering::Release);
    }

    fn load_f32(value: &AtomicU32) -> f32 {
        f32::from_bits(value.load(Ordering::Acquire))
    }

    fn load_slope(value: &AtomicU8) -> Slope {
        // Only `Slope::index` values are ever stored
        Slope::ALL[value.load(Ordering::Acquire) as usize % Slope::ALL.len()]
    }
}

impl SettingsSource for ParameterStore {
    fn chain_settings(&self) -> ChainSettings {
        ChainSettings {
            peak_freq: Self::load_f32(&self.peak_freq),
            peak_gain_db: Self::load_f32(&self.peak_gain_db),
            peak_quality: Self::load_f32(&self.peak_quality),
            low_cut_freq: Self::load_f32(&self.low_cut_freq),
            high_cut_freq: Self::load_f32(&self.high_cut_freq),
            low_cut_slope: Self::load_slope(&self.low_cut_slope),
            high_cut_slope: Self::load_slope(&self.high_cut_slope),
        }
    }
}
