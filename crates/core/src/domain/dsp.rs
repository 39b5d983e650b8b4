//! Filter stages and chains for the three-band equalizer
//!
//! This module provides the signal-path building blocks:
//! - Biquad stage (Direct Form I, bypassable)
//! - Cut chain (4 cascaded stages, slope selects how many are active)
//! - Channel chain (low-cut -> peak -> high-cut)
//!
//! Coefficient computation lives in [`design`]. Everything here is designed for:
//! - Zero allocations in the hot path
//! - Fixed per-sample cost
//! - No locks, safe to call from the audio callback

pub mod design;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Number of biquad stages in a cut chain (one per 12 dB/octave)
pub const CUT_STAGES: usize = 4;

// ============================================================================
// BIQUAD STAGE
// ============================================================================

/// Biquad filter coefficients
///
/// Normalized so that a0 is 1.0. A coefficient set is a value: stages replace
/// it wholesale and never mutate one in place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiquadCoeffs {
    /// Numerator coefficients
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    /// Denominator coefficients (a0 is normalized to 1.0)
    pub a1: f32,
    pub a2: f32,
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl BiquadCoeffs {
    /// Unity gain (no filtering)
    pub const IDENTITY: BiquadCoeffs = BiquadCoeffs {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Build from unnormalized coefficients, dividing through by `a0`
    pub(crate) fn normalized(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        Self {
            b0: (b0 / a0) as f32,
            b1: (b1 / a0) as f32,
            b2: (b2 / a0) as f32,
            a1: (a1 / a0) as f32,
            a2: (a2 / a0) as f32,
        }
    }

    pub fn is_finite(&self) -> bool {
        [self.b0, self.b1, self.b2, self.a1, self.a2]
            .iter()
            .all(|c| c.is_finite())
    }

    /// Both poles strictly inside the unit circle (stability triangle)
    pub fn is_stable(&self) -> bool {
        self.a2.abs() < 1.0 && self.a1.abs() < 1.0 + self.a2
    }

    /// Complex response `H(e^jw)` at `freq` Hz
    pub fn response(&self, freq: f64, sample_rate: f64) -> Complex64 {
        let w = 2.0 * std::f64::consts::PI * freq / sample_rate;
        // z^-1 and z^-2 on the unit circle
        let z1 = Complex64::from_polar(1.0, -w);
        let z2 = z1 * z1;

        let num = self.b0 as f64 + z1 * self.b1 as f64 + z2 * self.b2 as f64;
        let den = 1.0 + z1 * self.a1 as f64 + z2 * self.a2 as f64;
        num / den
    }

    /// Linear magnitude response at `freq` Hz
    pub fn magnitude_for_frequency(&self, freq: f64, sample_rate: f64) -> f64 {
        self.response(freq, sample_rate).norm()
    }
}

/// Stateful, bypassable biquad stage using Direct Form I
///
/// Direct Form I keeps the input history separate from the output history, so
/// swapping coefficients between blocks never corrupts the delay line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiquadStage {
    coeffs: BiquadCoeffs,
    bypassed: bool,
    // Previous input samples (x[n-1], x[n-2])
    x1: f32,
    x2: f32,
    // Previous output samples (y[n-1], y[n-2])
    y1: f32,
    y2: f32,
}

impl Default for BiquadStage {
    fn default() -> Self {
        Self::new(BiquadCoeffs::IDENTITY)
    }
}

impl BiquadStage {
    /// Create an active stage with the given coefficients
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            bypassed: false,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// Replace the active coefficient set
    ///
    /// Can be called between blocks for parameter changes. The delay line is kept.
    pub fn set_coeffs(&mut self, coeffs: BiquadCoeffs) {
        self.coeffs = coeffs;
    }

    pub fn coeffs(&self) -> &BiquadCoeffs {
        &self.coeffs
    }

    pub fn set_bypassed(&mut self, bypassed: bool) {
        self.bypassed = bypassed;
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypassed
    }

    /// Process a single sample, ignoring the bypass flag
    #[inline]
    fn process_sample(&mut self, x: f32) -> f32 {
        // Direct Form I: y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2]
        //                        - a1*y[n-1] - a2*y[n-2]
        let y = self.coeffs.b0 * x
            + self.coeffs.b1 * self.x1
            + self.coeffs.b2 * self.x2
            - self.coeffs.a1 * self.y1
            - self.coeffs.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;

        y
    }

    /// Process a buffer of samples in place
    ///
    /// A bypassed stage leaves both the buffer and its history untouched.
    pub fn process(&mut self, buffer: &mut [f32]) {
        if self.bypassed {
            return;
        }
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    /// Reset filter state
    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

// ============================================================================
// CUT CHAIN
// ============================================================================

/// Low-cut or high-cut filter of selectable order
///
/// A fixed cascade of [`CUT_STAGES`] biquads. For order N only the first N
/// stages are active; the rest are bypassed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CutChain {
    stages: [BiquadStage; CUT_STAGES],
}

impl CutChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `coefficients[..order]` into the leading stages and bypass the rest
    ///
    /// Stages at or past `order` keep their stale coefficients; they are never
    /// read while bypassed.
    ///
    /// # Panics
    /// If `order` is outside `1..=4` or fewer than `order` coefficient sets are
    /// given. The settings path cannot produce either.
    pub fn apply_slope(&mut self, coefficients: &[BiquadCoeffs], order: usize) {
        assert!(
            (1..=CUT_STAGES).contains(&order),
            "cut chain order {order} outside 1..={CUT_STAGES}"
        );
        assert!(
            coefficients.len() >= order,
            "{} coefficient sets for order {order}",
            coefficients.len()
        );

        for stage in &mut self.stages {
            stage.set_bypassed(true);
        }
        for (stage, coeffs) in self.stages.iter_mut().zip(&coefficients[..order]) {
            stage.set_coeffs(*coeffs);
            stage.set_bypassed(false);
        }
    }

    /// Number of non-bypassed stages
    pub fn active_stages(&self) -> usize {
        self.stages.iter().filter(|s| !s.is_bypassed()).count()
    }

    pub fn stage(&self, index: usize) -> &BiquadStage {
        &self.stages[index]
    }

    pub(crate) fn stage_mut(&mut self, index: usize) -> &mut BiquadStage {
        &mut self.stages[index]
    }

    pub fn stages(&self) -> &[BiquadStage; CUT_STAGES] {
        &self.stages
    }

    pub fn process(&mut self, buffer: &mut [f32]) {
        for stage in &mut self.stages {
            stage.process(buffer);
        }
    }

    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
    }

    /// Combined magnitude of the active stages
    pub fn magnitude_for_frequency(&self, freq: f64, sample_rate: f64) -> f64 {
        self.stages
            .iter()
            .filter(|s| !s.is_bypassed())
            .map(|s| s.coeffs().magnitude_for_frequency(freq, sample_rate))
            .product()
    }
}

// ============================================================================
// CHANNEL CHAIN
// ============================================================================

/// Position of a band in the channel chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainPosition {
    LowCut,
    Peak,
    HighCut,
}

/// Per-channel signal path: low-cut -> peak -> high-cut
///
/// One instance per channel. Left and right chains hold identical
/// coefficients and independent delay lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelChain {
    low_cut: CutChain,
    peak: BiquadStage,
    high_cut: CutChain,
}

impl Default for ChannelChain {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelChain {
    /// Create a chain that passes audio unchanged
    ///
    /// Cut stages start bypassed, the peak stage holds the identity filter.
    pub fn new() -> Self {
        let mut low_cut = CutChain::new();
        let mut high_cut = CutChain::new();
        for index in 0..CUT_STAGES {
            low_cut.stage_mut(index).set_bypassed(true);
            high_cut.stage_mut(index).set_bypassed(true);
        }

        Self {
            low_cut,
            peak: BiquadStage::default(),
            high_cut,
        }
    }

    pub fn low_cut(&self) -> &CutChain {
        &self.low_cut
    }

    pub fn low_cut_mut(&mut self) -> &mut CutChain {
        &mut self.low_cut
    }

    pub fn peak(&self) -> &BiquadStage {
        &self.peak
    }

    pub fn peak_mut(&mut self) -> &mut BiquadStage {
        &mut self.peak
    }

    pub fn high_cut(&self) -> &CutChain {
        &self.high_cut
    }

    pub fn high_cut_mut(&mut self) -> &mut CutChain {
        &mut self.high_cut
    }

    /// Whether the band at `position` has any active stage
    pub fn is_band_active(&self, position: ChainPosition) -> bool {
        match position {
            ChainPosition::LowCut => self.low_cut.active_stages() > 0,
            ChainPosition::Peak => !self.peak.is_bypassed(),
            ChainPosition::HighCut => self.high_cut.active_stages() > 0,
        }
    }

    /// Run a block through the cascade in place
    pub fn process(&mut self, buffer: &mut [f32]) {
        self.low_cut.process(buffer);
        self.peak.process(buffer);
        self.high_cut.process(buffer);
    }

    /// Zero every delay line without touching coefficients
    pub fn reset(&mut self) {
        self.low_cut.reset();
        self.peak.reset();
        self.high_cut.reset();
    }

    /// Linear magnitude of the whole chain at `freq` Hz
    pub fn magnitude_for_frequency(&self, freq: f64, sample_rate: f64) -> f64 {
        let peak = if self.peak.is_bypassed() {
            1.0
        } else {
            self.peak.coeffs().magnitude_for_frequency(freq, sample_rate)
        };

        self.low_cut.magnitude_for_frequency(freq, sample_rate)
            * peak
            * self.high_cut.magnitude_for_frequency(freq, sample_rate)
    }
}

// ============================================================================
// TESTS
// ============================================================================
