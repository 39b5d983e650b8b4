//! Coefficient designer
//!
//! Pure functions mapping musical parameters (frequency, Q, gain, slope) to
//! biquad coefficient sets, using the RBJ cookbook formulas. Nothing here
//! allocates, so a full redesign may run on the audio callback.
//!
//! Parameters are validated, never clamped: clamping belongs to whoever
//! collects the settings (see [`ChainSettings::sanitized`]).
//!
//! [`ChainSettings::sanitized`]: crate::domain::settings::ChainSettings::sanitized

use super::{BiquadCoeffs, CUT_STAGES};
use crate::domain::audio::{AudioError, Result, SampleRate};
use crate::domain::settings::Slope;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::ops::Deref;

/// Q of a single second-order Butterworth section
pub const BUTTERWORTH_Q: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// How the stages of a cut filter cascade are designed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeDesign {
    /// Every stage reuses one base design at Q = 0.7071.
    ///
    /// Each stage adds 12 dB/octave, but the knee sags by 3 dB per stage at the
    /// cutoff. This matches the response existing sessions were mixed with.
    #[default]
    Repeated,
    /// Textbook Butterworth decomposition with a distinct Q per stage,
    /// `Q_k = 1 / (2 cos((2k + 1) pi / 4N))`. -3 dB at the cutoff for any order.
    Butterworth,
}

impl CascadeDesign {
    /// Q of stage `stage` in a cascade of `order` second-order sections
    pub fn stage_q(&self, order: usize, stage: usize) -> f32 {
        match self {
            CascadeDesign::Repeated => BUTTERWORTH_Q,
            CascadeDesign::Butterworth => {
                let angle = (2 * stage + 1) as f64 * PI / (4 * order) as f64;
                (1.0 / (2.0 * angle.cos())) as f32
            }
        }
    }
}

/// Ordered coefficient sets for a cut filter, one per active stage
///
/// Fixed capacity of [`CUT_STAGES`]; derefs to a slice of length `order`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CutCoefficients {
    stages: [BiquadCoeffs; CUT_STAGES],
    order: usize,
}

impl CutCoefficients {
    pub fn order(&self) -> usize {
        self.order
    }

    pub fn as_slice(&self) -> &[BiquadCoeffs] {
        &self.stages[..self.order]
    }
}

impl Deref for CutCoefficients {
    type Target = [BiquadCoeffs];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

fn check_frequency(freq: f32, sample_rate: SampleRate) -> Result<()> {
    if !freq.is_finite() || freq <= 0.0 || freq >= sample_rate.nyquist() {
        return Err(AudioError::InvalidFrequency {
            freq,
            nyquist: sample_rate.nyquist(),
        });
    }
    Ok(())
}

fn check_quality(q: f32) -> Result<()> {
    if !q.is_finite() || q <= 0.0 {
        return Err(AudioError::InvalidQuality(q));
    }
    Ok(())
}

/// Angular frequency terms shared by every RBJ design: (cos w0, alpha)
fn rbj_terms(freq: f32, sample_rate: SampleRate, q: f32) -> (f64, f64) {
    let w0 = 2.0 * PI * freq as f64 / sample_rate.hz() as f64;
    let alpha = w0.sin() / (2.0 * q as f64);
    (w0.cos(), alpha)
}

/// Peaking EQ filter
///
/// Boosts or cuts around `freq` by `gain_db`. At exactly 0 dB the zeros
/// cancel the poles and the identity filter is returned.
pub fn peak_filter(
    freq: f32,
    sample_rate: SampleRate,
    q: f32,
    gain_db: f32,
) -> Result<BiquadCoeffs> {
    check_frequency(freq, sample_rate)?;
    check_quality(q)?;
    if !gain_db.is_finite() {
        return Err(AudioError::InvalidGain(gain_db));
    }
    if gain_db == 0.0 {
        return Ok(BiquadCoeffs::IDENTITY);
    }

    // sqrt of the linear gain 10^(dB/20), split between zeros and poles
    let a = 10.0_f64.powf(gain_db as f64 / 40.0);
    let (cos_w0, alpha) = rbj_terms(freq, sample_rate, q);

    Ok(BiquadCoeffs::normalized(
        1.0 + alpha * a,
        -2.0 * cos_w0,
        1.0 - alpha * a,
        1.0 + alpha / a,
        -2.0 * cos_w0,
        1.0 - alpha / a,
    ))
}

/// Second-order low-pass filter
pub fn low_pass(freq: f32, sample_rate: SampleRate, q: f32) -> Result<BiquadCoeffs> {
    check_frequency(freq, sample_rate)?;
    check_quality(q)?;

    let (cos_w0, alpha) = rbj_terms(freq, sample_rate, q);
    let b1 = 1.0 - cos_w0;

    Ok(BiquadCoeffs::normalized(
        b1 / 2.0,
        b1,
        b1 / 2.0,
        1.0 + alpha,
        -2.0 * cos_w0,
        1.0 - alpha,
    ))
}

/// Second-order high-pass filter
pub fn high_pass(freq: f32, sample_rate: SampleRate, q: f32) -> Result<BiquadCoeffs> {
    check_frequency(freq, sample_rate)?;
    check_quality(q)?;

    let (cos_w0, alpha) = rbj_terms(freq, sample_rate, q);
    let b0 = (1.0 + cos_w0) / 2.0;

    Ok(BiquadCoeffs::normalized(
        b0,
        -(1.0 + cos_w0),
        b0,
        1.0 + alpha,
        -2.0 * cos_w0,
        1.0 - alpha,
    ))
}

fn cascade(
    order: usize,
    kind: CascadeDesign,
    mut design: impl FnMut(f32) -> Result<BiquadCoeffs>,
) -> Result<CutCoefficients> {
    let mut stages = [BiquadCoeffs::IDENTITY; CUT_STAGES];

    match kind {
        CascadeDesign::Repeated => {
            let base = design(BUTTERWORTH_Q)?;
            stages[..order].fill(base);
        }
        CascadeDesign::Butterworth => {
            for (k, stage) in stages[..order].iter_mut().enumerate() {
                *stage = design(kind.stage_q(order, k))?;
            }
        }
    }

    Ok(CutCoefficients { stages, order })
}

/// Low-cut (high-pass) cascade with `slope.order()` stages
pub fn low_cut_filter(
    freq: f32,
    sample_rate: SampleRate,
    slope: Slope,
    design: CascadeDesign,
) -> Result<CutCoefficients> {
    cascade(slope.order(), design, |q| high_pass(freq, sample_rate, q))
}

/// High-cut (low-pass) cascade with `slope.order()` stages
pub fn high_cut_filter(
    freq: f32,
    sample_rate: SampleRate,
    slope: Slope,
    design: CascadeDesign,
) -> Result<CutCoefficients> {
    cascade(slope.order(), design, |q| low_pass(freq, sample_rate, q))
}
