//! Stereo equalizer: chain updater and audio callback entry point
//!
//! The [`ChainUpdater`] turns a [`ChainSettings`] snapshot into coefficient
//! sets and publishes them through lock-free mailboxes, one per band. The
//! [`Equalizer`] owns the left and right [`ChannelChain`]s and installs
//! pending coefficients at the start of every block before processing.
//!
//! The updater handle is cloneable and may live on a control thread; the
//! equalizer itself stays on the audio thread.

use crate::domain::audio::{Channel, Result, SampleRate};
use crate::domain::dsp::design::{self, CascadeDesign, CutCoefficients};
use crate::domain::dsp::{BiquadCoeffs, ChannelChain};
use crate::domain::handoff::Mailbox;
use crate::domain::settings::{ChainSettings, SettingsSource};
use std::sync::Arc;
use tracing::{debug, trace};

/// Coefficient sets for every band, designed from one settings snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainCoefficients {
    pub peak: BiquadCoeffs,
    pub low_cut: CutCoefficients,
    pub high_cut: CutCoefficients,
}

impl ChainCoefficients {
    /// Run the coefficient designer for all three bands
    ///
    /// Fails without side effects if any band rejects its parameters.
    pub fn design(
        settings: &ChainSettings,
        sample_rate: SampleRate,
        cascade: CascadeDesign,
    ) -> Result<Self> {
        let peak = design::peak_filter(
            settings.peak_freq,
            sample_rate,
            settings.peak_quality,
            settings.peak_gain_db,
        )?;
        let low_cut = design::low_cut_filter(
            settings.low_cut_freq,
            sample_rate,
            settings.low_cut_slope,
            cascade,
        )?;
        let high_cut = design::high_cut_filter(
            settings.high_cut_freq,
            sample_rate,
            settings.high_cut_slope,
            cascade,
        )?;

        Ok(Self {
            peak,
            low_cut,
            high_cut,
        })
    }

    /// Write these coefficients into every chain
    pub fn install(&self, chains: &mut [ChannelChain]) {
        for chain in chains {
            chain.peak_mut().set_coeffs(self.peak);
            chain.low_cut_mut().apply_slope(&self.low_cut, self.low_cut.order());
            chain.high_cut_mut().apply_slope(&self.high_cut, self.high_cut.order());
        }
    }
}

/// Design and install coefficients directly into both channel chains
///
/// The single-context form of [`ChainUpdater::update`], for callers holding
/// the chains exclusively.
pub fn update_chains(
    chains: &mut [ChannelChain; 2],
    settings: &ChainSettings,
    sample_rate: SampleRate,
    cascade: CascadeDesign,
) -> Result<()> {
    let coefficients = ChainCoefficients::design(settings, sample_rate, cascade)?;
    coefficients.install(chains);
    Ok(())
}

/// A designed value tagged with the sample rate it is valid for
#[derive(Debug, Clone, Copy, PartialEq)]
struct Designed<T> {
    value: T,
    sample_rate: SampleRate,
}

/// One mailbox per band, plus the settings the bands were designed from
#[derive(Debug, Default)]
struct BandSlots {
    peak: Mailbox<Designed<BiquadCoeffs>>,
    low_cut: Mailbox<Designed<CutCoefficients>>,
    high_cut: Mailbox<Designed<CutCoefficients>>,
    settings: Mailbox<Designed<ChainSettings>>,
}

/// Control-side handle that publishes coefficient updates
///
/// Cheap to clone; every clone feeds the same [`Equalizer`].
#[derive(Debug, Clone)]
pub struct ChainUpdater {
    slots: Arc<BandSlots>,
    cascade: CascadeDesign,
}

impl ChainUpdater {
    fn new(cascade: CascadeDesign) -> Self {
        Self {
            slots: Arc::new(BandSlots::default()),
            cascade,
        }
    }

    pub fn cascade_design(&self) -> CascadeDesign {
        self.cascade
    }

    /// Design coefficients for `settings` and publish them
    ///
    /// Nothing is published if any band is rejected. Published values replace
    /// anything the audio thread has not picked up yet.
    ///
    /// Meant for the control context; the audio thread updates through
    /// [`Equalizer::update`] instead.
    pub fn update(&self, settings: &ChainSettings, sample_rate: SampleRate) -> Result<()> {
        let coefficients = match ChainCoefficients::design(settings, sample_rate, self.cascade) {
            Ok(coefficients) => coefficients,
            Err(e) => {
                debug!(error = %e, "EQ settings rejected");
                return Err(e);
            }
        };

        self.slots.peak.publish(Designed {
            value: coefficients.peak,
            sample_rate,
        });
        self.slots.low_cut.publish(Designed {
            value: coefficients.low_cut,
            sample_rate,
        });
        self.slots.high_cut.publish(Designed {
            value: coefficients.high_cut,
            sample_rate,
        });
        self.slots.settings.publish(Designed {
            value: *settings,
            sample_rate,
        });

        trace!(
            "EQ updated: LC={:.0}Hz/{}, P={:.1}dB@{:.0}Hz Q={:.2}, HC={:.0}Hz/{}",
            settings.low_cut_freq,
            settings.low_cut_slope,
            settings.peak_gain_db,
            settings.peak_freq,
            settings.peak_quality,
            settings.high_cut_freq,
            settings.high_cut_slope
        );
        Ok(())
    }

    /// Snapshot `source` and publish, for control loops polling a registry
    pub fn update_from<S: SettingsSource + ?Sized>(
        &self,
        source: &S,
        sample_rate: SampleRate,
    ) -> Result<()> {
        self.update(&source.chain_settings(), sample_rate)
    }

    /// Whether any band has an update the audio thread has not applied
    pub fn has_pending(&self) -> bool {
        self.slots.peak.is_pending()
            || self.slots.low_cut.is_pending()
            || self.slots.high_cut.is_pending()
    }
}

/// Stereo three-band equalizer
///
/// Left and right chains share coefficients and keep independent state.
/// All methods that touch audio are allocation-free and lock-free.
#[derive(Debug)]
pub struct Equalizer {
    chains: [ChannelChain; 2],
    sample_rate: SampleRate,
    // Last settings installed for `sample_rate`
    settings: ChainSettings,
    // Set while consecutive updates are rejected, so the rejection is logged once
    rejecting: bool,
    updater: ChainUpdater,
}

impl Equalizer {
    /// Create an equalizer and run the initial update
    pub fn new(
        settings: &ChainSettings,
        sample_rate: SampleRate,
        cascade: CascadeDesign,
    ) -> Result<Self> {
        let mut eq = Self {
            chains: [ChannelChain::new(), ChannelChain::new()],
            sample_rate,
            settings: *settings,
            rejecting: false,
            updater: ChainUpdater::new(cascade),
        };
        eq.install(settings)?;
        Ok(eq)
    }

    /// A control-side handle feeding this equalizer
    pub fn updater(&self) -> ChainUpdater {
        self.updater.clone()
    }

    pub fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    pub fn cascade_design(&self) -> CascadeDesign {
        self.updater.cascade
    }

    pub fn chain(&self, channel: Channel) -> &ChannelChain {
        &self.chains[channel.index()]
    }

    pub fn chains(&self) -> &[ChannelChain; 2] {
        &self.chains
    }

    /// Last settings installed for the current sample rate
    pub fn settings(&self) -> &ChainSettings {
        &self.settings
    }

    /// Switch to a new stream sample rate
    ///
    /// A changed rate zeroes every delay line and redesigns the last installed
    /// settings for the new rate, so no block runs with coefficients designed
    /// for another rate. If those settings are invalid at the new rate every
    /// chain falls back to pass-through and the error is returned. An invalid
    /// rate is rejected and the previous state kept.
    pub fn prepare(&mut self, sample_rate: f32) -> Result<()> {
        if self.switch_rate(sample_rate)? {
            self.reinstall_current()
        } else {
            Ok(())
        }
    }

    /// Full chain updater pass: switch rate, take pending updates, design, install
    ///
    /// A rejected update at a new rate leaves the previous settings redesigned
    /// for that rate.
    pub fn update(&mut self, settings: &ChainSettings, sample_rate: f32) -> Result<()> {
        let rate_changed = self.switch_rate(sample_rate)?;
        self.apply_pending();

        match self.install(settings) {
            Ok(()) => Ok(()),
            Err(e) => {
                if rate_changed {
                    // Already reported as `e`; pass-through on a second failure
                    let _ = self.reinstall_current();
                }
                Err(e)
            }
        }
    }

    /// Become consistent with restored settings at the current sample rate
    pub fn restore(&mut self, settings: &ChainSettings) -> Result<()> {
        debug!(?settings, "Restoring EQ settings");
        self.update(settings, self.sample_rate.hz())
    }

    /// Validate and adopt `sample_rate`; returns whether it changed
    fn switch_rate(&mut self, sample_rate: f32) -> Result<bool> {
        let sample_rate = SampleRate::new(sample_rate)?;
        if sample_rate == self.sample_rate {
            return Ok(false);
        }

        debug!(
            from = self.sample_rate.hz(),
            to = sample_rate.hz(),
            "Sample rate changed, resetting EQ state"
        );
        self.sample_rate = sample_rate;
        self.reset();
        Ok(true)
    }

    /// Design `settings` for the current rate and install into both chains
    ///
    /// Runs on the audio thread: allocation-free, and a run of rejections is
    /// logged only once.
    fn install(&mut self, settings: &ChainSettings) -> Result<()> {
        match ChainCoefficients::design(settings, self.sample_rate, self.updater.cascade) {
            Ok(coefficients) => {
                coefficients.install(&mut self.chains);
                self.settings = *settings;
                self.rejecting = false;
                Ok(())
            }
            Err(e) => {
                if !self.rejecting {
                    debug!(error = %e, "EQ settings rejected, keeping previous coefficients");
                    self.rejecting = true;
                }
                Err(e)
            }
        }
    }

    /// Redesign the last installed settings after a rate change
    fn reinstall_current(&mut self) -> Result<()> {
        let settings = self.settings;
        match self.install(&settings) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.chains = [ChannelChain::new(), ChannelChain::new()];
                Err(e)
            }
        }
    }

    /// Install whatever the updater has published for the current rate
    ///
    /// Values designed for a different sample rate are discarded.
    fn apply_pending(&mut self) {
        let slots = &self.updater.slots;

        if let Some(peak) = slots.peak.take() {
            if peak.sample_rate == self.sample_rate {
                for chain in &mut self.chains {
                    chain.peak_mut().set_coeffs(peak.value);
                }
            }
        }
        if let Some(low_cut) = slots.low_cut.take() {
            if low_cut.sample_rate == self.sample_rate {
                for chain in &mut self.chains {
                    chain
                        .low_cut_mut()
                        .apply_slope(&low_cut.value, low_cut.value.order());
                }
            }
        }
        if let Some(high_cut) = slots.high_cut.take() {
            if high_cut.sample_rate == self.sample_rate {
                for chain in &mut self.chains {
                    chain
                        .high_cut_mut()
                        .apply_slope(&high_cut.value, high_cut.value.order());
                }
            }
        }
        if let Some(settings) = slots.settings.take() {
            if settings.sample_rate == self.sample_rate {
                self.settings = settings.value;
            }
        }
    }

    /// Process one block of per-channel samples in place
    ///
    /// Applies pending coefficient updates first. Never fails.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        debug_assert_eq!(left.len(), right.len(), "channel buffers differ in length");

        self.apply_pending();
        self.chains[Channel::Left.index()].process(left);
        self.chains[Channel::Right.index()].process(right);
    }

    /// Audio callback entry point: update from `source`, then process
    ///
    /// The block is always processed. If the update is rejected the last
    /// valid coefficients are used and the error is returned afterwards.
    pub fn process_block<S: SettingsSource + ?Sized>(
        &mut self,
        source: &S,
        left: &mut [f32],
        right: &mut [f32],
        sample_rate: f32,
    ) -> Result<()> {
        let result = self.update(&source.chain_settings(), sample_rate);
        self.process(left, right);
        result
    }

    /// Zero every delay line
    pub fn reset(&mut self) {
        for chain in &mut self.chains {
            chain.reset();
        }
    }

    /// Linear magnitude of the current chain at `freq` Hz
    pub fn magnitude_for_frequency(&self, freq: f64) -> f64 {
        self.chains[Channel::Left.index()]
            .magnitude_for_frequency(freq, self.sample_rate.hz() as f64)
    }
}
