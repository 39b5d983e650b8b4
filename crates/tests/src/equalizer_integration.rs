//! Integration tests for the equalizer signal path
//!
//! These tests drive the stereo processor the way a host does: settings
//! collected on a control side, applied block by block on the audio side,
//! with sample-rate changes and concurrent updates.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use triband_core::domain::{
    update_chains, BiquadCoeffs, CascadeDesign, ChainCoefficients, ChainPosition, ChainSettings,
    Channel, ChannelChain, EqConfig, Equalizer, ParameterStore, SampleRate, Slope,
};

fn generate_sine_wave(frequency: f32, sample_rate: f32, duration_ms: f32) -> Vec<f32> {
    let num_samples = (sample_rate * duration_ms / 1000.0) as usize;
    (0..num_samples)
        .map(|i| 2.0 * std::f32::consts::PI * frequency * i as f32 / sample_rate)
        .map(|phase| phase.sin() * 0.5)
        .collect()
}

fn generate_silence(num_samples: usize) -> Vec<f32> {
    vec![0.0; num_samples]
}

/// RMS in dB of the second half of `buffer`, past the filter transient
fn settled_rms_db(buffer: &[f32]) -> f32 {
    let tail = &buffer[buffer.len() / 2..];
    let rms = (tail.iter().map(|s| s * s).sum::<f32>() / tail.len() as f32).sqrt();
    20.0 * rms.max(1e-12).log10()
}

/// Gain in dB the equalizer applies to a steady tone
fn tone_gain_db(eq: &mut Equalizer, frequency: f32) -> f32 {
    let sample_rate = eq.sample_rate().hz();
    let input = generate_sine_wave(frequency, sample_rate, 500.0);
    let mut left = input.clone();
    let mut right = input.clone();

    for (l, r) in left.chunks_mut(256).zip(right.chunks_mut(256)) {
        eq.process(l, r);
    }
    settled_rms_db(&left) - settled_rms_db(&input)
}

fn settings_with(f: impl FnOnce(&mut ChainSettings)) -> ChainSettings {
    let mut settings = ChainSettings::default();
    f(&mut settings);
    settings
}

// ============================================================================
// FREQUENCY RESPONSE TESTS
// ============================================================================

#[test]
fn test_default_settings_pass_midrange() {
    let mut eq =
        Equalizer::new(&ChainSettings::default(), SampleRate::HZ_48000, CascadeDesign::Repeated)
            .unwrap();

    let gain = tone_gain_db(&mut eq, 1000.0);
    assert!(gain.abs() < 0.1, "1 kHz gain {gain} dB");
}

#[test]
fn test_peak_boost_at_center() {
    let settings = settings_with(|s| {
        s.peak_freq = 1000.0;
        s.peak_gain_db = 6.0;
        s.peak_quality = 1.0;
    });
    let mut eq = Equalizer::new(&settings, SampleRate::HZ_48000, CascadeDesign::Repeated).unwrap();

    let gain = tone_gain_db(&mut eq, 1000.0);
    assert!((gain - 6.0).abs() < 0.2, "peak gain {gain} dB");
}

#[test]
fn test_peak_cut_leaves_distant_band() {
    let settings = settings_with(|s| {
        s.peak_freq = 4000.0;
        s.peak_gain_db = -12.0;
        s.peak_quality = 4.0;
    });
    let mut eq = Equalizer::new(&settings, SampleRate::HZ_48000, CascadeDesign::Repeated).unwrap();

    let gain = tone_gain_db(&mut eq, 250.0);
    assert!(gain.abs() < 0.2, "250 Hz gain {gain} dB");
}

#[test]
fn test_low_cut_steepens_with_slope() {
    let mut previous = 0.0f32;

    for slope in Slope::ALL {
        let settings = settings_with(|s| {
            s.low_cut_freq = 400.0;
            s.low_cut_slope = slope;
        });
        let mut eq =
            Equalizer::new(&settings, SampleRate::HZ_48000, CascadeDesign::Repeated).unwrap();

        let gain = tone_gain_db(&mut eq, 100.0);
        assert!(gain < previous - 6.0, "{slope}: {gain} dB after {previous} dB");
        previous = gain;
    }
}

#[test]
fn test_high_cut_48db_rejects_treble() {
    let settings = settings_with(|s| {
        s.high_cut_freq = 1000.0;
        s.high_cut_slope = Slope::Db48;
    });
    let mut eq = Equalizer::new(&settings, SampleRate::HZ_48000, CascadeDesign::Repeated).unwrap();

    assert_eq!(eq.chain(Channel::Left).high_cut().active_stages(), 4);
    let gain = tone_gain_db(&mut eq, 8000.0);
    assert!(gain < -60.0, "8 kHz gain {gain} dB");
}

#[test]
fn test_butterworth_cascade_knee() {
    let settings = settings_with(|s| {
        s.low_cut_freq = 200.0;
        s.low_cut_slope = Slope::Db48;
    });
    let eq = Equalizer::new(&settings, SampleRate::HZ_48000, CascadeDesign::Butterworth).unwrap();
    let repeated =
        Equalizer::new(&settings, SampleRate::HZ_48000, CascadeDesign::Repeated).unwrap();

    let knee = 20.0 * eq.magnitude_for_frequency(200.0).log10();
    let sagged = 20.0 * repeated.magnitude_for_frequency(200.0).log10();
    assert!((knee + 3.0).abs() < 0.2, "butterworth knee {knee} dB");
    assert!((sagged + 12.0).abs() < 0.3, "repeated knee {sagged} dB");
}

// ============================================================================
// BLOCK PROCESSING TESTS
// ============================================================================

#[test]
fn test_block_size_does_not_change_output() {
    let settings = settings_with(|s| {
        s.peak_gain_db = 9.0;
        s.low_cut_freq = 120.0;
        s.low_cut_slope = Slope::Db36;
        s.high_cut_freq = 6000.0;
    });
    let input = generate_sine_wave(440.0, 48000.0, 50.0);

    let mut whole =
        Equalizer::new(&settings, SampleRate::HZ_48000, CascadeDesign::Repeated).unwrap();
    let mut whole_l = input.clone();
    let mut whole_r = input.clone();
    whole.process_block(&settings, &mut whole_l, &mut whole_r, 48000.0).unwrap();

    let mut split =
        Equalizer::new(&settings, SampleRate::HZ_48000, CascadeDesign::Repeated).unwrap();
    let mut split_l = input.clone();
    let mut split_r = input.clone();
    for (l, r) in split_l.chunks_mut(64).zip(split_r.chunks_mut(64)) {
        split.process_block(&settings, l, r, 48000.0).unwrap();
    }

    assert_eq!(whole_l, split_l);
    assert_eq!(whole_r, split_r);
}

#[test]
fn test_channels_keep_independent_state() {
    let settings = settings_with(|s| s.peak_gain_db = 6.0);
    let mut eq = Equalizer::new(&settings, SampleRate::HZ_48000, CascadeDesign::Repeated).unwrap();

    let mut left = generate_sine_wave(1000.0, 48000.0, 20.0);
    let mut right = generate_silence(left.len());
    eq.process(&mut left, &mut right);

    assert!(right.iter().all(|&s| s == 0.0));
    assert!(left.iter().any(|&s| s.abs() > 0.1));
}

#[test]
fn test_update_chains_matches_equalizer() {
    let settings = settings_with(|s| {
        s.peak_freq = 3000.0;
        s.peak_gain_db = -4.0;
        s.high_cut_slope = Slope::Db24;
    });
    let mut chains = [ChannelChain::new(), ChannelChain::new()];
    update_chains(&mut chains, &settings, SampleRate::HZ_44100, CascadeDesign::Repeated).unwrap();

    let eq = Equalizer::new(&settings, SampleRate::HZ_44100, CascadeDesign::Repeated).unwrap();
    assert_eq!(&chains, eq.chains());
}

#[test]
fn test_unity_peak_is_identity() {
    let mut eq =
        Equalizer::new(&ChainSettings::default(), SampleRate::HZ_48000, CascadeDesign::Repeated)
            .unwrap();

    let chain = eq.chain(Channel::Right);
    assert_eq!(*chain.peak().coeffs(), BiquadCoeffs::IDENTITY);
    assert!(chain.is_band_active(ChainPosition::LowCut));

    let mut left = generate_silence(128);
    let mut right = generate_silence(128);
    eq.process(&mut left, &mut right);
    assert!(left.iter().chain(&right).all(|&s| s == 0.0));
}

// ============================================================================
// SAMPLE RATE TESTS
// ============================================================================

#[test]
fn test_sample_rate_change_redesigns() {
    let settings = settings_with(|s| s.peak_gain_db = 3.0);
    let mut eq = Equalizer::new(&settings, SampleRate::HZ_48000, CascadeDesign::Repeated).unwrap();

    let mut left = generate_sine_wave(1000.0, 44100.0, 10.0);
    let mut right = left.clone();
    eq.process_block(&settings, &mut left, &mut right, 44100.0).unwrap();

    assert_eq!(eq.sample_rate(), SampleRate::HZ_44100);
    let expected =
        ChainCoefficients::design(&settings, SampleRate::HZ_44100, CascadeDesign::Repeated)
            .unwrap();
    assert_eq!(*eq.chain(Channel::Left).peak().coeffs(), expected.peak);
}

#[test]
fn test_prepare_then_process_uses_new_rate_design() {
    let settings = settings_with(|s| {
        s.peak_freq = 1000.0;
        s.peak_gain_db = 6.0;
    });
    let mut eq = Equalizer::new(&settings, SampleRate::HZ_44100, CascadeDesign::Repeated).unwrap();
    let rate = SampleRate::new(96000.0).unwrap();

    // Stream restarts at 96 kHz; no new settings arrive before the first block
    eq.prepare(96000.0).unwrap();
    let gain = tone_gain_db(&mut eq, 1000.0);

    let expected = ChainCoefficients::design(&settings, rate, CascadeDesign::Repeated).unwrap();
    for channel in Channel::ALL {
        assert_eq!(*eq.chain(channel).peak().coeffs(), expected.peak);
        assert_eq!(eq.chain(channel).low_cut().stage(0).coeffs(), &expected.low_cut[0]);
    }
    assert!((gain - 6.0).abs() < 0.2, "96 kHz peak gain {gain} dB");
}

#[test]
fn test_invalid_sample_rate_keeps_processing() {
    let settings = settings_with(|s| s.peak_gain_db = 6.0);
    let mut eq = Equalizer::new(&settings, SampleRate::HZ_48000, CascadeDesign::Repeated).unwrap();
    let before = eq.chains().clone();

    let mut left = generate_sine_wave(1000.0, 48000.0, 5.0);
    let mut right = left.clone();
    assert!(eq.process_block(&settings, &mut left, &mut right, 0.0).is_err());

    assert_eq!(eq.sample_rate(), SampleRate::HZ_48000);
    assert_eq!(eq.chain(Channel::Left).peak().coeffs(), before[0].peak().coeffs());
    assert!(left.iter().all(|s| s.is_finite()));
}

// ============================================================================
// CONCURRENCY TESTS
// ============================================================================

#[test]
fn test_updater_from_control_thread() {
    let mut eq =
        Equalizer::new(&ChainSettings::default(), SampleRate::HZ_48000, CascadeDesign::Repeated)
            .unwrap();
    let updater = eq.updater();
    let target = settings_with(|s| {
        s.peak_freq = 2000.0;
        s.peak_gain_db = 5.0;
        s.low_cut_slope = Slope::Db48;
    });

    thread::spawn(move || updater.update(&target, SampleRate::HZ_48000))
        .join()
        .unwrap()
        .unwrap();

    let mut left = generate_silence(64);
    let mut right = generate_silence(64);
    eq.process(&mut left, &mut right);

    let expected =
        ChainCoefficients::design(&target, SampleRate::HZ_48000, CascadeDesign::Repeated).unwrap();
    for channel in Channel::ALL {
        let chain = eq.chain(channel);
        assert_eq!(*chain.peak().coeffs(), expected.peak);
        assert_eq!(chain.low_cut().active_stages(), 4);
    }
}

#[test]
fn test_parameter_store_with_audio_loop() {
    let initial = ChainSettings::default();
    let store = Arc::new(ParameterStore::new(initial));
    let done = Arc::new(AtomicBool::new(false));
    let mut eq = Equalizer::new(&initial, SampleRate::HZ_48000, CascadeDesign::Repeated).unwrap();

    let control = {
        let store = Arc::clone(&store);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            for step in 0..200 {
                let gain = (step % 25) as f32 - 12.0;
                store.set_peak(500.0 + step as f32 * 10.0, gain, 1.5);
                store.set_low_cut(40.0 + step as f32, Slope::ALL[step % 4]);
                thread::yield_now();
            }
            done.store(true, Ordering::Release);
        })
    };

    let input = generate_sine_wave(800.0, 48000.0, 10.0);
    while !done.load(Ordering::Acquire) {
        let mut left = input.clone();
        let mut right = input.clone();
        eq.process_block(store.as_ref(), &mut left, &mut right, 48000.0).unwrap();
        assert!(left.iter().chain(&right).all(|s| s.is_finite()));
    }
    control.join().unwrap();

    // One more block picks up the final values
    let mut left = input.clone();
    let mut right = input.clone();
    eq.process_block(store.as_ref(), &mut left, &mut right, 48000.0).unwrap();

    let final_settings = settings_with(|s| {
        s.peak_freq = 500.0 + 199.0 * 10.0;
        s.peak_gain_db = (199 % 25) as f32 - 12.0;
        s.peak_quality = 1.5;
        s.low_cut_freq = 40.0 + 199.0;
        s.low_cut_slope = Slope::ALL[199 % 4];
    });
    let expected =
        ChainCoefficients::design(&final_settings, SampleRate::HZ_48000, CascadeDesign::Repeated)
            .unwrap();
    let chain = eq.chain(Channel::Left);
    assert_eq!(*chain.peak().coeffs(), expected.peak);
    assert_eq!(chain.low_cut().active_stages(), expected.low_cut.order());
}

// ============================================================================
// CONFIGURATION TESTS
// ============================================================================

#[test]
fn test_config_drives_equalizer() {
    let config = EqConfig::from_toml_str(
        r#"
        [processor]
        sample_rate = 44100.0
        block_size = 128
        cascade = "butterworth"

        [settings]
        peak_freq = 1000.0
        peak_gain_db = 6.0
        low_cut_freq = 100.0
        low_cut_slope = "db24"
        "#,
    )
    .unwrap();

    let mut eq = config.build_equalizer().unwrap();
    assert_eq!(eq.cascade_design(), CascadeDesign::Butterworth);
    assert_eq!(eq.chain(Channel::Left).low_cut().active_stages(), 2);

    let gain = tone_gain_db(&mut eq, 1000.0);
    assert!((gain - 6.0).abs() < 0.2, "configured peak gain {gain} dB");
}
