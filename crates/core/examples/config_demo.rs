//! Example demonstrating configuration persistence and the stereo processor
//!
//! Run with: cargo run --package triband-core --example config_demo

use triband_core::domain::{CascadeDesign, ChainPosition, Channel, EqConfig, Slope};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("triband_core=debug,info")
        .init();

    println!("=== Triband Configuration Demo ===\n");

    // 1. Start from defaults and shape a curve
    println!("1. Creating configuration...");
    let mut config = EqConfig::default();
    config.processor.cascade = CascadeDesign::Butterworth;
    config.settings.peak_freq = 2500.0;
    config.settings.peak_gain_db = 4.5;
    config.settings.low_cut_freq = 80.0;
    config.settings.low_cut_slope = Slope::Db24;
    config.settings.high_cut_freq = 16000.0;
    config.settings.high_cut_slope = Slope::Db12;
    println!("   ✓ {:?}", config.settings);

    // 2. Save configuration to file
    println!("\n2. Saving configuration to file...");
    let config_path = "demo_triband.toml";
    config.save_to_file(config_path).await?;
    println!("   ✓ Configuration saved to {}", config_path);

    // 3. Load configuration from file
    println!("\n3. Loading configuration from file...");
    let loaded = EqConfig::load_from_file(config_path).await?;
    println!("   ✓ Round trip preserved: {}", loaded == config);

    // 4. Build the processor
    println!("\n4. Building equalizer...");
    let mut eq = loaded.build_equalizer()?;
    let chain = eq.chain(Channel::Left);
    println!(
        "   ✓ low cut {} stages, peak active: {}, high cut {} stages",
        chain.low_cut().active_stages(),
        chain.is_band_active(ChainPosition::Peak),
        chain.high_cut().active_stages()
    );

    // 5. Inspect the response
    println!("\n5. Magnitude response:");
    for freq in [20.0, 80.0, 1000.0, 2500.0, 16000.0] {
        let db = 20.0 * eq.magnitude_for_frequency(freq).log10();
        println!("   {:>7.0} Hz  {:+6.2} dB", freq, db);
    }

    // 6. Process a block
    println!("\n6. Processing one block...");
    let block_size = loaded.processor.block_size;
    let mut left = vec![0.25f32; block_size];
    let mut right = vec![0.25f32; block_size];
    eq.process(&mut left, &mut right);
    println!(
        "   ✓ Last left sample {:.6} (DC decaying through the low cut)",
        left[block_size - 1]
    );

    // Cleanup
    tokio::fs::remove_file(config_path).await?;
    println!("\n=== Demo Complete ===");

    Ok(())
}
