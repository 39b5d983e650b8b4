//! Domain entities and signal-path rules

pub mod audio;
pub mod config;
pub mod dsp;
pub mod equalizer;
pub mod handoff;
pub mod settings;

// Re-export specific items to avoid ambiguous glob imports
pub use audio::{AudioError, Channel, SampleRate};
pub use config::{ConfigError, EqConfig, ProcessorConfig};
pub use dsp::design::{CascadeDesign, CutCoefficients};
pub use dsp::{BiquadCoeffs, BiquadStage, ChainPosition, ChannelChain, CutChain, CUT_STAGES};
pub use equalizer::{update_chains, ChainCoefficients, ChainUpdater, Equalizer};
pub use handoff::Mailbox;
pub use settings::{ChainSettings, ParameterStore, SettingsSource, Slope};
