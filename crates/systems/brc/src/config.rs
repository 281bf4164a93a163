//! Machine configuration

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::BrcError;

/// Board variants sharing this I/O core
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Model {
    /// Voice Bridge Challenger
    #[default]
    Vbrc,
    /// Bridge Challenger (no speech)
    Ubc,
    /// Bridge Challenger III (speech)
    Bv3,
    /// Gin & Cribbage Challenger (no speech)
    Gin,
}

impl Model {
    /// Speech models stall the main unit on playback writes; the others
    /// have a tone line instead
    pub fn has_speech(self) -> bool {
        matches!(self, Model::Vbrc | Model::Bv3)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    pub model: Model,
    pub master_clock_hz: u32,
    /// Master cycles per main unit cycle
    pub main_cpu_divider: u32,
    /// Master cycles per coprocessor cycle
    pub mcu_divider: u32,
    /// Card sensor half-bit period
    pub barcode_shift_us: u32,
    /// Display persistence clock period
    pub display_tick_us: u32,
    /// Display ticks a grid stays lit after its last refresh
    pub decay_window_ticks: u32,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            model: Model::Vbrc,
            master_clock_hz: 5_000_000,
            main_cpu_divider: 2,
            mcu_divider: 1,
            barcode_shift_us: 2000,
            display_tick_us: 1000,
            decay_window_ticks: 20,
        }
    }
}

impl MachineConfig {
    pub fn for_model(model: Model) -> Self {
        Self {
            model,
            ..Self::default()
        }
    }

    /// Parse and validate a JSON configuration; missing fields take defaults
    pub fn from_json(text: &str) -> Result<Self, BrcError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, BrcError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn validate(&self) -> Result<(), BrcError> {
        let invalid = |msg: &str| -> Result<(), BrcError> {
            Err(BrcError::InvalidConfig(msg.to_string()))
        };

        if self.master_clock_hz == 0 {
            return invalid("master_clock_hz must be non-zero");
        }
        if self.main_cpu_divider == 0 || self.mcu_divider == 0 {
            return invalid("clock dividers must be non-zero");
        }
        if self.decay_window_ticks == 0 {
            return invalid("decay_window_ticks must be non-zero");
        }
        if self.barcode_shift_cycles() == 0 {
            return invalid("barcode_shift_us is shorter than one master cycle");
        }
        if self.display_tick_cycles() == 0 {
            return invalid("display_tick_us is shorter than one master cycle");
        }
        Ok(())
    }

    /// Convert a period in microseconds to master clock cycles, saturating
    pub fn us_to_cycles(&self, us: u64) -> u64 {
        us.saturating_mul(u64::from(self.master_clock_hz)) / 1_000_000
    }

    pub fn barcode_shift_cycles(&self) -> u64 {
        self.us_to_cycles(u64::from(self.barcode_shift_us))
    }

    pub fn display_tick_cycles(&self) -> u64 {
        self.us_to_cycles(u64::from(self.display_tick_us))
    }

    /// Master cycles in one 60 Hz host frame
    pub fn frame_cycles(&self) -> u64 {
        u64::from(self.master_clock_hz) / 60
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MachineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.barcode_shift_cycles(), 10_000);
        assert_eq!(config.display_tick_cycles(), 5_000);
        assert_eq!(config.frame_cycles(), 83_333);
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config = MachineConfig::from_json(r#"{ "model": "gin", "decay_window_ticks": 8 }"#)
            .unwrap();
        assert_eq!(config.model, Model::Gin);
        assert_eq!(config.decay_window_ticks, 8);
        assert_eq!(config.master_clock_hz, 5_000_000);
    }

    #[test]
    fn test_rejects_zero_values() {
        for text in [
            r#"{ "main_cpu_divider": 0 }"#,
            r#"{ "decay_window_ticks": 0 }"#,
            r#"{ "barcode_shift_us": 0 }"#,
            r#"{ "master_clock_hz": 0 }"#,
        ] {
            match MachineConfig::from_json(text) {
                Err(BrcError::InvalidConfig(_)) => {}
                other => panic!("expected InvalidConfig for {}, got {:?}", text, other),
            }
        }
    }

    #[test]
    fn test_malformed_json_is_a_json_error() {
        assert!(matches!(
            MachineConfig::from_json("{ not json"),
            Err(BrcError::Json(_))
        ));
    }

    #[test]
    fn test_speech_models() {
        assert!(Model::Vbrc.has_speech());
        assert!(Model::Bv3.has_speech());
        assert!(!Model::Ubc.has_speech());
        assert!(!Model::Gin.has_speech());
    }

    #[test]
    fn test_us_to_cycles_saturates() {
        let config = MachineConfig::default();
        assert_eq!(config.us_to_cycles(100), 500);
        assert_eq!(config.us_to_cycles(0), 0);
        assert_eq!(config.us_to_cycles(u64::MAX), u64::MAX / 1_000_000);
    }
}
