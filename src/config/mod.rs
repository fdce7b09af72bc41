//! Configuration loading and validation

mod schema;

pub use schema::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Example configuration written by `midiecho init`
pub const EXAMPLE_CONFIG: &str = include_str!("../../midiecho.example.yaml");

/// Load configuration from a YAML file
pub fn load_config(path: &Path) -> Result<EchoConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    let config: EchoConfig = serde_yaml::from_str(&contents)
        .with_context(|| format!("failed to parse config file {:?}", path))?;
    config.validate()?;
    Ok(config)
}

/// Load the config at `path`, or the defaults if it does not exist
pub fn load_or_default(path: &Path) -> Result<EchoConfig> {
    if path.exists() {
        load_config(path)
    } else {
        log::info!("{:?} not found, using built-in defaults", path);
        Ok(EchoConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::Waveform;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_minimal_config() {
        let yaml = r#"
audio:
  sample_rate: 48000

chain:
  delay_time: 0.5
  feedback: 0.4
"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.audio.sample_rate, 48000);
        assert_eq!(config.chain.delay_time, 0.5);
        assert_eq!(config.chain.feedback, 0.4);
        assert_eq!(config.envelope.sustain, 0.5);
    }

    #[test]
    fn test_example_config_is_valid() {
        let config: EchoConfig = serde_yaml::from_str(EXAMPLE_CONFIG).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.voice.waveform, Waveform::Sine);
        assert_eq!(config, EchoConfig::default());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"chain:\n  feedback: 2.0\n").unwrap();

        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_or_default(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config, EchoConfig::default());
    }
}
