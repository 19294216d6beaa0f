//! Run-wide configuration.

use std::path::Path;

use common::file_format::FileFormat;
use common::serde_format;
use serde::{Deserialize, Serialize};

use crate::assembly::AssemblyConfig;
use crate::decoding::{DecodeConfig, QualityConfig};
use crate::detection::DetectionConfig;
use crate::error::ConfigError;
use crate::extraction::ExtractionConfig;
use crate::io::LoaderConfig;
use crate::layout::Layout;
use crate::registration::RegistrationConfig;

/// Settings for every pipeline stage.
///
/// Missing sections or fields in a config file take their defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub layout: Layout,
    pub loader: LoaderConfig,
    pub registration: RegistrationConfig,
    pub detection: DetectionConfig,
    pub extraction: ExtractionConfig,
    pub decode: DecodeConfig,
    pub quality: QualityConfig,
    pub assembly: AssemblyConfig,
}

impl PipelineConfig {
    /// Defaults tuned for one acquisition layout.
    pub fn for_layout(layout: Layout) -> Self {
        Self {
            layout,
            ..Default::default()
        }
    }

    /// Read a YAML or JSON config, chosen by file extension.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let format = FileFormat::from_path(path).map_err(|source| ConfigError::Format {
            path: path.to_path_buf(),
            source,
        })?;
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_format::deserialize(&text, format).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Validate every stage's configuration.
    pub fn validate(&self) {
        self.loader.validate();
        self.registration.validate();
        self.detection.validate();
        self.extraction.validate();
        self.decode.validate();
        self.quality.validate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composite::Aggregation;
    use crate::registration::{Representative, TransformModel};

    #[test]
    fn test_defaults_are_valid() {
        PipelineConfig::default().validate();
        PipelineConfig::for_layout(Layout::Eng).validate();
    }

    #[test]
    fn test_for_layout_picks_representative() {
        let eng = PipelineConfig::for_layout(Layout::Eng);
        assert_eq!(eng.layout, Layout::Eng);
        assert_eq!(
            eng.registration.representative_for(eng.layout),
            Representative::Background
        );
    }

    #[test]
    fn test_representative_follows_layout_unless_set() {
        let tmp = tempfile::tempdir().unwrap();
        let implicit = tmp.path().join("implicit.yaml");
        std::fs::write(&implicit, "decode:\n  min_margin: 0.4\n").unwrap();
        let explicit = tmp.path().join("explicit.yaml");
        std::fs::write(&explicit, "registration:\n  representative: signal_max\n").unwrap();

        let mut config = PipelineConfig::from_file(&implicit).unwrap();
        assert_eq!(config.layout, Layout::Ke);
        assert_eq!(config.registration.representative, None);
        config.layout = Layout::Eng;
        assert_eq!(
            config.registration.representative_for(config.layout),
            Representative::Background
        );

        let config = PipelineConfig::from_file(&explicit).unwrap();
        assert_eq!(
            config.registration.representative_for(Layout::Eng),
            Representative::SignalMax
        );
    }

    #[test]
    fn test_partial_yaml() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("run.yaml");
        std::fs::write(
            &path,
            "layout: eng\nregistration:\n  model: similarity\ndecode:\n  min_margin: 0.5\nassembly:\n  background_aggregation: mean\n",
        )
        .unwrap();

        let config = PipelineConfig::from_file(&path).unwrap();

        assert_eq!(config.layout, Layout::Eng);
        assert_eq!(config.registration.model, TransformModel::Similarity);
        assert_eq!(config.decode.min_margin, 0.5);
        assert_eq!(config.decode.tie_tolerance, 0.2);
        assert_eq!(config.assembly.background_aggregation, Aggregation::Mean);
        assert_eq!(config.detection, DetectionConfig::default());
    }

    #[test]
    fn test_json_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("run.json");
        let config = PipelineConfig::for_layout(Layout::Ke);
        let text = serde_format::serialize(&config, FileFormat::Json).unwrap();
        std::fs::write(&path, text).unwrap();

        assert_eq!(PipelineConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_config_errors() {
        let tmp = tempfile::tempdir().unwrap();

        let missing = tmp.path().join("absent.yaml");
        assert!(matches!(
            PipelineConfig::from_file(&missing),
            Err(ConfigError::Read { .. })
        ));

        let unknown = tmp.path().join("run.toml");
        std::fs::write(&unknown, "").unwrap();
        assert!(matches!(
            PipelineConfig::from_file(&unknown),
            Err(ConfigError::Format { .. })
        ));

        let broken = tmp.path().join("run.json");
        std::fs::write(&broken, "{ \"layout\": ").unwrap();
        assert!(matches!(
            PipelineConfig::from_file(&broken),
            Err(ConfigError::Parse { .. })
        ));
    }
}
