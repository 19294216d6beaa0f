use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::file_format::FileFormat;

#[derive(Debug, thiserror::Error)]
pub enum SerdeFormatError {
    #[error("YAML serialization failed: {0}")]
    Yaml(#[from] serde_yml::Error),
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SerdeFormatResult<T> = Result<T, SerdeFormatError>;

pub fn serialize<T: Serialize>(value: &T, format: FileFormat) -> SerdeFormatResult<String> {
    let text = match format {
        FileFormat::Yaml => serde_yml::to_string(value)?,
        FileFormat::Json => serde_json::to_string_pretty(value)?,
    };
    Ok(text)
}

pub fn deserialize<T: DeserializeOwned>(text: &str, format: FileFormat) -> SerdeFormatResult<T> {
    match format {
        FileFormat::Yaml => Ok(serde_yml::from_str(text)?),
        FileFormat::Json => Ok(serde_json::from_str(text)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        radius: f32,
    }

    #[test]
    fn test_yaml_and_json_agree() {
        let value = Sample {
            name: "spot".into(),
            radius: 2.5,
        };
        for format in [FileFormat::Yaml, FileFormat::Json] {
            let text = serialize(&value, format).unwrap();
            let back: Sample = deserialize(&text, format).unwrap();
            assert_eq!(back, value, "format {:?}", format);
        }
    }

    #[test]
    fn test_deserialize_reports_parse_error() {
        let result: SerdeFormatResult<Sample> = deserialize("{ not json", FileFormat::Json);
        assert!(matches!(result, Err(SerdeFormatError::Json(_))));
    }
}
