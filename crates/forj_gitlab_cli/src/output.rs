//! Rendering of the plugin answer.

use std::str::FromStr;

use anyhow::{bail, Result};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            other => bail!("Invalid output option '{}'. Use yaml or json.", other),
        }
    }
}

pub fn render<T: Serialize>(format: OutputFormat, value: &T) -> Result<String> {
    Ok(match format {
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
        OutputFormat::Json => {
            let mut text = serde_json::to_string_pretty(value)?;
            text.push('\n');
            text
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use forj_gitlab::PluginData;

    #[test]
    fn test_output_format() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("yml".parse::<OutputFormat>().unwrap(), OutputFormat::Yaml);
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_render_answer() {
        let mut ret = PluginData::default();
        ret.status_add("done");

        let json = render(OutputFormat::Json, &ret).unwrap();
        assert!(json.contains("\"status\": \"done\""));
        let yaml = render(OutputFormat::Yaml, &ret).unwrap();
        assert!(yaml.contains("status: done"));
    }
}
