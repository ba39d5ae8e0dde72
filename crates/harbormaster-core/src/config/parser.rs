//! TOML parser with helpful error messages

use std::path::Path;

use anyhow::{Context, Result};

use super::schema::EngineConfig;

/// Parse harbormaster.toml with detailed error messages
pub fn parse_config(path: &Path) -> Result<EngineConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse harbormaster.toml content from string
pub fn parse_config_str(content: &str) -> Result<EngineConfig> {
    let config: EngineConfig =
        toml::from_str(content).map_err(|e| enhance_toml_error(e, content))?;
    config.validate()?;
    Ok(config)
}

/// Attach the offending lines to a TOML error when a position is known
fn enhance_toml_error(error: toml::de::Error, content: &str) -> anyhow::Error {
    let message = error.message().to_string();
    let line = error
        .span()
        .map(|span| content.get(..span.start).unwrap_or(content).matches('\n').count() + 1);

    match line {
        Some(line_num) => anyhow::anyhow!(
            "TOML parsing error at line {}:\n{}\n\nError: {}",
            line_num,
            get_line_context(content, line_num),
            message
        ),
        None => anyhow::anyhow!("TOML parsing error: {}", message),
    }
}

/// Get context lines around an error
fn get_line_context(content: &str, line_num: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let start = line_num.saturating_sub(2);
    let end = (line_num + 2).min(lines.len());
    if start >= end {
        return String::new();
    }

    lines[start..end]
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let num = start + i + 1;
            let marker = if num == line_num { ">>>" } else { "   " };
            format!("{} {:4} | {}", marker, num, line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Serialize a configuration to TOML string
pub fn to_toml(config: &EngineConfig) -> Result<String> {
    toml::to_string_pretty(config).context("Failed to serialize configuration to TOML")
}
