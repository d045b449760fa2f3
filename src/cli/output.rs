use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    Yaml,
}

impl OutputFormat {
    /// Prints `value` as JSON or YAML. Human output is left to the caller.
    pub fn print_structured<T: Serialize>(self, value: &T) -> Result<()> {
        match self {
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(value).context("failed to encode JSON output")?
                );
            }
            OutputFormat::Yaml => {
                print!(
                    "{}",
                    serde_yaml::to_string(value).context("failed to encode YAML output")?
                );
            }
            OutputFormat::Human => {}
        }
        Ok(())
    }

    pub fn is_human(self) -> bool {
        self == OutputFormat::Human
    }
}
