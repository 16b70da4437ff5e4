use crate::config::CliConfig;
use anyhow::Result;

pub fn execute(config: &CliConfig) -> Result<()> {
    print!("{}", config.display_as_toml()?);
    Ok(())
}
