//! Config command for printing the effective configuration.

use std::io::Write;

use anyhow::Result;

use crate::Config;

pub fn run<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    writeln!(writer, "{}", serde_json::to_string_pretty(config)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_command_prints_json() {
        let mut config = Config::default();
        config.actions.pause_command = Some("playerctl pause".to_string());

        let mut output = Vec::new();
        run(&mut output, &config).unwrap();

        let parsed: Config = serde_json::from_slice(&output).unwrap();
        assert_eq!(parsed, config);
    }
}
