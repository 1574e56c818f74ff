//! Config command implementation.

use crate::cli::{ConfigAction, ConfigArgs};
use crate::config::Config;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use std::path::{Path, PathBuf};

/// Execute the config command.
///
/// `path` is the `--config` override; the default location is used without it.
pub fn execute_config(
    args: ConfigArgs,
    config: &Config,
    path: Option<&Path>,
    formatter: &Formatter,
) -> Result<()> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => Config::path()?,
    };

    match args.action {
        ConfigAction::Show => {
            print!("{}", config.to_toml()?);
        }
        ConfigAction::Path => {
            println!("{}", path.display());
        }
        ConfigAction::Init { force } => {
            let written = init_config(&path, force)?;
            println!(
                "{}",
                formatter.success(&format!("Wrote {}", written.display()))
            );
        }
    }

    Ok(())
}

fn init_config(path: &Path, force: bool) -> Result<PathBuf> {
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    Config::default().save(Some(path))
}
