//! `lookout config`: inspect the layered configuration

use std::path::Path;

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::config::{ConfigLoader, LookoutConfig};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the merged configuration as TOML
    Show {
        /// Print built-in defaults instead, ignoring config files
        #[arg(long)]
        defaults: bool,
    },
    /// List the files that are searched, in merge order
    Path,
}

pub fn run(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Show { defaults } => {
            let config = if defaults {
                LookoutConfig::default()
            } else {
                ConfigLoader::load()?
            };
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        ConfigCommands::Path => {
            match ConfigLoader::user_config_path() {
                Some(path) => println!("user:    {}", describe(&path)),
                None => println!("user:    (no home directory)"),
            }
            println!("project: {}", describe(&ConfigLoader::project_config_path()));
            Ok(())
        }
    }
}

fn describe(path: &Path) -> String {
    if path.exists() {
        path.display().to_string()
    } else {
        format!("{} (not found)", path.display())
    }
}
