//! `parts init [--force]`

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use parts_core::profile;

/// Write the built-in device profile.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing profile with the built-in one.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        let existed = profile::profile_path_at(&home).exists();
        let device = profile::init_at(&home, self.force).context("failed to initialise profile")?;

        if existed && !self.force {
            println!("profile for '{}' already present", device.device);
        } else {
            println!("{} wrote profile for '{}'", "✓".green(), device.device);
        }
        println!("  {}", profile::profile_path_at(&home).display());
        Ok(())
    }
}
