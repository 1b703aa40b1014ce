//! Config command - show the effective configuration

use anyhow::Result;
use tickvm_config::Config;

pub fn run(config: &Config, path_only: bool) -> Result<()> {
    if path_only {
        match &config.source {
            Some(path) => println!("{}", path.display()),
            None => println!("(defaults)"),
        }
        return Ok(());
    }
    if let Some(path) = &config.source {
        println!("# {}", path.display());
    }
    print!("{}", config.to_toml());
    println!("# effective save_dir = {:?}", config.vm.save_dir().display().to_string());
    Ok(())
}
