use super::resolve_config_path;
use coffer::config::CofferConfig;

/// Write the default configuration file.
pub fn execute(config: Option<String>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = resolve_config_path(config);
    if path.exists() && !force {
        return Err(format!(
            "Config file already exists at {} (use --force to overwrite)",
            path.display()
        )
        .into());
    }

    CofferConfig::create_default(&path)?;
    println!("Wrote default configuration to {}", path.display());
    println!("Edit signers, thresholds and policies, then run `coffer check`.");
    Ok(())
}
