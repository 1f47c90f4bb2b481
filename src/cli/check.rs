use super::{init_logging, resolve_config_path, unix_now};
use coffer::config::CofferConfig;

/// Validate the configuration and print the treasury it describes.
pub fn execute(config: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let path = resolve_config_path(config);
    let config = CofferConfig::load(&path)?;
    init_logging(&config.logging)?;

    let treasury = config.build_treasury(unix_now())?;
    tracing::info!(path = %path.display(), "configuration valid");

    println!("Configuration OK: {}", path.display());
    println!();
    println!("{}", treasury.summary(unix_now()));
    println!();
    for (name, entry) in treasury.policy().list() {
        let state = if entry.enabled { "enabled" } else { "disabled" };
        let scope = entry.rule.category().unwrap_or("all categories");
        println!("  {:<24} {:<16} {:<10} {}", name, entry.rule.kind(), state, scope);
    }
    Ok(())
}
