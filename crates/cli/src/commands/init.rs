//! `partspec init` — write the default configuration.

use partspec_config::AppConfig;
use std::path::Path;

pub fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let default_path = AppConfig::config_path();
    let path = config_path.unwrap_or(&default_path);

    if path.exists() {
        println!("⚠️  Config already exists at: {}", path.display());
        println!("   Edit it manually or delete and re-run init.");
        return Ok(());
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, AppConfig::default_toml())?;
    println!("✅ Created config.toml at: {}", path.display());
    println!("\n📝 Next steps:");
    println!("   1. Set an API key (`api_key` or OPENAI_API_KEY) to enable LLM extraction");
    println!("   2. Run: partspec extract \"square plate 150mm with center hole 30mm diameter\"");
    Ok(())
}
