//! Config command implementation.

use anyhow::{Result, bail};

use crate::cli::ConfigAction;
use crate::config::{Config, resolve_url};

pub fn cmd_config(action: ConfigAction, url_arg: Option<&str>) -> Result<()> {
    let path = Config::path();
    match action {
        ConfigAction::Path => println!("{}", path.display()),
        ConfigAction::Show => {
            let config = Config::load_from(&path);
            println!("# {}", path.display());
            print!("{}", toml::to_string_pretty(&config)?);
            println!("# effective url = \"{}\"", resolve_url(url_arg, &config));
        }
        ConfigAction::SetUrl { url } => {
            let url = url.trim().trim_end_matches('/');
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                bail!("Invalid URL '{}': expected http:// or https://", url);
            }
            let mut config = Config::load_from(&path);
            config.url = Some(url.to_string());
            config.save_to(&path)?;
            println!("url = {}", url);
        }
        ConfigAction::SetDevice { device } => {
            let mut config = Config::load_from(&path);
            config.device = Some(device.clone());
            config.save_to(&path)?;
            println!("device = {}", device);
        }
        ConfigAction::Init => {
            if path.exists() {
                bail!("Config already exists at {}", path.display());
            }
            Config::default().save()?;
            println!("Created {}", path.display());
        }
    }
    Ok(())
}
