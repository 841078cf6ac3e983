//! `vnet config` – show where the config lives and what is in effect.

use anyhow::Result;
use vnet_core::config;

pub fn run_config() -> Result<()> {
    let path = config::config_path()?;
    let cfg = config::load_or_init()?;
    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(&cfg)?);
    if cfg.busy.is_none() {
        let busy = cfg.busy_retry();
        println!(
            "# busy backoff (defaults): max_attempts={} base_delay_ms={} max_delay_ms={}",
            busy.max_attempts, busy.base_delay_ms, busy.max_delay_ms
        );
    }
    Ok(())
}
