use rentwatch_core::{Config, Paths};
use rentwatch_storage::SeenStore;

pub async fn run(paths: &Paths) -> anyhow::Result<()> {
    println!("rentwatch status");
    println!("================");
    println!();

    let config_path = paths.config_file();
    let config_exists = config_path.exists();
    println!(
        "Config:    {} {}",
        config_path.display(),
        if config_exists { "✓" } else { "✗ (not found, using defaults)" }
    );

    let config = Config::load_or_default(paths)?;

    println!("Search:    {}", config.search.url);
    println!("Cutoff:    offered since {}", config.cutoff.offered_since);
    println!(
        "Schedule:  every {} min, {} ms between listings",
        config.schedule.check_interval_minutes, config.schedule.listing_pause_ms
    );
    match &config.browser.debugger_address {
        Some(address) => println!("Browser:   attach to {}", address),
        None => println!(
            "Browser:   launch {}",
            if config.browser.headed { "headed" } else { "headless" }
        ),
    }
    let identity = |v: &str| if v.trim().is_empty() { "✗ not set".to_string() } else { v.to_string() };
    println!("Name:      {}", identity(&config.contact.name));
    println!("Email:     {}", identity(&config.contact.email));
    println!();

    let seen_path = paths.seen_listings_file();
    if seen_path.exists() {
        let store = SeenStore::open(&seen_path)?;
        println!("Seen:      {} listings ({})", store.len(), seen_path.display());
    } else {
        println!("Seen:      0 listings ({} not created yet)", seen_path.display());
    }

    if !config_exists {
        println!();
        println!("Run `rentwatch onboard` to write a config file.");
    }

    Ok(())
}
