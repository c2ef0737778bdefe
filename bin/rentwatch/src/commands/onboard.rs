use rentwatch_core::{Config, Paths};
use std::io::{self, Write};

pub async fn run(paths: &Paths, force: bool) -> anyhow::Result<()> {
    let config_path = paths.config_file();

    if config_path.exists() && !force {
        print!("Config already exists. Overwrite? [y/N] ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    paths.ensure_dirs()?;
    Config::default().save(&config_path)?;
    println!("✓ Created config: {}", config_path.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit {} and set contact.name and contact.email", config_path.display());
    println!("  2. Check cutoff.offeredSince and search.url");
    println!("  3. Run `rentwatch once` to try a single pass");
    println!("  4. Run `rentwatch run` to keep watching");

    Ok(())
}
