use rentwatch_core::{Config, ListingId, Paths};
use rentwatch_storage::SeenStore;
use url::Url;

pub async fn list(paths: &Paths) -> anyhow::Result<()> {
    let path = paths.seen_listings_file();
    if !path.exists() {
        println!("No listings handled yet.");
        return Ok(());
    }

    let store = SeenStore::open(&path)?;
    for id in store.ids() {
        println!("{}", id);
    }
    println!();
    println!("{} listings", store.len());
    Ok(())
}

pub async fn check(paths: &Paths, url: &str) -> anyhow::Result<()> {
    let config = Config::load_or_default(paths)?;
    let base = Url::parse(&config.search.url)?;
    let id = ListingId::parse(url, &base)?;

    let path = paths.seen_listings_file();
    let seen = path.exists() && SeenStore::open(&path)?.contains(&id);
    if seen {
        println!("✓ {} has been handled", id);
    } else {
        println!("✗ {} has not been handled", id);
    }
    Ok(())
}
