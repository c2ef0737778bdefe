use rentwatch_agent::{ContactWorkflow, Coordinator, SearchPageDiscovery};
use rentwatch_browser::CdpBrowser;
use rentwatch_core::{Browser, Config, Paths};
use rentwatch_scheduler::TickService;
use rentwatch_storage::SeenStore;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

type Pipeline = Coordinator<SearchPageDiscovery, ContactWorkflow>;

fn build(paths: &Paths) -> anyhow::Result<(Config, Pipeline)> {
    let config = Config::load_or_default(paths)?;
    paths.ensure_dirs()?;

    if config.contact.name.trim().is_empty() || config.contact.email.trim().is_empty() {
        warn!(
            config = %paths.config_file().display(),
            "contact.name or contact.email is empty, those fields will be left blank"
        );
    }

    let store = Arc::new(SeenStore::open(paths.seen_listings_file())?);

    let browser: Arc<dyn Browser> = Arc::new(CdpBrowser::new(config.browser.clone(), paths.clone()));
    let discovery = SearchPageDiscovery::new(browser.clone(), &config.search)?;
    let workflow = ContactWorkflow::new(browser, &config);
    let coordinator = Coordinator::new(discovery, workflow, store)
        .with_pause(config.schedule.listing_pause());

    Ok((config, coordinator))
}

pub async fn run(paths: &Paths) -> anyhow::Result<()> {
    let (config, coordinator) = build(paths)?;

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let service = Arc::new(
        TickService::new("listing-check", Arc::new(coordinator))
            .with_interval(config.schedule.check_interval()),
    );

    let shutdown_rx = shutdown_tx.subscribe();
    let handle = tokio::spawn(async move {
        service.run_loop(shutdown_rx).await;
    });

    println!(
        "Watching {} every {} min (Ctrl-C to stop)",
        config.search.url, config.schedule.check_interval_minutes
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping after the current listing...");
    let _ = shutdown_tx.send(());

    handle.await?;
    Ok(())
}

pub async fn once(paths: &Paths) -> anyhow::Result<()> {
    let (_, coordinator) = build(paths)?;

    let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(());
        }
    });

    let result = coordinator.run_tick(&mut shutdown_rx).await;
    signal.abort();
    let report = result?;

    println!("Discovered:   {}", report.discovered);
    println!("Already seen: {}", report.already_seen);
    println!("Handled:      {}", report.handled);
    println!("Failed:       {}", report.failed);
    if report.interrupted {
        println!("(interrupted before all listings were processed)");
    }
    Ok(())
}
