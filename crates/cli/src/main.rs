mod cli;
mod feed;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use feedshelf_core::PrefetchConfig;
use feedshelf_prefetch::{SchedulerBuilder, SizeInterleavePlacement};

use crate::cli::CliArgs;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    feedshelf_core::load_dotenv();
    let args = CliArgs::parse();

    let mut config = PrefetchConfig::from_env();
    if let Some(base_url) = &args.base_url {
        config.base_url = Some(base_url.clone());
    }
    config.log_summary();

    let items = feed::load_items(&args.items)?;
    info!(items = items.len(), "feed loaded");

    let mut builder = SchedulerBuilder::http_from_file(&args.categories, config)
        .with_context(|| format!("failed to set up scheduler from {}", args.categories.display()))?
        .notifier(Arc::new(|category: &str| info!(category = %category, "feed is visible")));
    if args.interleave {
        builder = builder.placement(Arc::new(SizeInterleavePlacement));
    }
    let scheduler = builder.build();

    scheduler.set_items(&items);
    let mut view = scheduler.settled().await;

    // Each simulated scroll is one rising edge of the proximity signal.
    let scrolls = if args.all { usize::MAX } else { args.scrolls };
    let mut scrolled = 0;
    while scrolled < scrolls && view.has_more {
        let before = scheduler.debug();
        scheduler.report_proximity(true);
        view = scheduler.settled().await;
        scheduler.report_proximity(false);
        scrolled += 1;

        let after = scheduler.debug();
        if after.requested_count == before.requested_count && after.prepared_count == before.prepared_count {
            warn!(
                head = after.head_category.as_deref().unwrap_or("-"),
                status = after.head_status.unwrap_or("-"),
                "feed stalled, stopping"
            );
            break;
        }
    }

    info!(
        categories = view.categories.len(),
        items = view.item_count(),
        has_more = view.has_more,
        scrolls = scrolled,
        "feed prepared"
    );
    println!("{}", feed::render(&view, args.pretty)?);

    if args.metrics {
        eprintln!("{}", feed::render(&scheduler.metrics(), true)?);
    }

    scheduler.dispose();
    Ok(())
}
