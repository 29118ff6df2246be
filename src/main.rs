//! VolunteerHub feed client
//!
//! Main application entry point

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use VolunteerHub::{
    config::Settings,
    services::{CardAction, FeedEngine, HttpEventSource, RemoteEventSource},
    state::FilterChange,
    utils::logging,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let settings = Settings::new().context("loading settings")?;
    settings.validate()?;

    // Initialize logging; the guard flushes the file writer on exit
    let _guard = logging::init_logging(&settings.logging)?;

    info!("Starting {}...", VolunteerHub::info());

    let source = Arc::new(HttpEventSource::new(&settings.api)?);

    // The backend idles when unused; poke it before the first real query
    info!("Waking event backend at {}...", settings.api.base_url);
    if let Err(e) = source.health().await {
        warn!(error = %e, "Health check failed, continuing anyway");
    }

    let engine = FeedEngine::new(source, &settings);
    if let Some(session) = &settings.session {
        engine.set_viewer(Some(session.viewer())).await;
    }

    let search = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    let outcome = if search.trim().is_empty() {
        engine.start().await
    } else {
        engine.change_filter(FilterChange::Search(search)).await
    };
    info!(outcome = ?outcome, "Feed loaded");

    let status = engine.status();
    if let Some(fault) = status.fault {
        println!("{}", fault.message);
        return Ok(());
    }

    println!("Filter: {}", status.active);
    for view in engine.feed() {
        let event = &view.event;
        let marker = if view.is_bookmarked { "*" } else { " " };
        println!(
            "{} {:<40} {:<14} {:<12} {} {}/{} {}",
            marker,
            event.title,
            event.category,
            event.location,
            event.date,
            event.current_participants,
            event.max_participants,
            action_label(view.action),
        );
    }
    if !status.exhausted {
        println!("... more events available");
    }

    Ok(())
}

fn action_label(action: CardAction) -> &'static str {
    match action {
        CardAction::SignIn => "[sign in to join]",
        CardAction::Manage => "[manage]",
        CardAction::ViewOnly => "[view]",
        CardAction::ViewApproved => "[approved]",
        CardAction::AwaitingApproval => "[awaiting approval]",
        CardAction::Rejected => "[not accepted]",
        CardAction::Full => "[full]",
        CardAction::Join => "[join]",
    }
}
