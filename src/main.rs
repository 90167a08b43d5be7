use crier::announcements::{self, store::sweep_periodically, workflow::ChannelPoster, AnnouncementStore};
use crier::schedule::{self, ScheduledAction, TaskQueue};
use crier::{archive, avatar, email, fun, handlers, roles, Config, Data};

use chrono::Utc;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().expect("Invalid configuration");

    std::fs::create_dir_all(&config.data_dir).expect("Failed to create data dir"); // ensure data dir exists

    let store = AnnouncementStore::load(config.announcements_path(), config.announcement_lifespan)
        .await
        .expect("Failed to load announcements");
    let store = Arc::new(store);

    match store.sweep_expired(Utc::now()).await {
        Ok(removed) => tracing::info!("Dropped {} expired announcements", removed.len()),
        Err(e) => tracing::error!("Failed to sweep expired announcements: {}", e),
    }

    let tasks = Arc::new(
        TaskQueue::load(config.tasks_path())
            .await
            .expect("Failed to load scheduled tasks"),
    );

    let gateway = email::gateway_from_config(&config.email, reqwest::Client::new());

    let token = config.discord_token.clone();
    let intents = serenity::GatewayIntents::non_privileged();

    let framework = poise::Framework::builder()
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                tokio::spawn(sweep_periodically(store.clone()));

                let http = ctx.http.clone();
                let archive_category = config.archive_category;
                tokio::spawn(schedule::run_periodically(tasks.clone(), move |action| {
                    let http = http.clone();
                    async move {
                        match action {
                            ScheduledAction::ArchiveChannel { channel_id } => {
                                let Some(category) = archive_category else {
                                    return Err("archive category is not configured".to_string());
                                };
                                archive::archive_channel(
                                    &http,
                                    serenity::ChannelId::new(channel_id),
                                    category,
                                )
                                .await
                                .map_err(|e| e.to_string())
                            }
                        }
                    }
                }));

                let poster = Arc::new(ChannelPoster::new(ctx.http.clone()));
                let announcement_channel = config.announcement_channel.map(|id| id.get());

                Ok(Data {
                    announcements: announcements::Workflow::new(
                        store,
                        gateway,
                        poster,
                        announcement_channel,
                    ),
                    tasks,
                    config,
                })
            })
        })
        .options(poise::FrameworkOptions {
            commands: vec![
                announcements::commands::announce(),
                archive::commands::archive(),
                roles::commands::role(),
                fun::commands::ping(),
                fun::commands::roll(),
                fun::commands::coinflip(),
                avatar::commands::avatar(),
            ],
            event_handler: |ctx, event, framework, data| {
                Box::pin(handlers::event_handler(ctx, event, framework, data))
            },
            on_error: |error| Box::pin(handlers::on_error(error)),
            ..Default::default()
        })
        .build();

    let mut client = serenity::client::Client::builder(token, intents)
        .framework(framework)
        .await
        .expect("Error creating client");

    if let Err(why) = client.start().await {
        tracing::error!("Client error: {why:?}");
    }
}
