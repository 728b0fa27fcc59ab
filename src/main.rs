//! `OcelotBOT`, music, games and utilities for `Discord` servers

mod commands;
mod constants;
mod database;
mod events;
mod images;
mod logging;
mod music;
mod polyfill;
mod reminders;
mod server;
mod settings;
mod songguess;
mod states;
mod subscriptions;
mod tasks;
mod translation;
mod voice;
mod votes;

use crate::{
	commands::{command_check, command_on_error, dynamic_prefix, post_command, pre_command},
	constants::SHUTDOWN_GRACE_PERIOD,
	database::run_migrations,
	events::event_handler,
	logging::setup_logging,
	server::start_server,
	states::{ArcData, Data, Framework},
};
use anyhow::{anyhow, Context};
use poise::serenity_prelude::{ClientBuilder, GatewayIntents};
use secrecy::ExposeSecret;
use songbird::SerenityInit;
use std::sync::Arc;
use tracing::instrument;

/// Build the `poise` [framework](poise::Framework)
#[instrument]
fn build_framework(data: ArcData) -> Framework {
	Framework::builder()
		.setup({
			let data = Arc::clone(&data);
			move |ctx, _ready, framework| {
				Box::pin(async move {
					events::setup(ctx, &data).await?;

					if data.config.production {
						poise::builtins::register_globally(ctx, &framework.options().commands)
							.await?;
					}

					Ok(data)
				})
			}
		})
		.options(poise::FrameworkOptions {
			pre_command,
			on_error: command_on_error,
			post_command,
			command_check: Some(command_check),
			event_handler: |ctx, event, fw, data| Box::pin(event_handler(ctx, event, fw, data)),
			prefix_options: poise::PrefixFrameworkOptions {
				dynamic_prefix: Some(dynamic_prefix),
				mention_as_prefix: true,
				case_insensitive_commands: true,
				..Default::default()
			},
			commands: {
				use commands::{
					admin, filter, help, helpers, meme, music, remind, songguess, sosad, stats,
					subscribe, vote,
				};

				#[rustfmt::skip]
				let mut commands = vec![
					music(),
					songguess(),
					filter(),
					sosad(),
					meme(),
					remind(),
					subscribe(),
					vote(),
					help(),
					stats(),
					admin(),
					helpers::debug(),
				];

				data.translations
					.apply_translations_to_interactions(&mut commands, None);

				commands
			},
			..Default::default()
		})
		.initialize_owners(true)
		.build()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let data = Arc::new(Data::new().await?);

	setup_logging(&data)?;
	let _handle = start_server(Arc::clone(&data));

	run_migrations(data.config.database_url.expose_secret()).context("failed to run migrations")?;

	let mut client = ClientBuilder::new(
		data.config.discord_token.expose_secret(),
		GatewayIntents::GUILDS
			| GatewayIntents::GUILD_VOICE_STATES
			| GatewayIntents::DIRECT_MESSAGES
			| GatewayIntents::GUILD_MESSAGES
			| GatewayIntents::MESSAGE_CONTENT
			| GatewayIntents::GUILD_MEMBERS,
	)
	.framework(build_framework(Arc::clone(&data)))
	.register_songbird_with(Arc::clone(&data.songbird))
	.await?;

	tokio::spawn({
		let data = Arc::clone(&data);
		let shard_manager = Arc::clone(&client.shard_manager);

		async move {
			if let Err(error) = tokio::signal::ctrl_c().await {
				tracing::error!(error = ?error, "could not listen for the shutdown signal");
				return;
			}

			tracing::info!(tasks = data.tasks.count(), "shutting down, waiting for tasks");

			if !data.tasks.wait_until_clear(SHUTDOWN_GRACE_PERIOD).await {
				tracing::warn!(tasks = data.tasks.count(), "tasks still running, shutting down anyway");
			}

			shard_manager.shutdown_all().await;
		}
	});

	if let Err(error) = client.start_autosharded().await {
		return Err(anyhow!("Client exited with error: {}", error));
	}

	Ok(())
}
