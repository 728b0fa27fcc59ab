//! `Discord` client events handlers

use crate::{
	commands::helpers::register_,
	constants::events,
	database::{
		models::{NewLeftServer, NewServer, Server},
		prelude::*,
	},
	music, reminders,
	settings::SettingsCache,
	songguess::SongGuess,
	subscriptions,
	states::{ArcData, FrameworkContext, InteractionResult, MessageComponentContext},
	votes,
};
use anyhow::Context;
use poise::serenity_prelude::{self as serenity, FullEvent, Interaction};
use std::sync::{atomic::AtomicBool, Arc};

mod music_buttons;

/// Prepare the caches and spawn the background loops, runs once when the client first connects
#[tracing::instrument(skip_all)]
pub(crate) async fn setup(ctx: &serenity::Context, data: &ArcData) -> anyhow::Result<()> {
	SettingsCache::load(&data.settings, &mut data.database.get().await?)
		.await
		.context("failed to load settings")?;

	if let Some(url) = &data.config.song_list_url {
		// The game stays in limited mode without its list
		if let Err(error) = SongGuess::load(&data.songguess, &data.http, url).await {
			tracing::error!(error = ?error, "could not load the song list");
		}
	}

	tokio::spawn(reminders::deliver_reminders(ctx.clone(), Arc::clone(data)));
	tokio::spawn(subscriptions::poll_subscriptions(ctx.clone(), Arc::clone(data)));
	tokio::spawn(votes::consume_votes(ctx.clone(), Arc::clone(data)));

	Ok(())
}

/// Serenity listener to react to `Discord` events
pub(crate) async fn event_handler(
	ctx: &serenity::Context,
	event: &FullEvent,
	framework: FrameworkContext<'_>,
	data: &ArcData,
) -> InteractionResult {
	match event {
		FullEvent::Ready { data_about_bot } => {
			// Production commands are registered globally once
			if !data.config.production {
				register_(
					&ctx.http,
					&data.config.discord_development_guild,
					&framework.options.commands,
				)
				.await
				.context("Could not register guild commands")?;
			}

			tracing::info!("`{}` is ready!", data_about_bot.user.name);

			Ok(())
		}

		FullEvent::GuildCreate { guild, .. } => {
			let mut connection = data.database.get().await?;

			if let Some(server) = Server::with_id(guild.id)
				.first::<Server>(&mut connection)
				.await
				.optional()?
			{
				tracing::debug!(
					guild_id = server.id,
					"Guild `{}` already exists in the database",
					server.name,
				);
			} else {
				tracing::info!(
					guild_id = guild.id.get(),
					"Adding guild `{}` to database",
					guild.name
				);

				NewServer {
					id: guild.id.get(),
					owner_id: guild.owner_id.get(),
					name: guild.name.as_str(),
				}
				.insert()
				.execute(&mut connection)
				.await?;
			}

			Ok(())
		}

		FullEvent::GuildDelete { incomplete, .. } => {
			// Outages also remove guilds for a while
			if incomplete.unavailable {
				return Ok(());
			}

			tracing::warn!(guild_id = incomplete.id.get(), "Left guild");

			music::deconstruct_listener(data, incomplete.id).await?;

			NewLeftServer {
				server_id: incomplete.id.get(),
			}
			.insert()
			.execute(&mut data.database.get().await?)
			.await?;

			Ok(())
		}

		FullEvent::VoiceStateUpdate { new, .. } => {
			let kicked = new.user_id == ctx.cache.current_user().id && new.channel_id.is_none();

			match new.guild_id {
				Some(guild_id) if kicked && data.music.contains(guild_id) => {
					tracing::info!(guild_id = guild_id.get(), "disconnected from voice");
					music::deconstruct_listener(data, guild_id).await
				}
				_ => Ok(()),
			}
		}

		FullEvent::InteractionCreate {
			interaction: Interaction::Component(interaction),
		} => {
			let ctx = MessageComponentContext {
				interaction,
				data,
				discord: ctx,
				has_sent_initial_response: &AtomicBool::new(false),
			};

			tracing::info!(
				user_id = ctx.interaction.user.id.get(),
				custom_id = ctx.interaction.data.custom_id,
				"`{}` interacted with a component",
				ctx.interaction.user.name,
			);

			match interaction.data.custom_id.as_str() {
				events::MUSIC_PAUSE_BUTTON_INTERACTION => music_buttons::pause(ctx).await,
				events::MUSIC_SKIP_BUTTON_INTERACTION => music_buttons::skip(ctx).await,

				_ => Ok(()),
			}
		}

		_ => {
			tracing::trace!(event = ?event, "missed event");

			Ok(())
		}
	}
}
