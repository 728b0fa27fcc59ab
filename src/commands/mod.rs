//! `Discord` client commands

use crate::{
	constants::settings::PREFIX,
	database::{
		models::{Ban, NewCommandLog},
		prelude::*,
	},
	states::{ArcData, Context, ContextPolyfill, FrameworkError, InteractionError},
	translation::Translate,
};
use anyhow::Context as _;
use fluent::fluent_args;
use poise::{serenity_prelude, BoxFuture, PartialContext};
use uuid::Uuid;

mod admin;
mod filter;
mod information;
mod meme;
mod music;
mod remind;
mod songguess;
mod subscribe;
mod vote;

pub(crate) use admin::admin;
pub(crate) use filter::{filter, sosad};
pub(crate) use information::{help, stats};
pub(crate) use meme::meme;
pub(crate) use music::music;
pub(crate) use remind::remind;
pub(crate) use songguess::songguess;
pub(crate) use subscribe::subscribe;
pub(crate) use vote::vote;
pub(crate) mod helpers;

/// Resolve the prefix of the guild the message was sent in
pub(crate) fn dynamic_prefix(
	ctx: PartialContext<'_, ArcData, InteractionError>,
) -> BoxFuture<'_, Result<Option<String>, InteractionError>> {
	Box::pin(async move { Ok(ctx.data.settings.get(ctx.guild_id, PREFIX)) })
}

/// Run before every command, silently ignores banned users, guilds and channels and logs the rest
pub(crate) fn command_check(ctx: Context<'_>) -> BoxFuture<'_, Result<bool, InteractionError>> {
	Box::pin(async move {
		let mut connection = ctx.data().database.get().await?;

		let mut ids = vec![ctx.author().id.get(), ctx.channel_id().get()];
		if let Some(guild_id) = ctx.guild_id() {
			ids.push(guild_id.get());
		}

		if Ban::any_of(&mut connection, &ids).await? {
			tracing::info!(
				user_id = ctx.author().id.get(),
				command_id = ctx.command().identifying_name,
				"ignoring banned invocation",
			);

			return Ok(false);
		}

		NewCommandLog {
			user_id: ctx.author().id.get(),
			channel_id: ctx.channel_id().get(),
			server_id: ctx.guild_id().map(serenity_prelude::GuildId::get),
			command: &ctx.invocation_string(),
		}
		.insert()
		.execute(&mut connection)
		.await?;

		Ok(true)
	})
}

/// Execute before each command
pub(crate) fn pre_command(ctx: Context) -> BoxFuture<()> {
	Box::pin(async move {
		tracing::info!(
			user_id = ctx.author().id.get(),
			username = &ctx.author().name,
			command_id = ctx.command().identifying_name,
			"Command invocation",
		);
	})
}

/// Execute on a error during code execution
#[allow(clippy::too_many_lines)]
pub(crate) fn command_on_error(error: FrameworkError) -> BoxFuture<()> {
	Box::pin(async move {
		let error = match error {
			FrameworkError::Command { error, ctx, .. } => handle_interaction_error(ctx, error)
				.await
				.context("failed to send error message"),

			FrameworkError::EventHandler { error, event, .. } => {
				tracing::error!(
					error = ?error,
					event = ?event,
					"event handler",
				);

				Ok(())
			}

			FrameworkError::CommandCheckFailed { ctx, error, .. } => match error {
				Some(error) => handle_interaction_error(ctx, error)
					.await
					.context("failed to send error message"),
				// Banned invocations get no answer
				None => Ok(()),
			},

			FrameworkError::CooldownHit {
				ctx,
				remaining_cooldown,
				..
			} => ctx
				.shout(ctx.translate(
					"error-cooldown",
					Some(fluent_args!["seconds" => remaining_cooldown.as_secs().max(1)]),
				))
				.await
				.map(|_| ())
				.context("Failed to send cooldown message"),

			FrameworkError::ArgumentParse { ctx, input, .. } => ctx
				.shout(ctx.translate(
					"error-argument-parse",
					Some(fluent_args![
						"input" => input.unwrap_or_default(),
						"command" => ctx.command().qualified_name.clone()
					]),
				))
				.await
				.map(|_| ())
				.context("Failed to send argument parse message"),

			FrameworkError::MissingBotPermissions {
				ctx,
				missing_permissions,
				..
			} => ctx
				.shout(ctx.translate(
					"error-bot-missing-permissions",
					Some(fluent_args!["permissions" => missing_permissions.to_string()]),
				))
				.await
				.map(|_| ())
				.context("Failed to send missing bot permissions message"),

			FrameworkError::MissingUserPermissions {
				ctx,
				missing_permissions,
				..
			} => {
				let text = missing_permissions.map_or_else(
					|| ctx.translate("error-user-missing-unknown-permissions", None),
					|permission| {
						ctx.translate(
							"error-user-missing-permissions",
							Some(fluent_args!["permissions" => permission.to_string()]),
						)
					},
				);

				ctx.shout(text)
					.await
					.map(|_| ())
					.context("Failed to send missing user permissions message")
			}

			FrameworkError::NotAnOwner { ctx, .. } => ctx
				.shout(ctx.translate("error-not-an-owner", None))
				.await
				.map(|_| ())
				.context("Failed to send not an owner message"),

			FrameworkError::GuildOnly { ctx, .. } => ctx
				.shout(ctx.translate("error-guild-only", None))
				.await
				.map(|_| ())
				.context("Failed to send guild only message"),

			FrameworkError::DmOnly { ctx, .. } => ctx
				.shout(ctx.translate("error-dm-only", None))
				.await
				.map(|_| ())
				.context("Failed to send dm only message"),

			error => {
				tracing::error!(error = ?error, "framework");

				Ok(())
			}
		};

		if let Err(error) = error {
			tracing::error!(error = ?error);
		}
	})
}

/// Execute after every successful command
pub(crate) fn post_command(ctx: Context) -> BoxFuture<()> {
	Box::pin(async move {
		tracing::debug!(
			user_id = ctx.author().id.get(),
			username = &ctx.author().name,
			command_id = ctx.command().identifying_name,
			"Command invocation successful",
		);
	})
}

/// Handle our custom command interaction error
async fn handle_interaction_error(
	ctx: Context<'_>,
	error: InteractionError,
) -> serenity_prelude::Result<()> {
	let error_identifier = Uuid::new_v4().hyphenated().to_string();

	tracing::error!(
		user_id = ctx.author().id.get(),
		username = ctx.author().name,
		error_id = error_identifier,
		error = ?error,
		command_id = ctx.command().identifying_name,
		"interaction body or check",
	);

	ctx.shout(ctx.translate(
		"error-internal-with-id",
		Some(fluent_args!["id" => error_identifier]),
	))
	.await?;

	Ok(())
}
