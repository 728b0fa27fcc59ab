//! A set of commands to refresh the database

use crate::{
	database::{
		models::{NewServer, Server},
		prelude::*,
	},
	states::{ApplicationContext, ApplicationContextPolyfill, InteractionResult},
	translation::Translate,
};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use fluent::fluent_args;
use poise::command;

/// A set of commands to refresh the database
#[allow(clippy::unused_async)]
#[command(
	slash_command,
	owners_only,
	hide_in_help,
	rename = "refresh",
	subcommands("debug_refresh_server", "debug_refresh_servers")
)]
pub(super) async fn debug_refresh(_: ApplicationContext<'_>) -> InteractionResult {
	Ok(())
}

/// Loads the current guild in the database
#[command(
	slash_command,
	owners_only,
	hide_in_help,
	guild_only,
	rename = "server"
)]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.interaction.user.id))]
pub(super) async fn debug_refresh_server(ctx: ApplicationContext<'_>) -> InteractionResult {
	let mut connection = ctx.data.database.get().await?;
	let guild_id = ctx.guild_only_id();

	if let Some(server) = Server::with_id(guild_id)
		.first::<Server>(&mut connection)
		.await
		.optional()?
	{
		ctx.shout(ctx.translate(
			"debug_refresh_server-already-in-database",
			Some(fluent_args!["server" => server.name]),
		))
		.await?;

		return Ok(());
	}

	let Some((owner_id, name)) = ctx
		.serenity_context
		.cache
		.guild(guild_id)
		.map(|guild| (guild.owner_id, guild.name.clone()))
	else {
		ctx.shout(ctx.translate("debug_refresh_server-not-cached", None))
			.await?;

		return Ok(());
	};

	NewServer {
		id: guild_id.get(),
		owner_id: owner_id.get(),
		name: &name,
	}
	.insert()
	.execute(&mut connection)
	.await?;

	ctx.shout(ctx.translate(
		"debug_refresh_server-added",
		Some(fluent_args!["server" => name]),
	))
	.await?;

	Ok(())
}

/// Loads every cached guild in the database
#[command(slash_command, owners_only, hide_in_help, rename = "servers")]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.interaction.user.id))]
pub(super) async fn debug_refresh_servers(ctx: ApplicationContext<'_>) -> InteractionResult {
	let mut connection = ctx.data.database.get().await?;

	// Cache guards cannot be held across queries
	let guilds = ctx
		.serenity_context
		.cache
		.guilds()
		.into_iter()
		.filter_map(|guild_id| {
			ctx.serenity_context
				.cache
				.guild(guild_id)
				.map(|guild| (guild.id, guild.owner_id, guild.name.clone()))
		})
		.collect::<Vec<_>>();

	let mut count = 0;

	for (guild_id, owner_id, name) in guilds {
		let new_server = NewServer {
			id: guild_id.get(),
			owner_id: owner_id.get(),
			name: &name,
		};

		match new_server.insert().execute(&mut connection).await {
			Ok(_) => count += 1,
			Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {}
			Err(error) => return Err(error.into()),
		};
	}

	ctx.shout(ctx.translate(
		"debug_refresh_servers-added",
		Some(fluent_args!["count" => count]),
	))
	.await?;

	Ok(())
}
