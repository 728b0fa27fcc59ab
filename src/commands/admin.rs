//! Owner tools to configure servers and ban abusers

use crate::{
	database::{
		models::{Ban, BanKind, NewBan, ServerSetting},
		prelude::*,
	},
	settings::SettingsCache,
	states::{Context, ContextPolyfill, InteractionResult},
	translation::Translate,
};
use fluent::fluent_args;
use poise::{command, serenity_prelude::GuildId};

/// The word addressing global settings instead of a server
const GLOBAL_SCOPE: &str = "global";

/// Owner tools
#[allow(clippy::unused_async)]
#[command(
	prefix_command,
	slash_command,
	owners_only,
	hide_in_help,
	subcommand_required,
	subcommands("admin_setconfig", "admin_unsetconfig", "admin_ban", "admin_unban")
)]
pub(crate) async fn admin(_: Context<'_>) -> InteractionResult {
	Ok(())
}

/// Parse the server argument, `Ok(None)` for the global scope
fn parse_scope(server: &str) -> Result<Option<GuildId>, ()> {
	if server.eq_ignore_ascii_case(GLOBAL_SCOPE) {
		return Ok(None);
	}

	match server.parse::<u64>() {
		Ok(id) if id != 0 => Ok(Some(GuildId::new(id))),
		_ => Err(()),
	}
}

/// Reload the cached settings of a scope after a change
async fn reload_scope(ctx: Context<'_>, scope: Option<GuildId>) -> InteractionResult {
	let mut connection = ctx.data().database.get().await?;

	match scope {
		Some(guild_id) => {
			ctx.data()
				.settings
				.reload_for_server(&mut connection, guild_id)
				.await?;
		}
		None => SettingsCache::load(&ctx.data().settings, &mut connection).await?,
	}

	Ok(())
}

/// Set a server setting, use `global` to change the default of every server
#[command(prefix_command, slash_command, owners_only, rename = "setconfig")]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(crate) async fn admin_setconfig(
	ctx: Context<'_>,
	server: Option<String>,
	key: Option<String>,
	#[rest] value: Option<String>,
) -> InteractionResult {
	let (Some(server), Some(key), Some(value)) = (server, key, value) else {
		ctx.shout(ctx.translate("ADMIN_SETCONFIG_USAGE", None))
			.await?;
		return Ok(());
	};

	let Ok(scope) = parse_scope(&server) else {
		ctx.shout(ctx.translate(
			"ADMIN_INVALID_SERVER",
			Some(fluent_args!["server" => server]),
		))
		.await?;
		return Ok(());
	};

	ServerSetting::set(&mut ctx.data().database.get().await?, scope, &key, &value).await?;
	reload_scope(ctx, scope).await?;

	tracing::info!(server = server, key = key, value = value, "setting changed");

	ctx.say(ctx.translate(
		"ADMIN_SETCONFIG_DONE",
		Some(fluent_args!["key" => key, "value" => value, "server" => server]),
	))
	.await?;

	Ok(())
}

/// Remove a server setting so the global value applies again
#[command(prefix_command, slash_command, owners_only, rename = "unsetconfig")]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(crate) async fn admin_unsetconfig(
	ctx: Context<'_>,
	server: String,
	key: String,
) -> InteractionResult {
	let Ok(scope) = parse_scope(&server) else {
		ctx.shout(ctx.translate(
			"ADMIN_INVALID_SERVER",
			Some(fluent_args!["server" => server]),
		))
		.await?;
		return Ok(());
	};

	let deleted =
		ServerSetting::delete(&mut ctx.data().database.get().await?, scope, &key).await?;

	if !deleted {
		ctx.shout(ctx.translate(
			"ADMIN_UNSETCONFIG_MISSING",
			Some(fluent_args!["key" => key, "server" => server]),
		))
		.await?;
		return Ok(());
	}

	reload_scope(ctx, scope).await?;

	ctx.say(ctx.translate(
		"ADMIN_UNSETCONFIG_DONE",
		Some(fluent_args!["key" => key, "server" => server]),
	))
	.await?;

	Ok(())
}

/// Ignore every command coming from a user, a server or a channel
#[command(prefix_command, slash_command, owners_only, rename = "ban")]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(crate) async fn admin_ban(
	ctx: Context<'_>,
	id: u64,
	kind: BanKind,
	#[rest] reason: String,
) -> InteractionResult {
	let mut connection = ctx.data().database.get().await?;

	if Ban::with_id(id)
		.first::<Ban>(&mut connection)
		.await
		.optional()?
		.is_some()
	{
		ctx.shout(ctx.translate("ADMIN_BAN_EXISTS", Some(fluent_args!["id" => id.to_string()])))
			.await?;
		return Ok(());
	}

	NewBan {
		id,
		kind: kind.as_str(),
		reason: &reason,
	}
	.insert()
	.execute(&mut connection)
	.await?;

	tracing::warn!(id, kind = kind.as_str(), reason = reason, "banned");

	ctx.say(ctx.translate(
		"ADMIN_BAN_DONE",
		Some(fluent_args!["id" => id.to_string(), "kind" => kind.as_str()]),
	))
	.await?;

	Ok(())
}

/// Lift a ban
#[command(prefix_command, slash_command, owners_only, rename = "unban")]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(crate) async fn admin_unban(ctx: Context<'_>, id: u64) -> InteractionResult {
	let deleted = diesel::delete(Ban::with_id(id))
		.execute(&mut ctx.data().database.get().await?)
		.await?;

	let key = if deleted > 0 {
		"ADMIN_UNBAN_DONE"
	} else {
		"ADMIN_UNBAN_MISSING"
	};

	ctx.say(ctx.translate(key, Some(fluent_args!["id" => id.to_string()])))
		.await?;

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn scopes() {
		assert_eq!(parse_scope("global"), Ok(None));
		assert_eq!(parse_scope("GLOBAL"), Ok(None));
		assert_eq!(
			parse_scope("318432654880014347"),
			Ok(Some(GuildId::new(318_432_654_880_014_347)))
		);
		assert_eq!(parse_scope("0"), Err(()));
		assert_eq!(parse_scope("here"), Err(()));
	}
}
