//! Saved snippets summoned by name

use crate::{
	constants::limits::MAX_MEME_NAME_LENGTH,
	database::{
		models::{Meme, NewMeme},
		prelude::*,
	},
	states::{Context, ContextPolyfill, InteractionResult},
	translation::Translate,
};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use fluent::fluent_args;
use poise::command;

/// The stored form of a meme name
fn meme_name(name: &str) -> String {
	name.trim().to_lowercase()
}

/// The stored form of a meme content, `None` when there is nothing to send
fn meme_content(content: &str) -> Option<&str> {
	Some(content.trim()).filter(|content| !content.is_empty())
}

/// Send a meme, guild memes take precedence over global ones
async fn send_meme(ctx: Context<'_>, name: &str) -> InteractionResult {
	let name = meme_name(name);
	let meme = Meme::find(
		&mut ctx.data().database.get().await?,
		ctx.guild_only_id(),
		&name,
	)
	.await?;

	match meme {
		Some(meme) => ctx.say(meme.content).await?,
		None => {
			ctx.shout(ctx.translate("MEME_NOT_FOUND", Some(fluent_args!["name" => name])))
				.await?
		}
	};

	Ok(())
}

/// Send a saved meme
#[command(
	prefix_command,
	slash_command,
	guild_only,
	user_cooldown = 3,
	subcommands("meme_get", "meme_add", "meme_remove", "meme_list")
)]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(crate) async fn meme(ctx: Context<'_>, name: Option<String>) -> InteractionResult {
	match name {
		Some(name) => send_meme(ctx, &name).await,
		None => list(ctx).await,
	}
}

/// Send a saved meme
#[command(prefix_command, slash_command, guild_only, rename = "get")]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(crate) async fn meme_get(ctx: Context<'_>, name: String) -> InteractionResult {
	send_meme(ctx, &name).await
}

/// Save a meme in this server
#[command(prefix_command, slash_command, guild_only, rename = "add")]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(crate) async fn meme_add(
	ctx: Context<'_>,
	name: String,
	#[rest] content: String,
) -> InteractionResult {
	let name = meme_name(&name);

	if name.is_empty() || name.chars().count() > MAX_MEME_NAME_LENGTH {
		ctx.shout(ctx.translate(
			"MEME_INVALID_NAME",
			Some(fluent_args!["max" => MAX_MEME_NAME_LENGTH]),
		))
		.await?;
		return Ok(());
	}

	let Some(content) = meme_content(&content) else {
		ctx.shout(ctx.translate("MEME_EMPTY", None)).await?;
		return Ok(());
	};

	let new_meme = NewMeme {
		name: &name,
		server_id: Some(ctx.guild_only_id().get()),
		added_by: ctx.author().id.get(),
		content,
	};

	let reply = match new_meme
		.insert()
		.execute(&mut ctx.data().database.get().await?)
		.await
	{
		Ok(_) => ctx.translate("MEME_ADDED", Some(fluent_args!["name" => name.as_str()])),
		Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
			ctx.translate("MEME_EXISTS", Some(fluent_args!["name" => name.as_str()]))
		}
		Err(error) => return Err(error.into()),
	};

	ctx.say(reply).await?;

	Ok(())
}

/// Remove a meme you saved
#[command(
	prefix_command,
	slash_command,
	guild_only,
	rename = "remove",
	aliases("delete")
)]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(crate) async fn meme_remove(ctx: Context<'_>, name: String) -> InteractionResult {
	let name = meme_name(&name);

	let deleted = Meme::delete_owned(
		&mut ctx.data().database.get().await?,
		ctx.guild_only_id(),
		ctx.author().id,
		&name,
	)
	.await?;

	let key = if deleted {
		"MEME_REMOVED"
	} else {
		"MEME_NOT_OWNED"
	};

	ctx.say(ctx.translate(key, Some(fluent_args!["name" => name])))
		.await?;

	Ok(())
}

/// List the memes available in this server
async fn list(ctx: Context<'_>) -> InteractionResult {
	let names =
		Meme::names_for_guild(&mut ctx.data().database.get().await?, ctx.guild_only_id()).await?;

	if names.is_empty() {
		ctx.say(ctx.translate("MEME_LIST_EMPTY", None)).await?;
		return Ok(());
	}

	ctx.say(ctx.translate(
		"MEME_LIST",
		Some(fluent_args!["memes" => names.join(", ")]),
	))
	.await?;

	Ok(())
}

/// List the memes available in this server
#[command(prefix_command, slash_command, guild_only, rename = "list")]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(crate) async fn meme_list(ctx: Context<'_>) -> InteractionResult {
	list(ctx).await
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn blank_content_is_refused() {
		assert_eq!(meme_content("  \n "), None);
		assert_eq!(meme_content(""), None);
		assert_eq!(
			meme_content(" https://i.imgur.com/x.png "),
			Some("https://i.imgur.com/x.png")
		);
	}

	#[test]
	fn names_are_case_insensitive() {
		assert_eq!(meme_name("  Doge "), "doge");
		assert_eq!(meme_name("OCELOT"), meme_name("ocelot"));
	}
}
