//! Reload the caches filled at startup

use crate::{
	states::{ApplicationContext, ApplicationContextPolyfill, InteractionResult},
	translation::Translate,
};
use fluent::fluent_args;
use poise::command;

/// Reload the settings and the song list from their sources
#[command(slash_command, owners_only, hide_in_help, rename = "reload")]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.interaction.user.id))]
pub(super) async fn debug_reload(ctx: ApplicationContext<'_>) -> InteractionResult {
	ctx.defer_response(true).await?;

	ctx.data
		.settings
		.load(&mut ctx.data.database.get().await?)
		.await?;

	let songs = match &ctx.data.config.song_list_url {
		Some(url) => match ctx.data.songguess.load(&ctx.data.http, url).await {
			Ok(count) => count,
			Err(error) => {
				tracing::error!(error = ?error, "could not reload the song list");
				0
			}
		},
		None => 0,
	};

	ctx.shout(ctx.translate(
		"debug_reload-done",
		Some(fluent_args!["songs" => songs]),
	))
	.await?;

	Ok(())
}
