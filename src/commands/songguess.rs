//! Name the song playing in your voice channel

use crate::{
	constants::settings::SONGGUESS_DISALLOW_REGUESS,
	music::MUSIC_TASK,
	songguess,
	states::{Context, ContextPolyfill, InteractionResult},
	translation::Translate,
	voice,
};
use fluent::fluent_args;
use poise::command;

/// Guess the name of a song
#[command(
	prefix_command,
	slash_command,
	guild_only,
	aliases("guess", "namethattune"),
	user_cooldown = 5
)]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(crate) async fn songguess(ctx: Context<'_>) -> InteractionResult {
	let guild_id = ctx.guild_only_id();
	let discord = ctx.serenity_context();
	let data = ctx.data();

	if data.songguess.is_limited() {
		ctx.shout(ctx.translate("SONGGUESS_LIMITED", None)).await?;
		return Ok(());
	}

	let Some(voice_channel) = voice::channel_of(discord, guild_id, ctx.author().id) else {
		ctx.shout(ctx.translate("VOICE_NO_CHANNEL", None)).await?;
		return Ok(());
	};

	if let Some(game) = data.songguess.running(guild_id) {
		let key = if game.voice_channel == voice_channel {
			"SONGGUESS_ALREADY_RUNNING_HERE"
		} else {
			"SONGGUESS_ALREADY_RUNNING"
		};

		ctx.shout(ctx.translate(
			key,
			Some(fluent_args!["channel" => voice::channel_name(discord, guild_id, game.voice_channel)]),
		))
		.await?;
		return Ok(());
	}

	if data.tasks.has(MUSIC_TASK, guild_id.get()) {
		ctx.shout(ctx.translate("SONGGUESS_MUSIC_PLAYING", None))
			.await?;
		return Ok(());
	}

	// The last game may still be leaving the channel
	if data
		.settings
		.get_bool(Some(guild_id), SONGGUESS_DISALLOW_REGUESS)
		&& data.songbird.get(guild_id).is_some()
	{
		ctx.shout(ctx.translate("SONGGUESS_WAIT", None)).await?;
		return Ok(());
	}

	if let Err(issue) = voice::check_playable(discord, guild_id, voice_channel) {
		ctx.shout(ctx.translate(issue.translation_key(), None))
			.await?;
		return Ok(());
	}

	if ctx.prefix() == "/" {
		ctx.say(ctx.translate("SONGGUESS_STARTING", None)).await?;
	}

	if !songguess::play(discord, data, guild_id, ctx.channel_id(), voice_channel).await? {
		ctx.shout(ctx.translate(
			"SONGGUESS_ALREADY_RUNNING",
			Some(fluent_args!["channel" => voice::channel_name(discord, guild_id, voice_channel)]),
		))
		.await?;
	}

	Ok(())
}
