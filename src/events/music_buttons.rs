//! Buttons of the now playing message

use crate::{
	music::{self, SkipVote},
	states::{InteractionError, InteractionResult, MessageComponentContext},
	translation::Translate,
	voice,
};
use fluent::fluent_args;
use poise::serenity_prelude::GuildId;

/// Whether the user of the component listens to the music of the guild
///
/// Tells the user why not otherwise.
async fn check_listening(
	ctx: &MessageComponentContext<'_>,
	guild_id: GuildId,
) -> Result<bool, InteractionError> {
	let Some(voice_channel) = ctx
		.data
		.music
		.with_listener(guild_id, |listener| listener.voice_channel)
	else {
		ctx.shout(ctx.translate("MUSIC_NOTHING_PLAYING", None))
			.await?;
		return Ok(false);
	};

	if voice::channel_of(ctx.discord, guild_id, ctx.interaction.user.id) != Some(voice_channel) {
		ctx.shout(ctx.translate("MUSIC_NOT_LISTENING", None))
			.await?;
		return Ok(false);
	}

	Ok(true)
}

/// Toggle pause
#[tracing::instrument(skip_all, fields(caller_id = %ctx.interaction.user.id))]
pub(super) async fn pause(ctx: MessageComponentContext<'_>) -> InteractionResult {
	let guild_id = ctx.guild_only_id();

	if !check_listening(&ctx, guild_id).await? {
		return Ok(());
	}

	let key = match music::set_paused(ctx.data, guild_id, None).await? {
		Some(true) => "MUSIC_PAUSED",
		Some(false) => "MUSIC_RESUMED",
		None => "MUSIC_NOTHING_PLAYING",
	};
	ctx.shout(ctx.translate(key, None)).await?;

	music::refresh_now_playing(ctx.discord, ctx.data, guild_id, false).await
}

/// Vote to skip
#[tracing::instrument(skip_all, fields(caller_id = %ctx.interaction.user.id))]
pub(super) async fn skip(ctx: MessageComponentContext<'_>) -> InteractionResult {
	let guild_id = ctx.guild_only_id();

	if !check_listening(&ctx, guild_id).await? {
		return Ok(());
	}

	let reply = match music::vote_skip(ctx.discord, ctx.data, guild_id, ctx.interaction.user.id)? {
		Some(SkipVote::Skip) => ctx.translate("MUSIC_SKIPPED", None),
		Some(SkipVote::Recorded { votes, needed }) => ctx.translate(
			"MUSIC_SKIP_VOTED",
			Some(fluent_args!["votes" => votes, "needed" => needed]),
		),
		Some(SkipVote::AlreadyVoted) => ctx.translate("MUSIC_SKIP_ALREADY_VOTED", None),
		None => ctx.translate("MUSIC_NOTHING_PLAYING", None),
	};

	ctx.shout(reply).await?;

	Ok(())
}
