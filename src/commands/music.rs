//! Music playback commands

use crate::{
	music::{
		self,
		embed::{now_playing_buttons, pretty_duration, short_duration, truncate_title},
		ClearQueue, Enqueued, SkipVote,
	},
	states::{Context, ContextPolyfill, InteractionError, InteractionResult},
	translation::Translate,
	voice,
};
use fluent::fluent_args;
use poise::{command, serenity_prelude::ChannelId, CreateReply};

/// Songs listed by the queue command
const QUEUE_PAGE_LENGTH: usize = 10;
/// Longest title listed by the queue command
const QUEUE_TITLE_MAX_LENGTH: usize = 60;

/// Listen to music in your voice channel
#[allow(clippy::unused_async)]
#[command(
	prefix_command,
	slash_command,
	guild_only,
	aliases("m"),
	subcommand_required,
	subcommands(
		"music_play",
		"music_next",
		"music_skip",
		"music_pause",
		"music_resume",
		"music_stop",
		"music_queue",
		"music_clearqueue",
		"music_nowplaying"
	)
)]
pub(crate) async fn music(_: Context<'_>) -> InteractionResult {
	Ok(())
}

/// The voice channel of the music when the author listens to it
///
/// Tells the author why not otherwise.
async fn listening_channel(ctx: Context<'_>) -> Result<Option<ChannelId>, InteractionError> {
	let guild_id = ctx.guild_only_id();

	let Some(voice_channel) = ctx
		.data()
		.music
		.with_listener(guild_id, |listener| listener.voice_channel)
	else {
		ctx.shout(ctx.translate("MUSIC_NOTHING_PLAYING", None))
			.await?;
		return Ok(None);
	};

	if voice::channel_of(ctx.serenity_context(), guild_id, ctx.author().id) != Some(voice_channel) {
		ctx.shout(ctx.translate("MUSIC_NOT_LISTENING", None))
			.await?;
		return Ok(None);
	}

	Ok(Some(voice_channel))
}

/// Join the author, then queue a search or a link
async fn enqueue(ctx: Context<'_>, search: String, next: bool) -> InteractionResult {
	let guild_id = ctx.guild_only_id();
	let discord = ctx.serenity_context();
	let data = ctx.data();

	let Some(voice_channel) = voice::channel_of(discord, guild_id, ctx.author().id) else {
		ctx.shout(ctx.translate("VOICE_NO_CHANNEL", None)).await?;
		return Ok(());
	};

	if data.songguess.running(guild_id).is_some() {
		ctx.shout(ctx.translate("MUSIC_BUSY", None)).await?;
		return Ok(());
	}

	// Joining and resolving links can both outlast the interaction deadline
	ctx.defer().await?;

	let current = data
		.music
		.with_listener(guild_id, |listener| listener.voice_channel);

	match current {
		Some(current) if current != voice_channel => {
			ctx.shout(ctx.translate(
				"MUSIC_OTHER_CHANNEL",
				Some(fluent_args!["channel" => voice::channel_name(discord, guild_id, current)]),
			))
			.await?;
			return Ok(());
		}
		Some(_) => {}
		None => {
			if let Err(issue) = voice::check_playable(discord, guild_id, voice_channel) {
				ctx.shout(ctx.translate(issue.translation_key(), None))
					.await?;
				return Ok(());
			}

			music::connect(data, guild_id, ctx.channel_id(), voice_channel).await?;
		}
	}

	let reply = match music::add_to_queue(discord, data, guild_id, &search, ctx.author().id, next)
		.await?
	{
		Some(Enqueued::Track(track)) => ctx.translate(
			if next { "MUSIC_ADDED_NEXT" } else { "MUSIC_ADDED" },
			Some(fluent_args!["title" => track.title]),
		),
		Some(Enqueued::Playlist {
			count,
			name,
			length,
		}) => ctx.translate(
			"MUSIC_ADDED_PLAYLIST",
			Some(fluent_args![
				"count" => count,
				"name" => name,
				"length" => pretty_duration(length)
			]),
		),
		None => {
			let idle = data
				.music
				.with_listener(guild_id, |listener| {
					listener.playing.is_none() && listener.queue.is_empty()
				})
				.unwrap_or_default();

			// Do not stay connected for nothing
			if idle {
				music::deconstruct_listener(data, guild_id).await?;
			}

			ctx.translate("MUSIC_NO_RESULTS", Some(fluent_args!["search" => search]))
		}
	};

	ctx.say(reply).await?;

	Ok(())
}

/// Add a song or a playlist to the queue
#[command(
	prefix_command,
	slash_command,
	guild_only,
	rename = "play",
	aliases("p", "add"),
	user_cooldown = 3
)]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(crate) async fn music_play(ctx: Context<'_>, #[rest] search: String) -> InteractionResult {
	enqueue(ctx, search, false).await
}

/// Add a song or a playlist right after the playing song
#[command(
	prefix_command,
	slash_command,
	guild_only,
	rename = "next",
	aliases("playnext"),
	user_cooldown = 3
)]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(crate) async fn music_next(ctx: Context<'_>, #[rest] search: String) -> InteractionResult {
	enqueue(ctx, search, true).await
}

/// Vote to skip the playing song
#[command(prefix_command, slash_command, guild_only, rename = "skip", aliases("s"))]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(crate) async fn music_skip(ctx: Context<'_>) -> InteractionResult {
	if listening_channel(ctx).await?.is_none() {
		return Ok(());
	}

	let reply = match music::vote_skip(
		ctx.serenity_context(),
		ctx.data(),
		ctx.guild_only_id(),
		ctx.author().id,
	)? {
		Some(SkipVote::Skip) => ctx.translate("MUSIC_SKIPPED", None),
		Some(SkipVote::Recorded { votes, needed }) => ctx.translate(
			"MUSIC_SKIP_VOTED",
			Some(fluent_args!["votes" => votes, "needed" => needed]),
		),
		Some(SkipVote::AlreadyVoted) => ctx.translate("MUSIC_SKIP_ALREADY_VOTED", None),
		None => ctx.translate("MUSIC_NOTHING_PLAYING", None),
	};

	ctx.say(reply).await?;

	Ok(())
}

/// Pause or resume the playing song
async fn set_paused(ctx: Context<'_>, paused: bool) -> InteractionResult {
	if listening_channel(ctx).await?.is_none() {
		return Ok(());
	}

	let guild_id = ctx.guild_only_id();

	let key = match music::set_paused(ctx.data(), guild_id, Some(paused)).await? {
		Some(true) => "MUSIC_PAUSED",
		Some(false) => "MUSIC_RESUMED",
		None => "MUSIC_NOTHING_PLAYING",
	};
	ctx.say(ctx.translate(key, None)).await?;

	music::refresh_now_playing(ctx.serenity_context(), ctx.data(), guild_id, false).await
}

/// Pause the playing song
#[command(prefix_command, slash_command, guild_only, rename = "pause")]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(crate) async fn music_pause(ctx: Context<'_>) -> InteractionResult {
	set_paused(ctx, true).await
}

/// Resume the paused song
#[command(
	prefix_command,
	slash_command,
	guild_only,
	rename = "resume",
	aliases("unpause")
)]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(crate) async fn music_resume(ctx: Context<'_>) -> InteractionResult {
	set_paused(ctx, false).await
}

/// Stop the music and leave the voice channel
#[command(
	prefix_command,
	slash_command,
	guild_only,
	rename = "stop",
	aliases("leave")
)]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(crate) async fn music_stop(ctx: Context<'_>) -> InteractionResult {
	let Some(voice_channel) = listening_channel(ctx).await? else {
		return Ok(());
	};

	let guild_id = ctx.guild_only_id();

	if voice::members_in(ctx.serenity_context(), guild_id, voice_channel).len() > 2 {
		ctx.shout(ctx.translate("MUSIC_STOP_NOT_ALONE", None))
			.await?;
		return Ok(());
	}

	music::deconstruct_listener(ctx.data(), guild_id).await?;
	ctx.say(ctx.translate("MUSIC_STOPPED", None)).await?;

	Ok(())
}

/// Show the queued songs
#[command(
	prefix_command,
	slash_command,
	guild_only,
	rename = "queue",
	aliases("q", "list")
)]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(crate) async fn music_queue(ctx: Context<'_>) -> InteractionResult {
	let Some((playing, queue)) = music::queue_snapshot(ctx.data(), ctx.guild_only_id()) else {
		ctx.shout(ctx.translate("MUSIC_NOTHING_PLAYING", None))
			.await?;
		return Ok(());
	};

	if queue.is_empty() {
		ctx.say(ctx.translate("MUSIC_QUEUE_EMPTY", None)).await?;
		return Ok(());
	}

	let mut lines = Vec::with_capacity(QUEUE_PAGE_LENGTH + 2);

	if let Some(playing) = playing {
		lines.push(ctx.translate(
			"MUSIC_QUEUE_PLAYING",
			Some(fluent_args!["title" => truncate_title(&playing.title, QUEUE_TITLE_MAX_LENGTH)]),
		));
	}

	for (index, track) in queue.iter().take(QUEUE_PAGE_LENGTH).enumerate() {
		let length = track
			.length
			.map_or_else(|| "LIVE".to_owned(), short_duration);
		lines.push(format!(
			"`{}.` {} ({length})",
			index + 1,
			truncate_title(&track.title, QUEUE_TITLE_MAX_LENGTH)
		));
	}

	let total = ctx
		.data()
		.music
		.with_listener(ctx.guild_only_id(), |listener| listener.queue_length())
		.unwrap_or_default();
	lines.push(ctx.translate(
		"MUSIC_QUEUE_TOTAL",
		Some(fluent_args![
			"count" => queue.len(),
			"length" => pretty_duration(total)
		]),
	));

	ctx.say(lines.join("\n")).await?;

	Ok(())
}

/// Remove every queued song, only when you are alone with the bot
#[command(
	prefix_command,
	slash_command,
	guild_only,
	rename = "clearqueue",
	aliases("cq", "qc", "clear")
)]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(crate) async fn music_clearqueue(ctx: Context<'_>) -> InteractionResult {
	let reply =
		match music::clear_queue(ctx.serenity_context(), ctx.data(), ctx.guild_only_id()).await? {
			ClearQueue::NothingPlaying => ctx.translate("MUSIC_NOTHING_PLAYING", None),
			ClearQueue::Empty => ctx.translate("MUSIC_QUEUE_EMPTY", None),
			ClearQueue::NotAlone => ctx.translate("MUSIC_CLEAR_NOT_ALONE", None),
			ClearQueue::Cleared(count) => {
				ctx.translate("MUSIC_QUEUE_CLEARED", Some(fluent_args!["count" => count]))
			}
		};

	ctx.say(reply).await?;

	Ok(())
}

/// Show the playing song
#[command(
	prefix_command,
	slash_command,
	guild_only,
	rename = "nowplaying",
	aliases("np")
)]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(crate) async fn music_nowplaying(ctx: Context<'_>) -> InteractionResult {
	let guild_id = ctx.guild_only_id();

	let Some((embed, text_channel, last_message)) =
		music::now_playing(ctx.serenity_context(), ctx.data(), guild_id).await
	else {
		ctx.shout(ctx.translate("MUSIC_NOTHING_PLAYING", None))
			.await?;
		return Ok(());
	};

	let reply = ctx
		.send(
			CreateReply::default()
				.embed(embed)
				.components(now_playing_buttons()),
		)
		.await?;

	// Only the message in the music channel is kept up to date
	if ctx.channel_id() == text_channel {
		let message = reply.message().await?;

		if let Some(last_message) = last_message {
			if let Err(error) = text_channel
				.delete_message(ctx.serenity_context(), last_message)
				.await
			{
				tracing::debug!(error = ?error, "old now playing message already gone");
			}
		}

		music::set_now_playing_message(ctx.data(), guild_id, message.id);
	}

	Ok(())
}
