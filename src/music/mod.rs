//! Music playback, one [`Listener`] per guild

use crate::{
	constants::{
		music::{
			INACTIVITY_CHECK_PERIOD, LONG_SONG_LENGTH, MIN_SONG_LENGTH, NOW_PLAYING_EDIT_WINDOW,
		},
		settings::{MUSIC_UPDATE_FREQUENCY, MUSIC_UPDATE_NOW_PLAYING},
	},
	database::models::{MusicQueue, NewQueuedSong},
	states::{ArcData, Data, InteractionError},
	voice,
};
use fluent::fluent_args;
use poise::{
	async_trait,
	serenity_prelude::{
		self as serenity, ChannelId, CreateEmbed, CreateMessage, EditMessage, GetMessages, GuildId,
		MessageId, UserId,
	},
};
use songbird::{
	error::JoinError,
	tracks::PlayMode,
	Event, EventContext, EventHandler as VoiceEventHandler, TrackEvent,
};
use std::{
	collections::HashMap,
	sync::{Arc, Mutex, MutexGuard, PoisonError},
	time::Duration,
};
use tokio::task::JoinHandle;

pub(crate) mod embed;
mod listener;
pub(crate) mod source;

use listener::Listener;
pub(crate) use listener::{QueuedTrack, SkipVote};
use source::LoadResult;

/// Name of the task registered while a guild listens to music
pub(crate) const MUSIC_TASK: &str = "music";

/// Fallback refresh period of the now playing message
const DEFAULT_UPDATE_FREQUENCY: Duration = Duration::from_secs(10);
/// Fastest allowed refresh of the now playing message
const MIN_UPDATE_FREQUENCY: Duration = Duration::from_secs(2);

/// The listeners of every guild
#[derive(Debug, Default)]
pub(crate) struct MusicManager {
	/// Listeners by guild
	listeners: Mutex<HashMap<GuildId, Listener>>,
}

impl MusicManager {
	/// Lock the listeners
	fn lock(&self) -> MutexGuard<'_, HashMap<GuildId, Listener>> {
		self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Whether the guild has a listener
	pub(crate) fn contains(&self, guild_id: GuildId) -> bool {
		self.lock().contains_key(&guild_id)
	}

	/// Number of guilds listening
	pub(crate) fn count(&self) -> usize {
		self.lock().len()
	}

	/// Run `f` on the listener of the guild, if any
	pub(crate) fn with_listener<R>(
		&self,
		guild_id: GuildId,
		f: impl FnOnce(&mut Listener) -> R,
	) -> Option<R> {
		self.lock().get_mut(&guild_id).map(f)
	}

	/// Add a listener, returns `false` if the guild already had one
	fn insert(&self, guild_id: GuildId, listener: Listener) -> bool {
		let mut listeners = self.lock();

		if listeners.contains_key(&guild_id) {
			return false;
		}

		listeners.insert(guild_id, listener);
		true
	}

	/// Take the listener out
	fn remove(&self, guild_id: GuildId) -> Option<Listener> {
		self.lock().remove(&guild_id)
	}

	/// Attach the now playing refresh task if the song is still playing
	fn attach_edit_interval(&self, guild_id: GuildId, generation: u64, task: JoinHandle<()>) {
		match self.lock().get_mut(&guild_id) {
			Some(listener) if listener.is_current(generation) => {
				listener.stop_edit_interval();
				listener.edit_interval = Some(task);
			}
			_ => task.abort(),
		}
	}

	/// Attach the inactivity check task if the song is still playing
	fn attach_check_interval(&self, guild_id: GuildId, generation: u64, task: JoinHandle<()>) {
		match self.lock().get_mut(&guild_id) {
			Some(listener) if listener.is_current(generation) => {
				listener.stop_check_interval();
				listener.check_interval = Some(task);
			}
			_ => task.abort(),
		}
	}
}

/// What was added to a queue
#[derive(Debug)]
pub(crate) enum Enqueued {
	/// A single track
	Track(QueuedTrack),
	/// A whole playlist
	Playlist {
		/// Number of tracks
		count: usize,
		/// Playlist title
		name: String,
		/// Sum of the track lengths
		length: Duration,
	},
}

/// Outcome of a queue clear
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClearQueue {
	/// No song is playing
	NothingPlaying,
	/// The queue was already empty
	Empty,
	/// Other users are listening
	NotAlone,
	/// This many songs were removed
	Cleared(usize),
}

/// Milliseconds of a duration saturated to `u64`
fn millis(duration: Duration) -> u64 {
	u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Join a voice channel and create the listener of the guild
#[tracing::instrument(skip(data))]
pub(crate) async fn connect(
	data: &Data,
	guild_id: GuildId,
	text_channel: ChannelId,
	voice_channel: ChannelId,
) -> Result<(), InteractionError> {
	if data.music.contains(guild_id) {
		return Ok(());
	}

	data.songbird.join(guild_id, voice_channel).await?;

	if data
		.music
		.insert(guild_id, Listener::new(text_channel, voice_channel))
	{
		data.tasks.start(MUSIC_TASK, guild_id.get());
	}

	Ok(())
}

/// Resolve a search or link and queue the result, starting playback when idle
///
/// Returns `None` when nothing could be loaded.
#[tracing::instrument(skip(discord, data))]
pub(crate) async fn add_to_queue(
	discord: &serenity::Context,
	data: &ArcData,
	guild_id: GuildId,
	search: &str,
	requester: UserId,
	next: bool,
) -> Result<Option<Enqueued>, InteractionError> {
	let identifier = source::to_identifier(search);

	let (tracks, summary) = match source::load(&data.http, &identifier, requester).await {
		LoadResult::Track(track) | LoadResult::Search(track) => {
			(vec![track.clone()], Enqueued::Track(track))
		}
		LoadResult::Playlist { name, tracks } => {
			let summary = Enqueued::Playlist {
				count: tracks.len(),
				name,
				length: tracks.iter().filter_map(|track| track.length).sum(),
			};

			(tracks, summary)
		}
		LoadResult::Empty => return Ok(None),
		LoadResult::Failed(error) => {
			tracing::warn!(error = %error, "could not load songs");
			return Ok(None);
		}
	};

	let rows = tracks
		.iter()
		.map(|track| NewQueuedSong {
			server_id: guild_id.get(),
			requester_id: track.requester.get(),
			title: &track.title,
			uri: &track.uri,
			length_ms: track.length.map(millis),
		})
		.collect::<Vec<_>>();

	// Idle listeners claim their first song in the same lock as the enqueue
	let Some(claimed) = data.music.with_listener(guild_id, |listener| {
		listener.enqueue_and_claim(tracks.clone(), next)
	}) else {
		tracing::warn!(guild_id = guild_id.get(), "queue is missing");
		return Ok(None);
	};

	mirror_queue(data, guild_id, &rows).await;

	if let Some(claimed) = claimed {
		if let Err(error) = start_claimed(discord, data, guild_id, Some(claimed)).await {
			tracing::error!(guild_id = guild_id.get(), error = ?error, "could not play the next song");
		}
	}

	Ok(Some(summary))
}

/// Write queued songs to the database mirror
///
/// The listener may have been torn down meanwhile, its mirror is cleared again then.
async fn mirror_queue(data: &Data, guild_id: GuildId, rows: &[NewQueuedSong<'_>]) {
	let mirrored = async {
		let mut connection = data.database.get().await?;
		MusicQueue::push(&mut connection, rows).await?;

		if !data.music.contains(guild_id) {
			MusicQueue::clear(&mut connection, guild_id).await?;
		}

		Ok::<_, InteractionError>(())
	};

	if let Err(error) = mirrored.await {
		tracing::warn!(guild_id = guild_id.get(), error = ?error, "could not mirror the queue");
	}
}

/// Play the head of the queue, or tear the listener down when there is nothing left to do
pub(crate) async fn play_next_in_queue(
	discord: &serenity::Context,
	data: &ArcData,
	guild_id: GuildId,
) {
	if let Err(error) = advance(discord, data, guild_id).await {
		tracing::error!(guild_id = guild_id.get(), error = ?error, "could not play the next song");
	}
}

/// Implementation of [`play_next_in_queue`]
async fn advance(
	discord: &serenity::Context,
	data: &ArcData,
	guild_id: GuildId,
) -> Result<(), InteractionError> {
	let Some(next) = data.music.with_listener(guild_id, Listener::advance) else {
		tracing::warn!(guild_id = guild_id.get(), "queue is missing");
		return Ok(());
	};

	start_claimed(discord, data, guild_id, next).await
}

/// Play a song already taken out of the queue, moving on while songs are too short
async fn start_claimed(
	discord: &serenity::Context,
	data: &ArcData,
	guild_id: GuildId,
	mut next: Option<(u64, QueuedTrack)>,
) -> Result<(), InteractionError> {
	loop {
		let Some((text_channel, voice_channel)) = data.music.with_listener(guild_id, |listener| {
			(listener.text_channel, listener.voice_channel)
		}) else {
			tracing::warn!(guild_id = guild_id.get(), "queue is missing");
			return Ok(());
		};

		let alone = voice::bot_alone_in(discord, guild_id, voice_channel);

		let Some((generation, track)) = next.take().filter(|_| !alone) else {
			tracing::info!(guild_id = guild_id.get(), "clearing listener");
			return deconstruct_listener(data, guild_id).await;
		};

		if track.is_too_short(MIN_SONG_LENGTH) {
			text_channel
				.say(
					discord,
					data.translate_for_guild(Some(guild_id), "MUSIC_PLAY_SHORT", None),
				)
				.await?;

			next = data
				.music
				.with_listener(guild_id, Listener::advance)
				.flatten();
			continue;
		}

		play_song(discord, data, guild_id, generation, &track).await?;
		refresh_now_playing(discord, data, guild_id, true).await?;
		start_edit_interval(discord, data, guild_id, generation);

		return Ok(());
	}
}

/// Start a song on the voice connection
#[tracing::instrument(skip(discord, data, track), fields(title = %track.title))]
async fn play_song(
	discord: &serenity::Context,
	data: &ArcData,
	guild_id: GuildId,
	generation: u64,
	track: &QueuedTrack,
) -> Result<(), InteractionError> {
	let Some(call) = data.songbird.get(guild_id) else {
		tracing::warn!(guild_id = guild_id.get(), "not connected to voice anymore");
		return deconstruct_listener(data, guild_id).await;
	};

	let handle = call
		.lock()
		.await
		.play_only_input(source::input(&data.http, track));

	for event in [TrackEvent::End, TrackEvent::Error] {
		handle.add_event(
			Event::Track(event),
			TrackNotifier {
				discord: discord.clone(),
				data: Arc::clone(data),
				guild_id,
				generation,
			},
		)?;
	}

	let channels = data.music.with_listener(guild_id, |listener| {
		if listener.is_current(generation) {
			listener.track = Some(handle.clone());
		}
		listener.stop_check_interval();

		(listener.text_channel, listener.voice_channel)
	});

	if let Some((text_channel, voice_channel)) = channels {
		if track.is_long(LONG_SONG_LENGTH) {
			let task = spawn_inactivity_check(
				discord.clone(),
				Arc::clone(data),
				guild_id,
				text_channel,
				voice_channel,
			);
			data.music.attach_check_interval(guild_id, generation, task);
		}
	}

	tracing::info!(guild_id = guild_id.get(), "song played");

	Ok(())
}

/// Leave the voice channel when only the bot is left, checked periodically
fn spawn_inactivity_check(
	discord: serenity::Context,
	data: ArcData,
	guild_id: GuildId,
	text_channel: ChannelId,
	voice_channel: ChannelId,
) -> JoinHandle<()> {
	tokio::spawn(async move {
		let mut interval = tokio::time::interval(INACTIVITY_CHECK_PERIOD);
		// The first tick completes immediately
		interval.tick().await;

		loop {
			interval.tick().await;

			if !voice::bot_alone_in(&discord, guild_id, voice_channel) {
				continue;
			}

			let content = data.translate_for_guild(Some(guild_id), "MUSIC_PLAY_INACTIVE", None);
			if let Err(error) = text_channel.say(&discord, content).await {
				tracing::warn!(error = ?error, "could not announce inactivity");
			}

			// Aborts this task once the listener is dropped
			if let Err(error) = deconstruct_listener(&data, guild_id).await {
				tracing::error!(error = ?error, "could not leave after inactivity");
			}

			break;
		}
	})
}

/// Refresh the now playing message periodically if the guild wants it
fn start_edit_interval(
	discord: &serenity::Context,
	data: &ArcData,
	guild_id: GuildId,
	generation: u64,
) {
	if !data
		.settings
		.get_bool(Some(guild_id), MUSIC_UPDATE_NOW_PLAYING)
	{
		return;
	}

	let period = data
		.settings
		.get_u64(Some(guild_id), MUSIC_UPDATE_FREQUENCY)
		.map_or(DEFAULT_UPDATE_FREQUENCY, Duration::from_millis)
		.max(MIN_UPDATE_FREQUENCY);

	let task = tokio::spawn({
		let discord = discord.clone();
		let data = Arc::clone(data);

		async move {
			let mut interval = tokio::time::interval(period);
			interval.tick().await;

			loop {
				interval.tick().await;

				if let Err(error) = refresh_now_playing(&discord, &data, guild_id, false).await {
					tracing::warn!(error = ?error, "could not refresh the now playing message");
				}
			}
		}
	});

	data.music.attach_edit_interval(guild_id, generation, task);
}

/// The now playing embed of a guild, with where it was last posted
pub(crate) async fn now_playing(
	discord: &serenity::Context,
	data: &Data,
	guild_id: GuildId,
) -> Option<(CreateEmbed, ChannelId, Option<MessageId>)> {
	let (track, next, text_channel, voice_channel, last_message, handle) = data
		.music
		.with_listener(guild_id, |listener| {
			Some((
				listener.playing.clone()?,
				listener.next_title().map(str::to_owned),
				listener.text_channel,
				listener.voice_channel,
				listener.last_message,
				listener.track.clone(),
			))
		})
		.flatten()?;

	let (paused, elapsed) = match handle {
		Some(handle) => match handle.get_info().await {
			Ok(info) => (matches!(info.playing, PlayMode::Pause), info.position),
			Err(_) => (false, Duration::ZERO),
		},
		None => (false, Duration::ZERO),
	};

	let voice_channel = voice::channel_name(discord, guild_id, voice_channel);
	let embed = embed::now_playing_embed(&embed::NowPlaying {
		track: &track,
		next: next.as_deref(),
		voice_channel: &voice_channel,
		paused,
		elapsed,
	});

	Some((embed, text_channel, last_message))
}

/// Remember the message showing the playing song
pub(crate) fn set_now_playing_message(data: &Data, guild_id: GuildId, message: MessageId) {
	data.music.with_listener(guild_id, |listener| {
		listener.last_message = Some(message);
	});
}

/// Build the now playing embed and post it
///
/// `resend` allows deleting the old message and sending a new one when the old one is buried.
pub(crate) async fn refresh_now_playing(
	discord: &serenity::Context,
	data: &Data,
	guild_id: GuildId,
	resend: bool,
) -> Result<(), InteractionError> {
	let Some((embed, text_channel, last_message)) = now_playing(discord, data, guild_id).await
	else {
		return Ok(());
	};

	if let Some(message) =
		update_or_send_message(discord, text_channel, last_message, embed, resend).await?
	{
		set_now_playing_message(data, guild_id, message);
	}

	Ok(())
}

/// Edit the last message while it is recent, otherwise replace it when `resend`
async fn update_or_send_message(
	discord: &serenity::Context,
	channel: ChannelId,
	last_message: Option<MessageId>,
	embed: CreateEmbed,
	resend: bool,
) -> Result<Option<MessageId>, serenity::Error> {
	if let Some(last_message) = last_message {
		let recent = channel
			.messages(discord, GetMessages::new().limit(NOW_PLAYING_EDIT_WINDOW))
			.await?;

		if recent.iter().any(|message| message.id == last_message) {
			channel
				.edit_message(
					discord,
					last_message,
					EditMessage::new()
						.embed(embed)
						.components(embed::now_playing_buttons()),
				)
				.await?;

			return Ok(Some(last_message));
		}
	}

	if !resend {
		return Ok(None);
	}

	if let Some(last_message) = last_message {
		if let Err(error) = channel.delete_message(discord, last_message).await {
			tracing::debug!(error = ?error, "old now playing message already gone");
		}
	}

	let message = channel
		.send_message(
			discord,
			CreateMessage::new()
				.embed(embed)
				.components(embed::now_playing_buttons()),
		)
		.await?;

	Ok(Some(message.id))
}

/// Leave the voice channel and forget the listener of the guild
#[tracing::instrument(skip(data))]
pub(crate) async fn deconstruct_listener(
	data: &Data,
	guild_id: GuildId,
) -> Result<(), InteractionError> {
	let Some(listener) = data.music.remove(guild_id) else {
		return Ok(());
	};

	tracing::info!(guild_id = guild_id.get(), "deconstructing listener");
	data.tasks.end(MUSIC_TASK, guild_id.get());

	let cleared = async {
		MusicQueue::clear(&mut data.database.get().await?, guild_id).await?;
		Ok::<_, InteractionError>(())
	}
	.await;

	leave_call(data, guild_id).await;

	// Aborts the timers, last since the inactivity check calls this
	drop(listener);

	cleared
}

/// The failure worth reporting when leaving a call, a call that is already gone is fine
fn leave_failure(result: Result<(), JoinError>) -> Option<JoinError> {
	match result {
		Ok(()) | Err(JoinError::NoCall) => None,
		Err(error) => Some(error),
	}
}

/// Disconnect from the voice channel of the guild, failures are only logged
async fn leave_call(data: &Data, guild_id: GuildId) {
	if let Some(error) = leave_failure(data.songbird.remove(guild_id).await) {
		tracing::warn!(guild_id = guild_id.get(), error = ?error, "could not leave the call");
	}
}

/// Stop the playing song, the end event plays the next one
pub(crate) fn skip(data: &Data, guild_id: GuildId) -> Result<bool, InteractionError> {
	let Some(handle) = data
		.music
		.with_listener(guild_id, |listener| listener.track.clone())
		.flatten()
	else {
		return Ok(false);
	};

	handle.stop()?;

	Ok(true)
}

/// Count a skip vote and skip when it passes, `None` when nothing is playing
pub(crate) fn vote_skip(
	discord: &serenity::Context,
	data: &Data,
	guild_id: GuildId,
	user_id: UserId,
) -> Result<Option<SkipVote>, InteractionError> {
	let Some(voice_channel) = data
		.music
		.with_listener(guild_id, |listener| {
			listener.playing.is_some().then_some(listener.voice_channel)
		})
		.flatten()
	else {
		return Ok(None);
	};

	let members = voice::members_in(discord, guild_id, voice_channel).len();
	let vote = data
		.music
		.with_listener(guild_id, |listener| listener.vote_skip(user_id, members));

	if vote == Some(SkipVote::Skip) {
		skip(data, guild_id)?;
	}

	Ok(vote)
}

/// Pause, resume or toggle the playing song, returns whether it is now paused
pub(crate) async fn set_paused(
	data: &Data,
	guild_id: GuildId,
	paused: Option<bool>,
) -> Result<Option<bool>, InteractionError> {
	let Some(handle) = data
		.music
		.with_listener(guild_id, |listener| listener.track.clone())
		.flatten()
	else {
		return Ok(None);
	};

	let paused = match paused {
		Some(paused) => paused,
		None => !matches!(handle.get_info().await?.playing, PlayMode::Pause),
	};

	if paused {
		handle.pause()?;
	} else {
		handle.play()?;
	}

	Ok(Some(paused))
}

/// Empty the queue when the caller is alone with the bot
pub(crate) async fn clear_queue(
	discord: &serenity::Context,
	data: &Data,
	guild_id: GuildId,
) -> Result<ClearQueue, InteractionError> {
	let state = data.music.with_listener(guild_id, |listener| {
		(
			listener.playing.is_some(),
			listener.queue.is_empty(),
			listener.voice_channel,
		)
	});

	let voice_channel = match state {
		None | Some((false, _, _)) => return Ok(ClearQueue::NothingPlaying),
		Some((true, true, _)) => return Ok(ClearQueue::Empty),
		Some((true, false, voice_channel)) => voice_channel,
	};

	if voice::members_in(discord, guild_id, voice_channel).len() > 2 {
		return Ok(ClearQueue::NotAlone);
	}

	let count = data
		.music
		.with_listener(guild_id, Listener::clear_queue)
		.unwrap_or_default();

	MusicQueue::clear(&mut data.database.get().await?, guild_id).await?;

	Ok(ClearQueue::Cleared(count))
}

/// The playing song and the queue of a guild
pub(crate) fn queue_snapshot(
	data: &Data,
	guild_id: GuildId,
) -> Option<(Option<QueuedTrack>, Vec<QueuedTrack>)> {
	data.music.with_listener(guild_id, |listener| {
		(
			listener.playing.clone(),
			listener.queue.iter().cloned().collect(),
		)
	})
}

/// Advances the queue when the song of `generation` ends or fails
struct TrackNotifier {
	/// Discord access for the replies
	discord: serenity::Context,
	/// The bot data
	data: ArcData,
	/// The guild the song plays in
	guild_id: GuildId,
	/// The generation of the song
	generation: u64,
}

#[async_trait]
impl VoiceEventHandler for TrackNotifier {
	async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
		let Some(text_channel) = self
			.data
			.music
			.with_listener(self.guild_id, |listener| {
				listener
					.end_of(self.generation)
					.then_some(listener.text_channel)
			})
			.flatten()
		else {
			tracing::debug!(guild_id = self.guild_id.get(), "ignoring event of a replaced song");
			return None;
		};

		if let EventContext::Track(tracks) = ctx {
			if let Some((state, _)) = tracks.first() {
				if let PlayMode::Errored(error) = &state.playing {
					tracing::warn!(guild_id = self.guild_id.get(), error = %error, "song errored");

					let content = self.data.translate_for_guild(
						Some(self.guild_id),
						"MUSIC_PLAY_ERROR",
						Some(fluent_args!["error" => error.to_string()]),
					);
					if let Err(error) = text_channel.say(&self.discord, content).await {
						tracing::warn!(error = ?error, "could not report the song error");
					}
				}
			}
		}

		tracing::debug!(guild_id = self.guild_id.get(), "song ended");
		play_next_in_queue(&self.discord, &self.data, self.guild_id).await;

		None
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use listener::tests::track;
	use std::thread;

	#[test]
	fn concurrent_enqueues_start_a_single_song() {
		let manager = MusicManager::default();
		let guild_id = GuildId::new(1);
		assert!(manager.insert(
			guild_id,
			Listener::new(ChannelId::new(2), ChannelId::new(3))
		));

		let claims = thread::scope(|scope| {
			let handles = ["first", "second"].map(|title| {
				let manager = &manager;
				scope.spawn(move || {
					manager
						.with_listener(guild_id, |listener| {
							listener.enqueue_and_claim(vec![track(title, 7, None)], false)
						})
						.flatten()
				})
			});

			handles.map(|handle| handle.join().expect("enqueue thread"))
		});

		assert_eq!(claims.iter().filter(|claim| claim.is_some()).count(), 1);
		assert_eq!(
			manager.with_listener(guild_id, |listener| listener.queue.len()),
			Some(1)
		);
	}

	#[test]
	fn leaving_a_call_never_fails_the_teardown() {
		assert!(leave_failure(Ok(())).is_none());
		assert!(leave_failure(Err(JoinError::NoCall)).is_none());
		assert!(matches!(
			leave_failure(Err(JoinError::Dropped)),
			Some(JoinError::Dropped)
		));
	}

	#[test]
	fn missing_listener_claims_nothing() {
		let manager = MusicManager::default();

		let claim = manager.with_listener(GuildId::new(1), |listener| {
			listener.enqueue_and_claim(vec![track("lost", 7, None)], false)
		});

		assert!(claim.is_none());
		assert_eq!(manager.count(), 0);
	}
}
