//! The guess the song game: song list, answer matching and running games

use crate::{
	constants::settings::{SONGGUESS_SECONDS, SONGGUESS_SHOW_ARTIST_NAME},
	database::{models::NewSongGuess, prelude::*},
	states::{Data, InteractionError, InteractionResult},
};
use fluent::fluent_args;
use futures::StreamExt;
use poise::{
	async_trait,
	serenity_prelude::{self as serenity, ChannelId, GuildId, Mentionable, MessageCollector},
};
use rand::seq::SliceRandom;
use serde::Deserialize;
use songbird::{
	error::JoinError, input::File, Event, EventContext, EventHandler as VoiceEventHandler,
	TrackEvent,
};
use std::{
	collections::HashMap,
	sync::{
		atomic::{AtomicUsize, Ordering},
		Arc, Mutex, PoisonError, RwLock,
	},
	time::{Duration, Instant},
};
use tokio::sync::Notify;

/// Name of the task registered while a game runs
pub(crate) const SONGGUESS_TASK: &str = "songguess";

/// Fallback length of a game
const DEFAULT_GAME_LENGTH: Duration = Duration::from_secs(120);

/// An entry of the song list
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct Song {
	/// Audio file, relative to the song directory
	pub(crate) path: String,
	/// The artist
	pub(crate) name: String,
	/// The song title
	pub(crate) title: String,
}

/// Strip a text down to lowercase word characters, dropping the first bracketed part
pub(crate) fn normalize(text: &str) -> String {
	let opening = text.find(['(', '[']);
	let closing = text.rfind([')', ']']);

	let text = match (opening, closing) {
		(Some(opening), Some(closing)) if opening < closing => {
			format!("{}{}", &text[..opening], &text[closing + 1..])
		}
		_ => text.to_owned(),
	};

	text.chars()
		.filter(|char| char.is_alphanumeric() || *char == '_')
		.flat_map(char::to_lowercase)
		.collect()
}

/// The part of a title before a `ft.`, `feat.` or `featuring` word
fn without_featured_artists(title: &str) -> &str {
	let mut start = 0;

	for word in title.split(' ') {
		let marker = word.trim_start_matches(['(', '[']).to_lowercase();
		if matches!(marker.as_str(), "ft" | "ft." | "feat" | "feat." | "featuring") {
			return &title[..start];
		}

		start += word.len() + 1;
	}

	title
}

/// What a guess is worth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
	/// The title was found
	Correct,
	/// Only the artist was found
	Artist,
	/// Nothing was found
	Wrong,
}

/// The expected answers of a song
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Answer {
	/// Normalized title, cut before any featured artist
	title: String,
	/// Normalized artist
	artist: String,
}

impl Answer {
	/// Build the answers of a song
	pub(crate) fn of(song: &Song) -> Self {
		Self {
			title: normalize(without_featured_artists(&song.title)),
			artist: normalize(&song.name),
		}
	}

	/// Whether `guess` contains `answer`, or is a large enough part of it
	fn matches(answer: &str, guess: &str) -> bool {
		if answer.is_empty() || guess.is_empty() {
			return false;
		}

		let long_enough = guess.chars().count() * 3 >= answer.chars().count();

		guess.contains(answer) || (long_enough && answer.contains(guess))
	}

	/// Judge a raw chat message
	pub(crate) fn judge(&self, message: &str) -> Verdict {
		let guess = normalize(message);

		if Self::matches(&self.title, &guess) {
			Verdict::Correct
		} else if Self::matches(&self.artist, &guess) {
			Verdict::Artist
		} else {
			Verdict::Wrong
		}
	}
}

/// A game in progress
#[derive(Debug, Clone, Copy)]
pub(crate) struct RunningGame {
	/// The voice channel the song plays in
	pub(crate) voice_channel: ChannelId,
}

/// The song list and the running games
#[derive(Debug, Default)]
pub(crate) struct SongGuess {
	/// Shuffled songs
	songs: RwLock<Vec<Song>>,
	/// Index of the next song
	counter: AtomicUsize,
	/// Games by guild
	games: Mutex<HashMap<GuildId, RunningGame>>,
}

impl SongGuess {
	/// Fetch and shuffle the song list
	#[tracing::instrument(skip(self, http))]
	pub(crate) async fn load(&self, http: &reqwest::Client, url: &str) -> reqwest::Result<usize> {
		let mut songs = http
			.get(url)
			.send()
			.await?
			.error_for_status()?
			.json::<Vec<Song>>()
			.await?;

		songs.shuffle(&mut rand::thread_rng());
		let count = songs.len();

		*self.songs.write().unwrap_or_else(PoisonError::into_inner) = songs;
		tracing::info!(count, "loaded song list");

		Ok(count)
	}

	/// Whether the song list is empty, which disables the game
	pub(crate) fn is_limited(&self) -> bool {
		self.songs
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.is_empty()
	}

	/// The next song, cycling through the list
	fn next_song(&self) -> Option<Song> {
		let songs = self.songs.read().unwrap_or_else(PoisonError::into_inner);

		if songs.is_empty() {
			return None;
		}

		let index = self.counter.fetch_add(1, Ordering::Relaxed) % songs.len();
		songs.get(index).cloned()
	}

	/// The game running in the guild, if any
	pub(crate) fn running(&self, guild_id: GuildId) -> Option<RunningGame> {
		self.games
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.get(&guild_id)
			.copied()
	}

	/// Register a game and pick its song, `None` if the guild already plays or there are no songs
	fn begin(&self, guild_id: GuildId, voice_channel: ChannelId) -> Option<Song> {
		let mut games = self.games.lock().unwrap_or_else(PoisonError::into_inner);

		if games.contains_key(&guild_id) {
			return None;
		}

		let song = self.next_song()?;
		games.insert(guild_id, RunningGame { voice_channel });

		Some(song)
	}

	/// Forget the game of the guild
	fn finish(&self, guild_id: GuildId) {
		self.games
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.remove(&guild_id);
	}
}

/// Wakes the game when the song file is over
struct SongEnded(Arc<Notify>);

#[async_trait]
impl VoiceEventHandler for SongEnded {
	async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
		self.0.notify_one();
		None
	}
}

/// Play a song in the voice channel and collect guesses in the text channel until someone wins
///
/// Returns `false` when a game was already running in the guild.
#[tracing::instrument(skip(discord, data))]
pub(crate) async fn play(
	discord: &serenity::Context,
	data: &Data,
	guild_id: GuildId,
	text_channel: ChannelId,
	voice_channel: ChannelId,
) -> Result<bool, InteractionError> {
	let Some(song) = data.songguess.begin(guild_id, voice_channel) else {
		return Ok(false);
	};

	data.tasks.start(SONGGUESS_TASK, guild_id.get());
	let result = run_game(discord, data, guild_id, text_channel, voice_channel, &song).await;

	match data.songbird.remove(guild_id).await {
		Ok(()) | Err(JoinError::NoCall) => {}
		Err(error) => tracing::warn!(error = ?error, "could not leave the voice channel"),
	}
	data.songguess.finish(guild_id);
	data.tasks.end(SONGGUESS_TASK, guild_id.get());

	result.map(|()| true)
}

/// Body of [`play`], the caller cleans up
async fn run_game(
	discord: &serenity::Context,
	data: &Data,
	guild_id: GuildId,
	text_channel: ChannelId,
	voice_channel: ChannelId,
	song: &Song,
) -> InteractionResult {
	let display = format!("{} - {}", song.name, song.title);
	let answer = Answer::of(song);
	tracing::debug!(answer = %answer.title, "picked song");

	let length = data
		.settings
		.get_u64(Some(guild_id), SONGGUESS_SECONDS)
		.map_or(DEFAULT_GAME_LENGTH, Duration::from_secs);

	let call = data.songbird.join(guild_id, voice_channel).await?;

	let start_key = if data
		.settings
		.get_bool(Some(guild_id), SONGGUESS_SHOW_ARTIST_NAME)
	{
		"SONGGUESS_START_ARTIST"
	} else {
		"SONGGUESS_START"
	};
	let content = data.translate_for_guild(
		Some(guild_id),
		start_key,
		Some(fluent_args!["minutes" => length.as_secs() / 60, "artist" => song.name.as_str()]),
	);
	text_channel.say(discord, content).await?;

	let ended = Arc::new(Notify::new());
	let path = data.config.song_directory.join(&song.path);
	let handle = call.lock().await.play_only_input(File::new(path).into());
	for event in [TrackEvent::End, TrackEvent::Error] {
		handle.add_event(Event::Track(event), SongEnded(Arc::clone(&ended)))?;
	}

	let started = Instant::now();
	let guesses = MessageCollector::new(discord)
		.channel_id(text_channel)
		.filter(|message| !message.author.bot)
		.timeout(length)
		.stream();
	tokio::pin!(guesses);

	loop {
		let message = tokio::select! {
			message = guesses.next() => message,
			() = ended.notified() => None,
		};

		// The song ended or the collector timed out
		let Some(message) = message else {
			let content = data.translate_for_guild(
				Some(guild_id),
				"SONGGUESS_OVER",
				Some(fluent_args!["title" => display.as_str()]),
			);
			text_channel.say(discord, content).await?;
			return Ok(());
		};

		let verdict = answer.judge(&message.content);

		NewSongGuess {
			user_id: message.author.id.get(),
			channel_id: text_channel.get(),
			server_id: guild_id.get(),
			guess: &message.content,
			song: &display,
			correct: verdict == Verdict::Correct,
			elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
		}
		.insert()
		.execute(&mut data.database.get().await?)
		.await?;

		match verdict {
			Verdict::Correct => {
				let content = data.translate_for_guild(
					Some(guild_id),
					"SONGGUESS_WIN",
					Some(fluent_args![
						"user" => message.author.mention().to_string(),
						"title" => display.as_str()
					]),
				);
				text_channel.say(discord, content).await?;
				return Ok(());
			}
			Verdict::Artist => {
				let content = data.translate_for_guild(
					Some(guild_id),
					"SONGGUESS_ARTIST",
					Some(fluent_args![
						"user" => message.author.mention().to_string(),
						"artist" => song.name.as_str()
					]),
				);
				text_channel.say(discord, content).await?;
			}
			Verdict::Wrong => {}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn song(name: &str, title: &str) -> Song {
		Song {
			path: "a/b.mp3".into(),
			name: name.into(),
			title: title.into(),
		}
	}

	#[test]
	fn normalization() {
		assert_eq!(normalize("Don't Stop Me Now"), "dontstopmenow");
		assert_eq!(normalize("Bohemian Rhapsody (Remastered 2011)"), "bohemianrhapsody");
		assert_eq!(normalize("[Live] Intro"), "intro");
		assert_eq!(normalize("Ça Plane Pour Moi!"), "çaplanepourmoi");
		assert_eq!(normalize("(...)"), "");
	}

	#[test]
	fn titles_are_cut_at_featured_artists() {
		let answer = Answer::of(&song("Calvin Harris", "This Is What You Came For ft. Rihanna"));
		assert_eq!(answer.title, "thisiswhatyoucamefor");
		assert_eq!(answer.artist, "calvinharris");

		let answer = Answer::of(&song("Evanescence", "Left Outside Alone"));
		assert_eq!(answer.title, "leftoutsidealone");

		let answer = Answer::of(&song("Gorillaz", "Feel Good Inc FEAT. De La Soul"));
		assert_eq!(answer.title, "feelgoodinc");

		let answer = Answer::of(&song("Daft Punk", "Get Lucky [feat. Pharrell] Radio Edit"));
		assert_eq!(answer.title, "getlucky");
	}

	#[test]
	fn guesses() {
		let answer = Answer::of(&song("Queen", "Bohemian Rhapsody (Remastered)"));

		assert_eq!(answer.judge("is it Bohemian Rhapsody?"), Verdict::Correct);
		assert_eq!(answer.judge("bohemian"), Verdict::Correct);
		assert_eq!(answer.judge("bo"), Verdict::Wrong);
		assert_eq!(answer.judge("QUEEN"), Verdict::Artist);
		assert_eq!(answer.judge("no idea"), Verdict::Wrong);
		assert_eq!(answer.judge("?!"), Verdict::Wrong);
	}

	#[test]
	fn games_are_one_per_guild_and_cycle_songs() {
		let songguess = SongGuess::default();
		let guild = GuildId::new(1);
		let channel = ChannelId::new(2);

		assert!(songguess.is_limited());
		assert_eq!(songguess.begin(guild, channel), None);

		*songguess.songs.write().expect("lock") = vec![song("A", "One"), song("B", "Two")];
		assert!(!songguess.is_limited());

		assert_eq!(songguess.begin(guild, channel), Some(song("A", "One")));
		assert_eq!(songguess.begin(guild, channel), None);
		assert_eq!(
			songguess.running(guild).map(|game| game.voice_channel),
			Some(channel)
		);

		songguess.finish(guild);
		assert_eq!(songguess.begin(guild, channel), Some(song("B", "Two")));
		songguess.finish(guild);
		assert_eq!(songguess.begin(guild, channel), Some(song("A", "One")));
	}
}
