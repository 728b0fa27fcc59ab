//! Constants shared across the bot

use std::time::Duration;

/// Prefix used when a guild did not configure one
pub(crate) const DEFAULT_PREFIX: &str = "!";

/// How long to wait for running tasks to finish before exiting
pub(crate) const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(60);

/// Custom ids of message components
pub(crate) mod events {
	/// Toggle pause on the now playing message
	pub(crate) const MUSIC_PAUSE_BUTTON_INTERACTION: &str = "music.pause";
	/// Vote to skip on the now playing message
	pub(crate) const MUSIC_SKIP_BUTTON_INTERACTION: &str = "music.skip";
}

/// Keys and defaults of per-guild settings
pub(crate) mod settings {
	/// Command prefix
	pub(crate) const PREFIX: &str = "prefix";
	/// Locale of the guild replies
	pub(crate) const LANGUAGE: &str = "language";
	/// Whether the now playing message is refreshed while a song plays
	pub(crate) const MUSIC_UPDATE_NOW_PLAYING: &str = "music.updateNowPlaying";
	/// Refresh period of the now playing message, in milliseconds
	pub(crate) const MUSIC_UPDATE_FREQUENCY: &str = "music.updateFrequency";
	/// How long a song guess game lasts, in seconds
	pub(crate) const SONGGUESS_SECONDS: &str = "songguess.seconds";
	/// Whether the artist name is revealed when a game starts
	pub(crate) const SONGGUESS_SHOW_ARTIST_NAME: &str = "songguess.showArtistName";
	/// Refuse to start a game while the bot is already in a voice channel
	pub(crate) const SONGGUESS_DISALLOW_REGUESS: &str = "songguess.disallowReguess";

	/// Values used when neither the guild nor the global settings define the key
	pub(crate) const DEFAULTS: &[(&str, &str)] = &[
		(PREFIX, super::DEFAULT_PREFIX),
		(MUSIC_UPDATE_NOW_PLAYING, "true"),
		(MUSIC_UPDATE_FREQUENCY, "10000"),
		(SONGGUESS_SECONDS, "120"),
		(SONGGUESS_SHOW_ARTIST_NAME, "false"),
		(SONGGUESS_DISALLOW_REGUESS, "false"),
	];
}

/// Music playback tuning
pub(crate) mod music {
	use std::time::Duration;

	/// Scheme prepended to plain text searches
	pub(crate) const SEARCH_PREFIX: &str = "ytsearch:";
	/// Songs this short or shorter are refused
	pub(crate) const MIN_SONG_LENGTH: Duration = Duration::from_millis(1000);
	/// Songs this long or longer get an inactivity check
	pub(crate) const LONG_SONG_LENGTH: Duration = Duration::from_secs(60 * 60);
	/// Period of the inactivity check
	pub(crate) const INACTIVITY_CHECK_PERIOD: Duration = Duration::from_secs(30 * 60);
	/// The now playing message is edited in place while it is among this many latest messages
	pub(crate) const NOW_PLAYING_EDIT_WINDOW: u8 = 15;
	/// Cells of the now playing progress bar
	pub(crate) const PROGRESS_BAR_WIDTH: usize = 25;
	/// Longest title shown in the "Next" footer
	pub(crate) const NEXT_TITLE_MAX_LENGTH: usize = 50;
	/// Most tracks taken from a single playlist
	pub(crate) const PLAYLIST_LIMIT: usize = 100;
	/// Colour of the now playing embed
	pub(crate) const EMBED_COLOUR: u32 = 0xFF_00_00;
}

/// Image filter client tuning
pub(crate) mod images {
	use std::time::Duration;

	/// How long to wait for a worker to answer
	pub(crate) const FILTER_TIMEOUT: Duration = Duration::from_secs(60);
	/// How many recent messages are searched for an image
	pub(crate) const RECENT_MESSAGES_SEARCHED: u8 = 25;
}

/// Subscription polling
pub(crate) mod subscriptions {
	use std::time::Duration;

	/// Period between two checks of every subscription
	pub(crate) const POLL_PERIOD: Duration = Duration::from_secs(5 * 60);
}

/// Reminder delivery
pub(crate) mod reminders {
	use std::time::Duration;

	/// Period between two checks for due reminders
	pub(crate) const POLL_PERIOD: Duration = Duration::from_secs(15);
	/// Furthest a reminder can be set in the future
	pub(crate) const MAX_DELAY: Duration = Duration::from_secs(5 * 365 * 24 * 60 * 60);
}

/// Bot limits
pub(crate) mod limits {
	/// Longest meme name
	pub(crate) const MAX_MEME_NAME_LENGTH: usize = 64;
	/// Most subscriptions in a single channel
	pub(crate) const MAX_SUBSCRIPTIONS_PER_CHANNEL: i64 = 10;
	/// Per user cooldown between two invocations of a rate limited command, in seconds
	pub(crate) const DEFAULT_COOLDOWN_SECONDS: u64 = 3;
}

/// External urls
pub(crate) mod urls {
	/// Where users vote for the bot, `{}` is replaced by the bot id
	pub(crate) const VOTE_URL: &str = "https://top.gg/bot/{}/vote";
	/// Base of the reddit json api
	pub(crate) const REDDIT_JSON_API: &str = "https://www.reddit.com";
	/// Icon shown in the footer of youtube songs
	pub(crate) const YOUTUBE_ICON: &str = "https://i.imgur.com/8iyBEbO.png";
}
