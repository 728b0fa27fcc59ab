//! The now playing message

use super::listener::QueuedTrack;
use crate::constants::{
	events::{MUSIC_PAUSE_BUTTON_INTERACTION, MUSIC_SKIP_BUTTON_INTERACTION},
	music::{EMBED_COLOUR, NEXT_TITLE_MAX_LENGTH, PROGRESS_BAR_WIDTH},
	urls::YOUTUBE_ICON,
};
use poise::serenity_prelude::{
	ButtonStyle, CreateActionRow, CreateButton, CreateEmbed, CreateEmbedAuthor, CreateEmbedFooter,
};
use std::time::Duration;

/// What the now playing embed shows
#[derive(Debug)]
pub(crate) struct NowPlaying<'a> {
	/// The playing song
	pub(crate) track: &'a QueuedTrack,
	/// Title of the following song
	pub(crate) next: Option<&'a str>,
	/// Name of the voice channel
	pub(crate) voice_channel: &'a str,
	/// Whether playback is paused
	pub(crate) paused: bool,
	/// Position in the song
	pub(crate) elapsed: Duration,
}

/// `m:ss`, or `h:mm:ss` past an hour
pub(crate) fn short_duration(duration: Duration) -> String {
	let seconds = duration.as_secs();
	let (hours, minutes, seconds) = (seconds / 3600, seconds / 60 % 60, seconds % 60);

	if hours > 0 {
		format!("{hours}:{minutes:02}:{seconds:02}")
	} else {
		format!("{minutes}:{seconds:02}")
	}
}

/// Human readable duration, e.g. `1 hour, 2 minutes and 3 seconds`
pub(crate) fn pretty_duration(duration: Duration) -> String {
	let seconds = duration.as_secs();
	let units = [
		(seconds / 86400, "day"),
		(seconds / 3600 % 24, "hour"),
		(seconds / 60 % 60, "minute"),
		(seconds % 60, "second"),
	];

	let parts = units
		.iter()
		.filter(|(count, _)| *count > 0)
		.map(|(count, unit)| {
			if *count == 1 {
				format!("{count} {unit}")
			} else {
				format!("{count} {unit}s")
			}
		})
		.collect::<Vec<_>>();

	match parts.as_slice() {
		[] => "0 seconds".into(),
		[only] => only.clone(),
		[rest @ .., last] => format!("{} and {}", rest.join(", "), last),
	}
}

/// A bar of `width` cells filled proportionally to `elapsed`
pub(crate) fn progress_bar(elapsed: Duration, total: Duration, width: usize) -> String {
	let filled = if total.is_zero() {
		0
	} else {
		let ratio = (elapsed.as_secs_f64() / total.as_secs_f64()).clamp(0.0, 1.0);

		#[allow(
			clippy::cast_possible_truncation,
			clippy::cast_sign_loss,
			clippy::cast_precision_loss
		)]
		let filled = (ratio * width as f64).round() as usize;
		filled
	};

	format!("`{}{}`", "█".repeat(filled), "░".repeat(width - filled))
}

/// Keep titles under `max` characters, ending cut titles with `...`
pub(crate) fn truncate_title(title: &str, max: usize) -> String {
	if title.chars().count() > max {
		let cut = title.chars().take(max.saturating_sub(3)).collect::<String>();
		format!("{cut}...")
	} else {
		title.to_owned()
	}
}

/// Whether the uri points to `YouTube`
fn is_youtube(uri: &str) -> bool {
	uri.contains("youtu")
}

/// The `Length` field value
fn length_field(track: &QueuedTrack, elapsed: Duration) -> String {
	track.length.map_or_else(
		|| format!("{} elapsed.", pretty_duration(elapsed)),
		|length| {
			format!(
				"{}`{}`/`{}`",
				progress_bar(elapsed, length, PROGRESS_BAR_WIDTH),
				short_duration(elapsed),
				short_duration(length)
			)
		},
	)
}

/// Build the now playing embed
pub(crate) fn now_playing_embed(now_playing: &NowPlaying<'_>) -> CreateEmbed {
	let track = now_playing.track;
	// Escaped so that clients keep the plain glyph
	let state = if now_playing.paused { "\\⏸" } else { "\\▶" };

	let mut footer = if is_youtube(&track.uri) {
		"YouTube".to_owned()
	} else {
		String::new()
	};
	if let Some(next) = now_playing.next {
		footer += &format!(" | Next: {}", truncate_title(next, NEXT_TITLE_MAX_LENGTH));
	}

	let mut embed = CreateEmbed::new()
		.colour(EMBED_COLOUR)
		.title(format!("{state}{}", track.title))
		.author(CreateEmbedAuthor::new(format!(
			"🔈 {}",
			now_playing.voice_channel
		)))
		.url(&track.uri)
		.description(&track.author)
		.field("Length", length_field(track, now_playing.elapsed), false);

	if !footer.is_empty() {
		let mut create_footer = CreateEmbedFooter::new(footer);
		if is_youtube(&track.uri) {
			create_footer = create_footer.icon_url(YOUTUBE_ICON);
		}
		embed = embed.footer(create_footer);
	}

	embed
}

/// The pause and skip buttons under the now playing message
pub(crate) fn now_playing_buttons() -> Vec<CreateActionRow> {
	vec![CreateActionRow::Buttons(vec![
		CreateButton::new(MUSIC_PAUSE_BUTTON_INTERACTION)
			.emoji('⏯')
			.style(ButtonStyle::Secondary),
		CreateButton::new(MUSIC_SKIP_BUTTON_INTERACTION)
			.emoji('⏭')
			.style(ButtonStyle::Secondary),
	])]
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::music::listener::tests::track;

	#[test]
	fn durations() {
		assert_eq!(short_duration(Duration::from_secs(65)), "1:05");
		assert_eq!(short_duration(Duration::from_secs(3725)), "1:02:05");
		assert_eq!(pretty_duration(Duration::ZERO), "0 seconds");
		assert_eq!(pretty_duration(Duration::from_secs(61)), "1 minute and 1 second");
		assert_eq!(
			pretty_duration(Duration::from_secs(3600 + 120 + 3)),
			"1 hour, 2 minutes and 3 seconds"
		);
	}

	#[test]
	fn progress_bar_cells() {
		let bar = progress_bar(Duration::from_secs(30), Duration::from_secs(60), 10);
		assert_eq!(bar, "`█████░░░░░`");

		let overflow = progress_bar(Duration::from_secs(90), Duration::from_secs(60), 4);
		assert_eq!(overflow, "`████`");

		let empty = progress_bar(Duration::from_secs(1), Duration::ZERO, 3);
		assert_eq!(empty, "`░░░`");
	}

	#[test]
	fn long_titles_are_cut() {
		let title = "a".repeat(60);
		let cut = truncate_title(&title, 50);

		assert_eq!(cut.chars().count(), 50);
		assert!(cut.ends_with("..."));
		assert_eq!(truncate_title("short", 50), "short");
	}

	#[test]
	fn embed_contents() {
		let playing = track("song", 1, Some(120_000));
		let embed = now_playing_embed(&NowPlaying {
			track: &playing,
			next: Some("following"),
			voice_channel: "Lounge",
			paused: true,
			elapsed: Duration::from_secs(60),
		});
		let json = serde_json::to_value(&embed).expect("embed serializes");

		assert_eq!(json["title"], "\\⏸song");
		assert_eq!(json["author"]["name"], "🔈 Lounge");
		assert_eq!(json["footer"]["text"], "YouTube | Next: following");
		assert_eq!(json["fields"][0]["name"], "Length");
		assert!(json["fields"][0]["value"]
			.as_str()
			.is_some_and(|value| value.ends_with("`1:00`/`2:00`")));
	}

	#[test]
	fn streams_show_elapsed_time() {
		let mut stream = track("radio", 1, None);
		stream.uri = "https://radio.example/stream".into();
		let embed = now_playing_embed(&NowPlaying {
			track: &stream,
			next: None,
			voice_channel: "Lounge",
			paused: false,
			elapsed: Duration::from_secs(90),
		});
		let json = serde_json::to_value(&embed).expect("embed serializes");

		assert_eq!(json["title"], "\\▶radio");
		assert_eq!(json["fields"][0]["value"], "1 minute and 30 seconds elapsed.");
		assert!(json.get("footer").map_or(true, serde_json::Value::is_null));
	}

	#[test]
	fn next_song_without_youtube_keeps_the_separator() {
		let mut playing = track("song", 1, Some(120_000));
		playing.uri = "https://soundcloud.com/someone/song".into();
		let embed = now_playing_embed(&NowPlaying {
			track: &playing,
			next: Some("following"),
			voice_channel: "Lounge",
			paused: false,
			elapsed: Duration::ZERO,
		});
		let json = serde_json::to_value(&embed).expect("embed serializes");

		assert_eq!(json["footer"]["text"], " | Next: following");
		assert!(json["footer"]["icon_url"].is_null());
	}
}
