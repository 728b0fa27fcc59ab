//! Resolve searches and links into playable tracks

use super::listener::QueuedTrack;
use crate::constants::music::{PLAYLIST_LIMIT, SEARCH_PREFIX};
use poise::serenity_prelude::UserId;
use serde::Deserialize;
use songbird::input::{AuxMetadata, Input, YoutubeDl};
use std::time::Duration;
use tokio::process::Command;

/// What a search or a link resolved to
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum LoadResult {
	/// A direct link to a single track
	Track(QueuedTrack),
	/// The best match of a text search
	Search(QueuedTrack),
	/// Every track of a playlist
	Playlist {
		/// Playlist title
		name: String,
		/// The tracks, in playlist order
		tracks: Vec<QueuedTrack>,
	},
	/// Nothing matched
	Empty,
	/// Resolution failed
	Failed(String),
}

/// Prepend the search scheme to anything that is not a link
pub(crate) fn to_identifier(search: &str) -> String {
	let search = search.trim();

	if url::Url::parse(search).is_ok_and(|url| matches!(url.scheme(), "http" | "https")) {
		search.to_owned()
	} else {
		format!("{SEARCH_PREFIX}{search}")
	}
}

/// Info printed by `yt-dlp -J`
#[derive(Debug, Deserialize)]
struct MediaInfo {
	/// `playlist` for playlists
	#[serde(rename = "_type")]
	kind: Option<String>,
	/// Title of the media or playlist
	title: Option<String>,
	/// Uploader name
	uploader: Option<String>,
	/// Channel name
	channel: Option<String>,
	/// Canonical page
	webpage_url: Option<String>,
	/// Page of flat playlist entries
	url: Option<String>,
	/// Length in seconds
	duration: Option<f64>,
	/// Whether this is a live stream
	#[serde(default)]
	is_live: bool,
	/// Playlist entries
	#[serde(default)]
	entries: Vec<MediaInfo>,
}

impl MediaInfo {
	/// Convert to a track, entries without a link are dropped
	fn into_track(self, requester: UserId) -> Option<QueuedTrack> {
		let uri = self.webpage_url.or(self.url)?;
		let length = self
			.duration
			.filter(|duration| !self.is_live && duration.is_finite() && *duration >= 0.0)
			.map(Duration::from_secs_f64);

		Some(QueuedTrack {
			title: self.title.unwrap_or_else(|| uri.clone()),
			author: self.uploader.or(self.channel).unwrap_or_default(),
			uri,
			length,
			requester,
		})
	}
}

/// Interpret the output of `yt-dlp -J`
fn parse_media_info(json: &[u8], requester: UserId) -> LoadResult {
	let info = match serde_json::from_slice::<MediaInfo>(json) {
		Ok(info) => info,
		Err(error) => return LoadResult::Failed(error.to_string()),
	};

	if info.kind.as_deref() == Some("playlist") {
		let tracks = info
			.entries
			.into_iter()
			.take(PLAYLIST_LIMIT)
			.filter_map(|entry| entry.into_track(requester))
			.collect::<Vec<_>>();

		if tracks.is_empty() {
			return LoadResult::Empty;
		}

		return LoadResult::Playlist {
			name: info.title.unwrap_or_default(),
			tracks,
		};
	}

	info.into_track(requester)
		.map_or(LoadResult::Empty, LoadResult::Track)
}

/// Convert search metadata to a track
fn from_metadata(metadata: AuxMetadata, requester: UserId) -> Option<QueuedTrack> {
	let uri = metadata.source_url?;

	Some(QueuedTrack {
		title: metadata.title.unwrap_or_else(|| uri.clone()),
		author: metadata.artist.or(metadata.channel).unwrap_or_default(),
		uri,
		length: metadata.duration,
		requester,
	})
}

/// Resolve an identifier built by [`to_identifier`]
#[tracing::instrument(skip(http))]
pub(crate) async fn load(http: &reqwest::Client, identifier: &str, requester: UserId) -> LoadResult {
	if let Some(query) = identifier.strip_prefix(SEARCH_PREFIX) {
		let mut source = YoutubeDl::new_search(http.clone(), query.to_owned());

		return match source.search(Some(1)).await {
			Ok(results) => results
				.into_iter()
				.next()
				.and_then(|metadata| from_metadata(metadata, requester))
				.map_or(LoadResult::Empty, LoadResult::Search),
			Err(error) => LoadResult::Failed(error.to_string()),
		};
	}

	let output = Command::new("yt-dlp")
		.args(["-J", "--flat-playlist", "--no-warnings", "--playlist-end"])
		.arg(PLAYLIST_LIMIT.to_string())
		.arg(identifier)
		.output()
		.await;

	match output {
		Ok(output) if output.status.success() => parse_media_info(&output.stdout, requester),
		Ok(output) => {
			let stderr = String::from_utf8_lossy(&output.stderr);
			tracing::warn!(stderr = %stderr, "yt-dlp could not resolve the link");
			LoadResult::Failed(stderr.trim().to_owned())
		}
		Err(error) => LoadResult::Failed(error.to_string()),
	}
}

/// The audio source of a track
pub(crate) fn input(http: &reqwest::Client, track: &QueuedTrack) -> Input {
	YoutubeDl::new(http.clone(), track.uri.clone()).into()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn requester() -> UserId {
		UserId::new(5)
	}

	#[test]
	fn plain_text_becomes_a_search() {
		assert_eq!(to_identifier("never gonna"), "ytsearch:never gonna");
		assert_eq!(
			to_identifier(" https://youtu.be/dQw4w9WgXcQ "),
			"https://youtu.be/dQw4w9WgXcQ"
		);
		assert_eq!(to_identifier("ftp://files"), "ytsearch:ftp://files");
	}

	#[test]
	fn single_video() {
		let json = br#"{
			"_type": "video",
			"title": "Song",
			"uploader": "Band",
			"webpage_url": "https://www.youtube.com/watch?v=abc",
			"duration": 212.0
		}"#;

		assert_eq!(
			parse_media_info(json, requester()),
			LoadResult::Track(QueuedTrack {
				title: "Song".into(),
				author: "Band".into(),
				uri: "https://www.youtube.com/watch?v=abc".into(),
				length: Some(Duration::from_secs(212)),
				requester: requester(),
			})
		);
	}

	#[test]
	fn live_streams_have_no_length() {
		let json = br#"{
			"title": "Radio",
			"channel": "Station",
			"webpage_url": "https://www.youtube.com/watch?v=live",
			"duration": 12.0,
			"is_live": true
		}"#;

		let LoadResult::Track(track) = parse_media_info(json, requester()) else {
			panic!("expected a track");
		};
		assert_eq!(track.length, None);
		assert_eq!(track.author, "Station");
	}

	#[test]
	fn playlist_entries_in_order() {
		let json = br#"{
			"_type": "playlist",
			"title": "Mix",
			"entries": [
				{"_type": "url", "title": "One", "url": "https://www.youtube.com/watch?v=1", "duration": 60},
				{"_type": "url", "title": "Broken"},
				{"_type": "url", "title": "Two", "url": "https://www.youtube.com/watch?v=2", "duration": null}
			]
		}"#;

		let LoadResult::Playlist { name, tracks } = parse_media_info(json, requester()) else {
			panic!("expected a playlist");
		};
		assert_eq!(name, "Mix");
		assert_eq!(
			tracks.iter().map(|track| track.title.as_str()).collect::<Vec<_>>(),
			["One", "Two"]
		);
	}

	#[test]
	fn empty_and_invalid_output() {
		let empty = br#"{"_type": "playlist", "title": "Nothing", "entries": []}"#;
		assert_eq!(parse_media_info(empty, requester()), LoadResult::Empty);

		assert!(matches!(
			parse_media_info(b"not json", requester()),
			LoadResult::Failed(_)
		));
	}
}
