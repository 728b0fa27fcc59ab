//! Per guild playback state

use poise::serenity_prelude::{ChannelId, MessageId, UserId};
use songbird::tracks::TrackHandle;
use std::{
	collections::{HashSet, VecDeque},
	time::Duration,
};
use tokio::task::JoinHandle;

/// A song waiting in a queue or playing
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct QueuedTrack {
	/// Displayed title
	pub(crate) title: String,
	/// Uploader or artist
	pub(crate) author: String,
	/// Where the audio comes from
	pub(crate) uri: String,
	/// `None` for live streams
	pub(crate) length: Option<Duration>,
	/// Who asked for it
	pub(crate) requester: UserId,
}

impl QueuedTrack {
	/// Whether the track is too short to be worth playing
	pub(crate) fn is_too_short(&self, minimum: Duration) -> bool {
		self.length.is_some_and(|length| length <= minimum)
	}

	/// Whether the track is long enough to need an inactivity check, streams always are
	pub(crate) fn is_long(&self, threshold: Duration) -> bool {
		self.length.map_or(true, |length| length >= threshold)
	}
}

/// Outcome of a skip request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SkipVote {
	/// The track should be skipped now
	Skip,
	/// The vote was counted but more are needed
	Recorded {
		/// Votes so far
		votes: usize,
		/// Votes needed to skip
		needed: usize,
	},
	/// The user already voted for this track
	AlreadyVoted,
}

/// The playback state of a guild
#[derive(Debug)]
pub(crate) struct Listener {
	/// Songs waiting to be played
	pub(crate) queue: VecDeque<QueuedTrack>,
	/// The song currently playing
	pub(crate) playing: Option<QueuedTrack>,
	/// Control over the playing song
	pub(crate) track: Option<TrackHandle>,
	/// Bumped every time a song starts, events of older songs are ignored
	pub(crate) generation: u64,
	/// Users who voted to skip the playing song
	pub(crate) vote_skips: HashSet<UserId>,
	/// Where the now playing message lives
	pub(crate) text_channel: ChannelId,
	/// The connected voice channel
	pub(crate) voice_channel: ChannelId,
	/// The last now playing message
	pub(crate) last_message: Option<MessageId>,
	/// Periodic refresh of the now playing message
	pub(crate) edit_interval: Option<JoinHandle<()>>,
	/// Periodic check for an empty voice channel
	pub(crate) check_interval: Option<JoinHandle<()>>,
}

impl Listener {
	/// An idle listener
	pub(crate) fn new(text_channel: ChannelId, voice_channel: ChannelId) -> Self {
		Self {
			queue: VecDeque::new(),
			playing: None,
			track: None,
			generation: 0,
			vote_skips: HashSet::new(),
			text_channel,
			voice_channel,
			last_message: None,
			edit_interval: None,
			check_interval: None,
		}
	}

	/// Add tracks to the queue, `next` puts them in front while keeping their order
	pub(crate) fn enqueue(&mut self, tracks: Vec<QueuedTrack>, next: bool) {
		if next {
			for track in tracks.into_iter().rev() {
				self.queue.push_front(track);
			}
		} else {
			self.queue.extend(tracks);
		}
	}

	/// Add tracks and, when nothing is playing, take the first one to start
	///
	/// The playing slot is taken before returning so a concurrent enqueue does not start
	/// another song.
	pub(crate) fn enqueue_and_claim(
		&mut self,
		tracks: Vec<QueuedTrack>,
		next: bool,
	) -> Option<(u64, QueuedTrack)> {
		self.enqueue(tracks, next);

		if self.playing.is_some() {
			return None;
		}

		self.advance()
	}

	/// Pop the head of the queue and make it the playing song
	///
	/// Returns the new generation with the song, the playing state is cleared when the queue is
	/// empty.
	pub(crate) fn advance(&mut self) -> Option<(u64, QueuedTrack)> {
		self.stop_edit_interval();
		self.vote_skips.clear();
		self.generation += 1;
		self.track = None;
		self.playing = self.queue.pop_front();

		self.playing
			.clone()
			.map(|track| (self.generation, track))
	}

	/// Whether an event of `generation` concerns the playing song
	pub(crate) const fn is_current(&self, generation: u64) -> bool {
		self.generation == generation
	}

	/// Mark the song of `generation` as over, returns `false` if it was already superseded
	pub(crate) fn end_of(&mut self, generation: u64) -> bool {
		if !self.is_current(generation) {
			return false;
		}

		self.generation += 1;
		self.track = None;
		true
	}

	/// Count a skip vote from `user` with `members` in the voice channel, the bot included
	pub(crate) fn vote_skip(&mut self, user: UserId, members: usize) -> SkipVote {
		let requester = self.playing.as_ref().map(|track| track.requester);

		if requester == Some(user) || members <= 2 {
			return SkipVote::Skip;
		}

		if !self.vote_skips.insert(user) {
			return SkipVote::AlreadyVoted;
		}

		let listeners = members.saturating_sub(1);
		let needed = listeners / 2 + 1;
		let votes = self.vote_skips.len();

		if votes >= needed {
			SkipVote::Skip
		} else {
			SkipVote::Recorded { votes, needed }
		}
	}

	/// Empty the queue, returns how many songs were removed
	pub(crate) fn clear_queue(&mut self) -> usize {
		let count = self.queue.len();
		self.queue.clear();
		count
	}

	/// Title of the song after the playing one
	pub(crate) fn next_title(&self) -> Option<&str> {
		self.queue.front().map(|track| track.title.as_str())
	}

	/// Total length of the queued songs, streams count as zero
	pub(crate) fn queue_length(&self) -> Duration {
		self.queue.iter().filter_map(|track| track.length).sum()
	}

	/// Stop refreshing the now playing message
	pub(crate) fn stop_edit_interval(&mut self) {
		if let Some(interval) = self.edit_interval.take() {
			interval.abort();
		}
	}

	/// Stop the inactivity check
	pub(crate) fn stop_check_interval(&mut self) {
		if let Some(interval) = self.check_interval.take() {
			interval.abort();
		}
	}
}

impl Drop for Listener {
	fn drop(&mut self) {
		self.stop_edit_interval();
		self.stop_check_interval();
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;

	pub(crate) fn track(title: &str, requester: u64, length: Option<u64>) -> QueuedTrack {
		QueuedTrack {
			title: title.into(),
			author: "someone".into(),
			uri: format!("https://www.youtube.com/watch?v={title}"),
			length: length.map(Duration::from_millis),
			requester: UserId::new(requester),
		}
	}

	fn listener() -> Listener {
		Listener::new(ChannelId::new(1), ChannelId::new(2))
	}

	fn titles(listener: &Listener) -> Vec<&str> {
		listener.queue.iter().map(|track| track.title.as_str()).collect()
	}

	#[test]
	fn playlists_keep_their_order_in_front() {
		let mut listener = listener();
		listener.enqueue(vec![track("a", 1, None), track("b", 1, None)], false);
		listener.enqueue(vec![track("c", 1, None), track("d", 1, None)], true);
		listener.enqueue(vec![track("e", 1, None)], false);

		assert_eq!(titles(&listener), ["c", "d", "a", "b", "e"]);
		assert_eq!(listener.next_title(), Some("c"));
	}

	#[test]
	fn advancing_bumps_the_generation_and_resets_votes() {
		let mut listener = listener();
		listener.enqueue(vec![track("a", 1, Some(5000)), track("b", 1, Some(5000))], false);

		let (first, song) = listener.advance().expect("a song");
		assert_eq!(song.title, "a");
		listener.vote_skips.insert(UserId::new(9));

		let (second, _) = listener.advance().expect("a song");
		assert!(second > first);
		assert!(listener.is_current(second));
		assert!(!listener.is_current(first));
		assert!(listener.vote_skips.is_empty());

		assert_eq!(listener.advance(), None);
		assert_eq!(listener.playing, None);
	}

	#[test]
	fn only_an_idle_listener_claims_a_song() {
		let mut listener = listener();

		let (generation, song) = listener
			.enqueue_and_claim(vec![track("a", 1, None)], false)
			.expect("idle listener starts");
		assert_eq!(song.title, "a");
		assert!(listener.is_current(generation));

		assert_eq!(listener.enqueue_and_claim(vec![track("b", 1, None)], false), None);
		assert_eq!(titles(&listener), ["b"]);
	}

	#[test]
	fn only_the_current_song_can_end_once() {
		let mut listener = listener();
		listener.enqueue(vec![track("a", 1, None), track("b", 1, None)], false);

		let (first, _) = listener.advance().expect("a song");
		let (second, _) = listener.advance().expect("a song");

		assert!(!listener.end_of(first));
		assert!(listener.end_of(second));
		assert!(!listener.end_of(second));
	}

	#[test]
	fn requester_or_lonely_listener_skips_at_once() {
		let mut listener = listener();
		listener.enqueue(vec![track("a", 1, None)], false);
		listener.advance();

		assert_eq!(listener.vote_skip(UserId::new(1), 10), SkipVote::Skip);
		assert_eq!(listener.vote_skip(UserId::new(2), 2), SkipVote::Skip);
	}

	#[test]
	fn skipping_needs_more_than_half_of_the_listeners() {
		let mut listener = listener();
		listener.enqueue(vec![track("a", 1, None)], false);
		listener.advance();

		// bot and four users
		assert_eq!(
			listener.vote_skip(UserId::new(2), 5),
			SkipVote::Recorded { votes: 1, needed: 3 }
		);
		assert_eq!(listener.vote_skip(UserId::new(2), 5), SkipVote::AlreadyVoted);
		assert_eq!(
			listener.vote_skip(UserId::new(3), 5),
			SkipVote::Recorded { votes: 2, needed: 3 }
		);
		assert_eq!(listener.vote_skip(UserId::new(4), 5), SkipVote::Skip);
	}

	#[test]
	fn track_lengths() {
		let short = track("short", 1, Some(1000));
		let normal = track("normal", 1, Some(180_000));
		let stream = track("stream", 1, None);
		let minimum = Duration::from_millis(1000);
		let long = Duration::from_secs(3600);

		assert!(short.is_too_short(minimum));
		assert!(!normal.is_too_short(minimum));
		assert!(!stream.is_too_short(minimum));
		assert!(!normal.is_long(long));
		assert!(stream.is_long(long));
		assert!(track("long", 1, Some(3_600_000)).is_long(long));
	}

	#[test]
	fn clearing_counts_and_sums() {
		let mut listener = listener();
		listener.enqueue(
			vec![track("a", 1, Some(1000)), track("b", 1, None), track("c", 1, Some(2500))],
			false,
		);

		assert_eq!(listener.queue_length(), Duration::from_millis(3500));
		assert_eq!(listener.clear_queue(), 3);
		assert!(listener.queue.is_empty());
	}
}
