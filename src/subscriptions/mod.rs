//! Feeds posting new content to channels

use crate::{
	constants::subscriptions::POLL_PERIOD,
	database::models::Subscription,
	states::{ArcData, InteractionResult},
};
use chrono::{NaiveDateTime, Utc};
use poise::serenity_prelude::{self as serenity, ChannelId, CreateMessage};
use std::collections::HashMap;

pub(crate) mod reddit;

/// Most embeds in a single message
const EMBEDS_PER_MESSAGE: usize = 10;
/// Most characters across the embeds of a single message
const MAX_MESSAGE_EMBED_LENGTH: usize = 6000;

/// The kinds of feed a channel can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, poise::ChoiceParameter)]
pub(crate) enum FeedKind {
	/// Subreddit listings
	#[name = "reddit"]
	Reddit,
}

impl FeedKind {
	/// The stored representation
	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			Self::Reddit => "reddit",
		}
	}

	/// Parse the stored representation, `subreddit` is accepted as an alias
	pub(crate) fn from_stored(kind: &str) -> Option<Self> {
		match kind {
			"reddit" | "subreddit" => Some(Self::Reddit),
			_ => None,
		}
	}

	/// Whether `data` designates a feed of this kind, returns the translation key of the error
	pub(crate) fn validate(self, data: &str) -> Result<(), &'static str> {
		match self {
			Self::Reddit if reddit::validate(data) => Ok(()),
			Self::Reddit => Err("SUBSCRIBE_INVALID_REDDIT"),
		}
	}
}

/// Check every subscription forever
pub(crate) async fn poll_subscriptions(discord: serenity::Context, data: ArcData) {
	let mut interval = tokio::time::interval(POLL_PERIOD);

	loop {
		interval.tick().await;

		if let Err(error) = poll_once(&discord, &data).await {
			tracing::error!(error = ?error, "could not check subscriptions");
		}
	}
}

/// A feed as it was when it was fetched
struct FetchedFeed {
	/// Taken before the request, posts created later may be missing from `posts`
	fetched_at: NaiveDateTime,
	/// Oldest first
	posts: Vec<reddit::Post>,
}

impl FetchedFeed {
	/// The posts created after `last_check`, oldest first
	fn fresh(&self, last_check: NaiveDateTime) -> Vec<&reddit::Post> {
		self.posts
			.iter()
			.filter(|post| post.is_newer_than(last_check))
			.collect()
	}
}

/// Group items into messages, bounded by embed count and by total embed length
fn batches<T>(items: Vec<T>, length: impl Fn(&T) -> usize) -> Vec<Vec<T>> {
	let mut batches = Vec::<Vec<T>>::new();
	let mut current = Vec::new();
	let mut current_length = 0;

	for item in items {
		let item_length = length(&item);

		if current.len() == EMBEDS_PER_MESSAGE
			|| (!current.is_empty() && current_length + item_length > MAX_MESSAGE_EMBED_LENGTH)
		{
			batches.push(std::mem::take(&mut current));
			current_length = 0;
		}

		current_length += item_length;
		current.push(item);
	}

	if !current.is_empty() {
		batches.push(current);
	}

	batches
}

/// Post what is new since the last check of each subscription
#[tracing::instrument(skip_all)]
async fn poll_once(discord: &serenity::Context, data: &ArcData) -> InteractionResult {
	let mut connection = data.database.get().await?;
	let subscriptions = Subscription::all(&mut connection).await?;

	// Feeds shared by several channels are fetched once
	let mut fetched = HashMap::<(FeedKind, String), Option<FetchedFeed>>::new();

	for subscription in subscriptions {
		let Some(kind) = FeedKind::from_stored(&subscription.kind) else {
			tracing::warn!(
				subscription_id = subscription.id,
				kind = %subscription.kind,
				"unknown feed kind"
			);
			continue;
		};

		let key = (kind, subscription.data.clone());
		if !fetched.contains_key(&key) {
			let fetched_at = Utc::now().naive_utc();
			let posts = match kind {
				FeedKind::Reddit => reddit::fetch(&data.http, &subscription.data).await,
			};

			let feed = posts
				.map_err(|error| {
					tracing::warn!(feed = %subscription.data, error = ?error, "could not fetch feed");
				})
				.ok()
				.map(|posts| FetchedFeed { fetched_at, posts });
			fetched.insert(key.clone(), feed);
		}

		let Some(Some(feed)) = fetched.get(&key) else {
			continue;
		};

		let channel = ChannelId::new(subscription.channel_id);
		let mut checked_at = Some(feed.fetched_at);
		let mut delivered = None;

		for batch in batches(feed.fresh(subscription.last_check), |post| {
			post.embed_length()
		}) {
			let embeds = batch.iter().map(|post| post.embed()).collect::<Vec<_>>();

			if let Err(error) = channel
				.send_message(discord, CreateMessage::new().embeds(embeds))
				.await
			{
				tracing::warn!(
					subscription_id = subscription.id,
					error = ?error,
					"could not post feed"
				);
				// Retry from the first post that did not go through
				checked_at = delivered;
				break;
			}

			delivered = batch
				.last()
				.and_then(|post| post.created_at_naive())
				.or(delivered);
		}

		if let Some(checked_at) = checked_at {
			Subscription::touch(&mut connection, subscription.id, checked_at).await?;
		}
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::DateTime;

	#[test]
	fn kinds() {
		assert_eq!(FeedKind::from_stored("reddit"), Some(FeedKind::Reddit));
		assert_eq!(FeedKind::from_stored("subreddit"), Some(FeedKind::Reddit));
		assert_eq!(FeedKind::from_stored("rss"), None);
		assert_eq!(
			FeedKind::from_stored(FeedKind::Reddit.as_str()),
			Some(FeedKind::Reddit)
		);
	}

	#[test]
	fn batches_respect_count_and_length() {
		let counted = batches((0..23).collect(), |_| 1);
		assert_eq!(
			counted.iter().map(Vec::len).collect::<Vec<_>>(),
			[10, 10, 3]
		);

		let long = batches(vec![2500_usize, 2500, 2500, 100], |length| *length);
		assert_eq!(long, [vec![2500, 2500], vec![2500, 100]]);

		// An item alone above the budget still gets its own message
		assert_eq!(batches(vec![7000_usize, 10], |length| *length), [vec![7000], vec![10]]);
	}

	#[test]
	fn posts_created_during_a_fetch_are_kept_for_the_next_poll() {
		let fetched_at = DateTime::from_timestamp(1_700_000_000, 0)
			.expect("valid timestamp")
			.naive_utc();
		let post = |title: &str, created_utc: f64| {
			serde_json::from_value::<reddit::Post>(serde_json::json!({
				"title": title,
				"author": "someone",
				"permalink": "/r/aww/comments/1/post/",
				"subreddit": "aww",
				"created_utc": created_utc,
			}))
			.expect("valid post")
		};

		// Created while the first request was in flight, so only the next listing has it
		let late = post("late", 1_700_000_001.0);
		let next = FetchedFeed {
			fetched_at: fetched_at + chrono::Duration::seconds(60),
			posts: vec![post("old", 1_699_999_000.0), late.clone()],
		};

		assert_eq!(next.fresh(fetched_at), [&late]);
	}

	#[test]
	fn validation() {
		assert_eq!(FeedKind::Reddit.validate("r/discord_irl"), Ok(()));
		assert_eq!(
			FeedKind::Reddit.validate("discord_irl"),
			Err("SUBSCRIBE_INVALID_REDDIT")
		);
	}
}
