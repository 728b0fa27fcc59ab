//! Reddit listings

use crate::constants::urls::REDDIT_JSON_API;
use chrono::{DateTime, NaiveDateTime, Utc};
use poise::serenity_prelude::{CreateEmbed, CreateEmbedAuthor, CreateEmbedFooter, Timestamp};
use serde::Deserialize;

/// Longest description an embed accepts
const MAX_DESCRIPTION_LENGTH: usize = 4096;
/// Longest title an embed accepts
const MAX_TITLE_LENGTH: usize = 256;

/// Whether the subreddit path is usable, e.g. `r/aww` or `r/aww/new`
pub(crate) fn validate(data: &str) -> bool {
	data.strip_prefix("r/")
		.is_some_and(|rest| !rest.is_empty() && !rest.contains(char::is_whitespace))
}

/// A listing page
#[derive(Debug, Deserialize)]
struct Listing {
	/// The listing content
	data: ListingData,
}

/// Content of a [`Listing`]
#[derive(Debug, Deserialize)]
struct ListingData {
	/// Wrapped posts
	children: Vec<Child>,
}

/// A wrapped post
#[derive(Debug, Deserialize)]
struct Child {
	/// The post
	data: Post,
}

/// A reddit post
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct Post {
	/// Title
	pub(crate) title: String,
	/// Author name
	pub(crate) author: String,
	/// Path of the post on reddit
	pub(crate) permalink: String,
	/// Score
	#[serde(default)]
	pub(crate) ups: i64,
	/// Subreddit name
	pub(crate) subreddit: String,
	/// Creation time, in seconds since the epoch
	pub(crate) created_utc: f64,
	/// Body of text posts
	#[serde(default)]
	pub(crate) selftext: String,
	/// Link of link posts
	#[serde(default)]
	pub(crate) url: String,
	/// Thumbnail link, or a keyword like `self`
	#[serde(default)]
	pub(crate) thumbnail: Option<String>,
	/// Image previews
	#[serde(default)]
	preview: Option<Preview>,
}

/// Previews of a post
#[derive(Debug, Clone, PartialEq, Deserialize)]
struct Preview {
	/// Preview images
	#[serde(default)]
	images: Vec<PreviewImage>,
}

/// A preview image
#[derive(Debug, Clone, PartialEq, Deserialize)]
struct PreviewImage {
	/// Full size source
	source: Option<PreviewSource>,
}

/// Location of a preview image
#[derive(Debug, Clone, PartialEq, Deserialize)]
struct PreviewSource {
	/// Html escaped link
	url: String,
}

/// Where the picture of a post goes in its embed
#[derive(Debug, Clone, PartialEq, Eq)]
enum Picture {
	/// Full width image
	Image(String),
	/// Small image in the corner
	Thumbnail(String),
}

impl Post {
	/// When the post was created
	#[allow(clippy::cast_possible_truncation)]
	fn created_at(&self) -> Option<DateTime<Utc>> {
		DateTime::from_timestamp_millis((self.created_utc * 1000.0) as i64)
	}

	/// When the post was created, in the format of the subscription checks
	pub(crate) fn created_at_naive(&self) -> Option<NaiveDateTime> {
		self.created_at().map(|created_at| created_at.naive_utc())
	}

	/// Whether the post was created after `last_check`
	pub(crate) fn is_newer_than(&self, last_check: NaiveDateTime) -> bool {
		self.created_at()
			.is_some_and(|created_at| created_at > last_check.and_utc())
	}

	/// The footer of the embed
	fn footer(&self) -> String {
		format!("{} points on {}", self.ups, self.subreddit)
	}

	/// The characters of the embed that count towards the message total
	pub(crate) fn embed_length(&self) -> usize {
		self.title.chars().count().min(MAX_TITLE_LENGTH)
			+ self.selftext.chars().count().min(MAX_DESCRIPTION_LENGTH)
			+ self.author.chars().count()
			+ self.footer().chars().count()
	}

	/// The preview image, then an imgur link, then the thumbnail
	fn picture(&self) -> Option<Picture> {
		let preview = self
			.preview
			.as_ref()
			.and_then(|preview| preview.images.first())
			.and_then(|image| image.source.as_ref());

		if let Some(source) = preview {
			return Some(Picture::Image(source.url.replace("&amp;", "&")));
		}

		if self.url.contains("imgur") {
			return Some(Picture::Image(self.url.clone()));
		}

		self.thumbnail
			.as_ref()
			.filter(|thumbnail| thumbnail.starts_with("http"))
			.map(|thumbnail| Picture::Thumbnail(thumbnail.clone()))
	}

	/// Build the embed announcing the post
	pub(crate) fn embed(&self) -> CreateEmbed {
		let mut embed = CreateEmbed::new()
			.title(truncate(&self.title, MAX_TITLE_LENGTH))
			.author(CreateEmbedAuthor::new(&self.author))
			.url(format!("https://reddit.com{}", self.permalink))
			.footer(CreateEmbedFooter::new(self.footer()));

		if let Some(timestamp) = self
			.created_at()
			.and_then(|created_at| Timestamp::from_unix_timestamp(created_at.timestamp()).ok())
		{
			embed = embed.timestamp(timestamp);
		}

		if !self.selftext.is_empty() {
			embed = embed.description(truncate(&self.selftext, MAX_DESCRIPTION_LENGTH));
		}

		match self.picture() {
			Some(Picture::Image(url)) => embed.image(url),
			Some(Picture::Thumbnail(url)) => embed.thumbnail(url),
			None => embed,
		}
	}
}

/// The first `max` characters of `text`
fn truncate(text: &str, max: usize) -> String {
	text.chars().take(max).collect()
}

/// Parse a listing page, oldest post first
fn parse_listing(json: &[u8]) -> serde_json::Result<Vec<Post>> {
	let listing = serde_json::from_slice::<Listing>(json)?;

	let mut posts = listing
		.data
		.children
		.into_iter()
		.map(|child| child.data)
		.collect::<Vec<_>>();
	posts.sort_by(|a, b| a.created_utc.total_cmp(&b.created_utc));

	Ok(posts)
}

/// Fetch the latest posts of a subreddit path, oldest first
#[tracing::instrument(skip(http))]
pub(crate) async fn fetch(http: &reqwest::Client, data: &str) -> anyhow::Result<Vec<Post>> {
	let body = http
		.get(format!("{REDDIT_JSON_API}/{data}.json"))
		.send()
		.await?
		.error_for_status()?
		.bytes()
		.await?;

	Ok(parse_listing(&body)?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::NaiveDate;

	const LISTING: &[u8] = br#"{
		"kind": "Listing",
		"data": {
			"children": [
				{"kind": "t3", "data": {
					"title": "Newest",
					"author": "cat_person",
					"permalink": "/r/aww/comments/2/newest/",
					"ups": 1200,
					"subreddit": "aww",
					"created_utc": 1700000200.0,
					"selftext": "",
					"url": "https://i.redd.it/abc.jpg",
					"thumbnail": "https://b.thumbs.redditmedia.com/abc.jpg",
					"preview": {"images": [{"source": {"url": "https://preview.redd.it/abc.jpg?width=640&amp;s=1"}}]}
				}},
				{"kind": "t3", "data": {
					"title": "Oldest",
					"author": "dog_person",
					"permalink": "/r/aww/comments/1/oldest/",
					"ups": 3,
					"subreddit": "aww",
					"created_utc": 1700000100.0,
					"selftext": "Look at him",
					"url": "https://www.reddit.com/r/aww/comments/1/oldest/",
					"thumbnail": "self"
				}}
			]
		}
	}"#;

	#[test]
	fn subreddit_paths() {
		assert!(validate("r/aww"));
		assert!(validate("r/aww/new"));
		assert!(!validate("aww"));
		assert!(!validate("r/"));
		assert!(!validate("r/a w w"));
	}

	#[test]
	fn listing_is_sorted_and_filtered() {
		let posts = parse_listing(LISTING).expect("valid listing");
		assert_eq!(
			posts.iter().map(|post| post.title.as_str()).collect::<Vec<_>>(),
			["Oldest", "Newest"]
		);

		let between = DateTime::from_timestamp(1_700_000_150, 0)
			.expect("valid timestamp")
			.naive_utc();
		let fresh = posts
			.iter()
			.filter(|post| post.is_newer_than(between))
			.collect::<Vec<_>>();
		assert_eq!(fresh.len(), 1);
		assert_eq!(fresh[0].title, "Newest");

		let long_ago = NaiveDate::from_ymd_opt(2020, 1, 1)
			.and_then(|date| date.and_hms_opt(0, 0, 0))
			.expect("valid date");
		assert!(posts.iter().all(|post| post.is_newer_than(long_ago)));
	}

	#[test]
	fn embeds() {
		let posts = parse_listing(LISTING).expect("valid listing");

		let text = serde_json::to_value(posts[0].embed()).expect("serializable");
		assert_eq!(text["title"], "Oldest");
		assert_eq!(text["url"], "https://reddit.com/r/aww/comments/1/oldest/");
		assert_eq!(text["footer"]["text"], "3 points on aww");
		assert_eq!(text["description"], "Look at him");
		assert!(text.get("image").map_or(true, serde_json::Value::is_null));
		assert!(text.get("thumbnail").map_or(true, serde_json::Value::is_null));

		let image = serde_json::to_value(posts[1].embed()).expect("serializable");
		assert_eq!(image["author"]["name"], "cat_person");
		assert_eq!(
			image["image"]["url"],
			"https://preview.redd.it/abc.jpg?width=640&s=1"
		);
		assert!(image
			.get("description")
			.map_or(true, serde_json::Value::is_null));
	}

	#[test]
	fn long_titles_are_cut() {
		let mut post = parse_listing(LISTING).expect("valid listing").remove(0);
		post.title = "é".repeat(300);

		let embed = serde_json::to_value(post.embed()).expect("serializable");
		let title = embed["title"].as_str().expect("title");

		assert_eq!(title.chars().count(), MAX_TITLE_LENGTH);
		assert_eq!(
			post.embed_length(),
			MAX_TITLE_LENGTH + "Look at him".len() + "dog_person".len() + "3 points on aww".len()
		);
	}

	#[test]
	fn imgur_links_and_thumbnails() {
		let mut post = parse_listing(LISTING).expect("valid listing").remove(1);
		post.preview = None;
		post.url = "https://i.imgur.com/xyz.png".into();
		assert_eq!(
			post.picture(),
			Some(Picture::Image("https://i.imgur.com/xyz.png".into()))
		);

		post.url = "https://example.com".into();
		assert_eq!(
			post.picture(),
			Some(Picture::Thumbnail(
				"https://b.thumbs.redditmedia.com/abc.jpg".into()
			))
		);
	}
}
