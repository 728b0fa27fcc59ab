//! Client of the image filter workers

use crate::{
	constants::images::{FILTER_TIMEOUT, RECENT_MESSAGES_SEARCHED},
	states::InteractionError,
};
use anyhow::Context as _;
use async_nats::{Request, RequestErrorKind};
use image_worker::{ImageJob, ImageReply, SUBJECT};
use poise::serenity_prelude::{self as serenity, Attachment, ChannelId, GetMessages, Message};

/// What the workers answered
#[derive(Debug)]
pub(crate) enum FilterOutcome {
	/// The filtered image
	Image {
		/// Encoded image
		bytes: Vec<u8>,
		/// File name to upload it as
		name: String,
	},
	/// The worker refused the job
	Rejected(String),
	/// No worker answered in time
	TimedOut,
}

/// Sends jobs to the image workers over the message queue
#[derive(Debug)]
pub(crate) struct ImageFilterClient {
	/// The message queue connection
	nats: async_nats::Client,
}

impl ImageFilterClient {
	/// Wrap a message queue connection
	pub(crate) const fn new(nats: async_nats::Client) -> Self {
		Self { nats }
	}

	/// Send a job and wait for its reply
	#[tracing::instrument(skip(self), fields(filter = job.filter.name()))]
	pub(crate) async fn filter(&self, job: &ImageJob) -> Result<FilterOutcome, InteractionError> {
		let payload = serde_json::to_vec(job).context("failed to encode the image job")?;

		let request = Request::new()
			.payload(payload.into())
			.timeout(Some(FILTER_TIMEOUT));

		let message = match self.nats.send_request(SUBJECT, request).await {
			Ok(message) => message,
			Err(error) if error.kind() == RequestErrorKind::TimedOut => {
				tracing::warn!("no image worker answered");
				return Ok(FilterOutcome::TimedOut);
			}
			Err(error) => return Err(error.into()),
		};

		let reply = serde_json::from_slice::<ImageReply>(&message.payload)
			.context("failed to decode the image worker reply")?;

		Ok(decode_reply(reply))
	}
}

/// Turn a worker reply into an outcome
fn decode_reply(reply: ImageReply) -> FilterOutcome {
	match reply.into_image() {
		Ok((bytes, name)) => FilterOutcome::Image { bytes, name },
		Err(reason) => FilterOutcome::Rejected(reason),
	}
}

/// Whether an attachment is an image
fn is_image(attachment: &Attachment) -> bool {
	attachment
		.content_type
		.as_deref()
		.map_or_else(|| has_image_extension(&attachment.filename), |content_type| {
			content_type.starts_with("image/")
		})
}

/// Whether a file name or url ends like an image
fn has_image_extension(name: &str) -> bool {
	let path = name.split(['?', '#']).next().unwrap_or(name).to_lowercase();

	[".png", ".jpg", ".jpeg", ".gif", ".webp", ".bmp"]
		.iter()
		.any(|extension| path.ends_with(extension))
}

/// The first image of a message, attachments first then embeds
fn image_in_message(message: &Message) -> Option<String> {
	message
		.attachments
		.iter()
		.find(|attachment| is_image(attachment))
		.map(|attachment| attachment.url.clone())
		.or_else(|| {
			message.embeds.iter().find_map(|embed| {
				embed
					.image
					.as_ref()
					.map(|image| image.url.clone())
					.or_else(|| embed.thumbnail.as_ref().map(|thumbnail| thumbnail.url.clone()))
			})
		})
}

/// Find the image to filter: an explicit link, an attachment, or the latest image in the channel
pub(crate) async fn find_image_url(
	discord: &serenity::Context,
	channel_id: ChannelId,
	url: Option<String>,
	attachment: Option<&Attachment>,
) -> Result<Option<String>, serenity::Error> {
	if let Some(url) = url.filter(|url| url.starts_with("http")) {
		return Ok(Some(url));
	}

	if let Some(attachment) = attachment.filter(|attachment| is_image(attachment)) {
		return Ok(Some(attachment.url.clone()));
	}

	let recent = channel_id
		.messages(discord, GetMessages::new().limit(RECENT_MESSAGES_SEARCHED))
		.await?;

	Ok(recent.iter().find_map(image_in_message))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn image_extensions() {
		assert!(has_image_extension("cat.PNG"));
		assert!(has_image_extension("https://cdn.example/a/b.jpeg?width=10"));
		assert!(!has_image_extension("notes.txt"));
		assert!(!has_image_extension("https://example.com/png"));
	}

	#[test]
	fn worker_replies() {
		let reply = ImageReply::Image {
			image: "AQID".into(),
			name: "blur.png".into(),
		};

		match decode_reply(reply) {
			FilterOutcome::Image { bytes, name } => {
				assert_eq!(bytes, [1, 2, 3]);
				assert_eq!(name, "blur.png");
			}
			outcome => panic!("unexpected outcome {outcome:?}"),
		}

		assert!(matches!(
			decode_reply(ImageReply::error("Not a valid image type")),
			FilterOutcome::Rejected(reason) if reason == "Not a valid image type"
		));

		let garbage = ImageReply::Image {
			image: "%%%".into(),
			name: "x.png".into(),
		};
		assert!(matches!(decode_reply(garbage), FilterOutcome::Rejected(_)));
	}
}
