//! Image filter worker
//!
//! Consumes [`ImageJob`]s from the message queue and answers on the reply subject of each
//! request. Jobs are not retried nor persisted.

use anyhow::{anyhow, Context};
use async_nats::{Client, Message};
use futures::StreamExt;
use image_worker::{
	process, ImageJob, ImageReply, LimitedBuffer, TooLarge, MAX_DOWNLOAD_BYTES, NOT_AN_IMAGE,
	QUEUE_GROUP, SUBJECT, TOO_LARGE,
};
use reqwest::header::CONTENT_TYPE;
use std::env;
use thiserror::Error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	// The `.env` file is optional for the worker, everything can come from the environment
	let _ = dotenvy::dotenv();

	tracing_subscriber::registry()
		.with(fmt::layer())
		.with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	let nats_url = env::var("NATS_URL").map_err(|_| anyhow!("NATS_URL must be set"))?;
	let nats = async_nats::connect(&nats_url)
		.await
		.with_context(|| format!("failed to connect to {nats_url}"))?;

	let mut jobs = nats
		.queue_subscribe(SUBJECT, QUEUE_GROUP.into())
		.await
		.context("failed to subscribe to the job subject")?;

	let http = reqwest::Client::new();

	tracing::info!(subject = SUBJECT, "waiting for image jobs");

	while let Some(message) = jobs.next().await {
		let nats = nats.clone();
		let http = http.clone();

		tokio::spawn(async move {
			if let Err(error) = handle(&nats, &http, message).await {
				tracing::error!(error = ?error, "failed to handle image job");
			}
		});
	}

	Ok(())
}

/// Process a single job message and publish the reply
async fn handle(nats: &Client, http: &reqwest::Client, message: Message) -> anyhow::Result<()> {
	let Some(reply_to) = message.reply.clone() else {
		tracing::warn!("received a job without reply subject, dropping it");
		return Ok(());
	};

	let reply = match serde_json::from_slice::<ImageJob>(&message.payload) {
		Ok(job) => {
			tracing::info!(url = job.url, filter = job.filter.name(), "processing");
			run(http, job).await
		}
		Err(error) => {
			tracing::warn!(error = %error, "malformed job");
			ImageReply::error("Malformed job")
		}
	};

	tracing::debug!(reply_to = %reply_to, "replying");

	nats.publish(reply_to, serde_json::to_vec(&reply)?.into())
		.await
		.context("failed to publish reply")?;

	Ok(())
}

/// Failures while fetching the source image
#[derive(Debug, Error)]
enum DownloadError {
	/// The request failed
	#[error(transparent)]
	Http(#[from] reqwest::Error),
	/// The file is too large to be processed
	#[error(transparent)]
	TooLarge(#[from] TooLarge),
}

/// Fetch `url`, returning its content type and bytes
async fn download(
	http: &reqwest::Client,
	url: &str,
) -> Result<(Option<String>, Vec<u8>), DownloadError> {
	let mut response = http.get(url).send().await?.error_for_status()?;

	let announced_too_large = response.content_length().is_some_and(|length| {
		usize::try_from(length).map_or(true, |length| length > MAX_DOWNLOAD_BYTES)
	});
	if announced_too_large {
		return Err(TooLarge(MAX_DOWNLOAD_BYTES).into());
	}

	let content_type = response
		.headers()
		.get(CONTENT_TYPE)
		.and_then(|value| value.to_str().ok())
		.map(str::to_owned);

	let mut buffer = LimitedBuffer::new(MAX_DOWNLOAD_BYTES);
	while let Some(chunk) = response.chunk().await? {
		buffer.extend(&chunk)?;
	}

	Ok((content_type, buffer.into_inner()))
}

/// Download the source image and render the job on a blocking thread
async fn run(http: &reqwest::Client, job: ImageJob) -> ImageReply {
	let (content_type, bytes) = match download(http, &job.url).await {
		Ok(download) => download,
		Err(DownloadError::TooLarge(error)) => {
			tracing::warn!(url = job.url, error = %error, "download refused");
			return ImageReply::error(TOO_LARGE);
		}
		Err(DownloadError::Http(error)) => {
			tracing::warn!(url = job.url, error = %error, "download failed");
			return ImageReply::error(NOT_AN_IMAGE);
		}
	};

	tokio::task::spawn_blocking(move || process(&job, content_type.as_deref(), &bytes))
		.await
		.unwrap_or_else(|error| {
			tracing::error!(error = %error, "render task panicked");
			ImageReply::error(image_worker::BUFFER_ERROR)
		})
}
