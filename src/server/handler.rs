//! The request handlers of the webhook server

use super::ServerError;
use crate::states::ArcData;
use anyhow::anyhow;
use poise::serenity_prelude::UserId;
use rocket::{
	http::Status,
	request::{FromRequest, Outcome},
	serde::json::Json,
	Request, State,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

/// The raw `Authorization` header
pub(crate) struct Authorization<'r>(Option<&'r str>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Authorization<'r> {
	type Error = Infallible;

	async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
		Outcome::Success(Self(request.headers().get_one("Authorization")))
	}
}

/// Body sent by the vote list on every vote
#[derive(Debug, Deserialize)]
pub(crate) struct VotePayload {
	/// The voter id, as a string
	user: String,
	/// `upvote`, or `test` for test calls
	#[serde(rename = "type", default)]
	kind: Option<String>,
}

impl VotePayload {
	/// The voter, `None` when the id is not a snowflake
	fn voter(&self) -> Option<UserId> {
		self.user
			.trim()
			.parse::<u64>()
			.ok()
			.filter(|id| *id != 0)
			.map(UserId::new)
	}

	/// Whether the vote list only checks that the webhook works
	fn is_test(&self) -> bool {
		self.kind.as_deref() == Some("test")
	}
}

/// Receive a vote
#[rocket::post("/vote", format = "json", data = "<payload>")]
pub(super) fn vote(
	data: &State<ArcData>,
	authorization: Authorization<'_>,
	payload: Json<VotePayload>,
) -> Result<Status, ServerError> {
	if authorization.0 != Some(data.config.vote_webhook_secret.expose_secret().as_str()) {
		return Err(ServerError::Unauthorized);
	}

	let user_id = payload
		.voter()
		.ok_or_else(|| ServerError::User(format!("`{}` is not a user id", payload.user)))?;

	if payload.is_test() {
		tracing::info!(user_id = user_id.get(), "received test vote, not recording it");
		return Ok(Status::NoContent);
	}

	tracing::info!(
		user_id = user_id.get(),
		kind = payload.kind.as_deref().unwrap_or("upvote"),
		"received vote"
	);

	if !data.votes.submit(user_id) {
		return Err(anyhow!("the vote consumer stopped").into());
	}

	Ok(Status::NoContent)
}

/// State reported by the health endpoint
#[derive(Debug, Serialize)]
pub(crate) struct Health {
	/// Always `ok` when the server answers
	status: &'static str,
	/// Guilds listening to music
	listeners: usize,
	/// Tasks that delay a restart
	tasks: usize,
}

/// Report that the bot is alive
#[rocket::get("/health")]
pub(super) fn health(data: &State<ArcData>) -> Json<Health> {
	Json(Health {
		status: "ok",
		listeners: data.music.count(),
		tasks: data.tasks.count(),
	})
}

/// Catch the `404` status code
#[rocket::catch(404)]
pub(super) fn catch_404(request: &Request<'_>) -> String {
	format!("`{}` not found", request.uri().path())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn payload(json: &str) -> VotePayload {
		serde_json::from_str(json).expect("valid payload")
	}

	#[test]
	fn voters() {
		let vote = payload(
			r#"{"bot": "146293573422284800", "user": "139871249567318017", "type": "upvote", "isWeekend": false}"#,
		);
		assert_eq!(vote.voter(), Some(UserId::new(139_871_249_567_318_017)));
		assert_eq!(vote.kind.as_deref(), Some("upvote"));

		assert_eq!(payload(r#"{"user": "0"}"#).voter(), None);
		assert_eq!(payload(r#"{"user": "someone"}"#).voter(), None);
		assert_eq!(payload(r#"{"user": "42"}"#).kind, None);
	}

	#[test]
	fn test_calls_are_told_apart() {
		assert!(payload(r#"{"user": "42", "type": "test"}"#).is_test());
		assert!(!payload(r#"{"user": "42", "type": "upvote"}"#).is_test());
		assert!(!payload(r#"{"user": "42"}"#).is_test());
	}
}
