//! Webhook server receiving events from third party services

use crate::states::ArcData;
use rocket::{
	config::LogLevel,
	http::Status,
	response::{self, Responder},
	Ignite, Request, Rocket,
};
use tokio::task::JoinHandle;

mod handler;

/// An error answered to a webhook caller
#[derive(Debug, thiserror::Error)]
pub(crate) enum ServerError {
	/// The request is malformed
	#[error("{0}")]
	User(String),
	/// The shared secret is missing or wrong
	#[error("unauthorized")]
	Unauthorized,
	/// Something failed on our side
	#[error(transparent)]
	Other(#[from] anyhow::Error),
}

impl<'r> Responder<'r, 'static> for ServerError {
	fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
		match self {
			Self::User(message) => (Status::BadRequest, message).respond_to(request),
			Self::Unauthorized => {
				tracing::warn!(uri = %request.uri(), "unauthorized webhook call");
				Err(Status::Unauthorized)
			}
			Self::Other(error) => {
				tracing::error!(error = ?error, uri = %request.uri(), "webhook failed");
				Err(Status::InternalServerError)
			}
		}
	}
}

/// Start the webhook server in the background
pub(crate) fn start_server(data: ArcData) -> JoinHandle<Result<Rocket<Ignite>, rocket::Error>> {
	let figment = rocket::Config::figment()
		.merge(("address", data.config.server_address))
		.merge(("port", data.config.server_port))
		// Requests are traced by the handlers
		.merge(("log_level", LogLevel::Off));

	let rocket = rocket::custom(figment)
		.manage(data)
		.mount("/", rocket::routes![handler::vote, handler::health])
		.register("/", rocket::catchers![handler::catch_404]);

	tokio::spawn(rocket.launch())
}
