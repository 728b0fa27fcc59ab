//! Polyfill for the [`ComponentInteraction`](poise::serenity_prelude::ComponentInteraction) type

use poise::{
	serenity_prelude::{
		self as serenity, ComponentInteraction, CreateInteractionResponseFollowup,
		CreateInteractionResponseMessage, GuildId,
	},
	CreateReply,
};
use std::sync::{
	atomic::{AtomicBool, Ordering},
	Arc,
};

/// The [`poise::Context`] like for Message components interactions
#[derive(Copy, Clone)]
pub(crate) struct MessageComponentContext<'a, U: Send + Sync> {
	/// The underlying interaction
	pub(crate) interaction: &'a ComponentInteraction,
	/// The custom user data
	pub(crate) data: &'a U,
	/// The underlying serenity context
	pub(crate) discord: &'a serenity::Context,
	/// Keeps track of whether an initial response has been sent.
	///
	/// Discord requires different HTTP endpoints for initial and additional responses.
	pub(crate) has_sent_initial_response: &'a AtomicBool,
}

impl<U: Send + Sync> AsRef<serenity::Http> for MessageComponentContext<'_, U> {
	fn as_ref(&self) -> &serenity::Http {
		&self.discord.http
	}
}

impl<U: Send + Sync> serenity::CacheHttp for MessageComponentContext<'_, U> {
	fn http(&self) -> &serenity::Http {
		&self.discord.http
	}

	fn cache(&self) -> Option<&Arc<serenity::Cache>> {
		Some(&self.discord.cache)
	}
}

impl<U: Send + Sync> MessageComponentContext<'_, U> {
	/// Send a message to the user
	pub(crate) async fn send(&self, reply: CreateReply) -> Result<(), serenity::Error> {
		if self.has_sent_initial_response.load(Ordering::SeqCst) {
			self.interaction
				.create_followup(
					self.discord,
					reply.to_slash_followup_response(CreateInteractionResponseFollowup::default()),
				)
				.await?;
		} else {
			self.interaction
				.create_response(
					self.discord,
					serenity::CreateInteractionResponse::Message(
						reply.to_slash_initial_response(CreateInteractionResponseMessage::default()),
					),
				)
				.await?;
			self.has_sent_initial_response.store(true, Ordering::SeqCst);
		}

		Ok(())
	}

	/// Send an ephemeral message to the user
	#[inline]
	pub(crate) async fn shout(&self, content: impl Into<String> + Send) -> Result<(), serenity::Error> {
		self.send(
			CreateReply::default()
				.content(content.into())
				.ephemeral(true),
		)
		.await
	}

	/// Get the guild the component was used in
	///
	/// # Panics
	/// Panics if used in a non-guild context
	#[inline]
	#[track_caller]
	pub(crate) fn guild_only_id(&self) -> GuildId {
		self.interaction.guild_id.expect("not in a guild context")
	}
}
