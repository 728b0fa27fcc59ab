//! Match votes received by the webhook with the channels that asked for them

use crate::{
	database::{models::NewVote, prelude::*},
	states::{ArcData, InteractionResult},
};
use fluent::fluent_args;
use poise::serenity_prelude::{self as serenity, ChannelId, GuildId, Mentionable, UserId};
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;

/// A channel where someone ran the vote command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WaitingChannel {
	/// Where to thank the voter
	pub(crate) channel_id: ChannelId,
	/// The guild of the channel
	pub(crate) guild_id: GuildId,
}

/// Channels waiting for a vote and the votes not yet handled
#[derive(Debug)]
pub(crate) struct VoteRegistry {
	/// Channels in registration order
	waiting: Mutex<Vec<WaitingChannel>>,
	/// Handed to the webhook server
	sender: mpsc::UnboundedSender<UserId>,
	/// Taken once by the consumer
	receiver: Mutex<Option<mpsc::UnboundedReceiver<UserId>>>,
}

impl Default for VoteRegistry {
	fn default() -> Self {
		let (sender, receiver) = mpsc::unbounded_channel();

		Self {
			waiting: Mutex::default(),
			sender,
			receiver: Mutex::new(Some(receiver)),
		}
	}
}

impl VoteRegistry {
	/// Remember a channel to thank voters in
	pub(crate) fn wait_in(&self, channel: WaitingChannel) {
		let mut waiting = self.waiting.lock().unwrap_or_else(PoisonError::into_inner);

		if !waiting.contains(&channel) {
			waiting.push(channel);
		}
	}

	/// The first waiting channel whose guild passes `is_member`
	pub(crate) fn match_voter(&self, is_member: impl Fn(GuildId) -> bool) -> Option<WaitingChannel> {
		self.waiting
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.iter()
			.find(|channel| is_member(channel.guild_id))
			.copied()
	}

	/// Queue a vote received by the webhook, returns `false` once the consumer is gone
	pub(crate) fn submit(&self, user_id: UserId) -> bool {
		self.sender.send(user_id).is_ok()
	}

	/// Take the receiving end, only the first caller gets it
	fn take_receiver(&self) -> Option<mpsc::UnboundedReceiver<UserId>> {
		self.receiver
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.take()
	}
}

/// Handle votes as they come, runs until the bot stops
pub(crate) async fn consume_votes(discord: serenity::Context, data: ArcData) {
	let Some(mut receiver) = data.votes.take_receiver() else {
		tracing::debug!("votes are already consumed");
		return;
	};

	while let Some(user_id) = receiver.recv().await {
		if let Err(error) = register_vote(&discord, &data, user_id).await {
			tracing::error!(user_id = user_id.get(), error = ?error, "could not register vote");
		}
	}
}

/// Thank the voter in a matching channel and record the vote
async fn register_vote(
	discord: &serenity::Context,
	data: &ArcData,
	user_id: UserId,
) -> InteractionResult {
	let matched = data
		.votes
		.match_voter(|guild_id| discord.cache.member(guild_id, user_id).is_some());

	if let Some(channel) = matched {
		tracing::info!(
			user_id = user_id.get(),
			channel_id = channel.channel_id.get(),
			"matched waiting vote channel"
		);

		let content = data.translate_for_guild(
			Some(channel.guild_id),
			"VOTE_THANKS",
			Some(fluent_args!["user" => user_id.mention().to_string()]),
		);
		channel.channel_id.say(discord, content).await?;
	}

	NewVote {
		user_id: user_id.get(),
		server_id: matched.map(|channel| channel.guild_id.get()),
	}
	.insert()
	.execute(&mut data.database.get().await?)
	.await?;

	tracing::info!(user_id = user_id.get(), "logged vote");

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn waiting(channel: u64, guild: u64) -> WaitingChannel {
		WaitingChannel {
			channel_id: ChannelId::new(channel),
			guild_id: GuildId::new(guild),
		}
	}

	#[test]
	fn first_channel_of_a_shared_guild_wins() {
		let registry = VoteRegistry::default();
		registry.wait_in(waiting(1, 10));
		registry.wait_in(waiting(2, 20));
		registry.wait_in(waiting(3, 20));
		registry.wait_in(waiting(2, 20));

		assert_eq!(
			registry.match_voter(|guild| guild == GuildId::new(20)),
			Some(waiting(2, 20))
		);
		assert_eq!(registry.match_voter(|guild| guild == GuildId::new(30)), None);
	}

	#[tokio::test]
	async fn submitted_votes_reach_the_consumer_once() {
		let registry = VoteRegistry::default();

		let mut receiver = registry.take_receiver().expect("first take");
		assert!(registry.take_receiver().is_none());

		assert!(registry.submit(UserId::new(42)));
		assert_eq!(receiver.recv().await, Some(UserId::new(42)));

		drop(receiver);
		assert!(!registry.submit(UserId::new(43)));
	}
}
