//! Voice channel lookups in the gateway cache

use poise::serenity_prelude::{self as serenity, ChannelId, GuildId, Permissions, UserId};

/// Why the bot cannot play in a voice channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VoiceIssue {
	/// The channel reached its user limit
	Full,
	/// The bot may not connect
	Unjoinable,
	/// The bot may not speak
	Unspeakable,
}

impl VoiceIssue {
	/// The translation key of the reply
	pub(crate) const fn translation_key(self) -> &'static str {
		match self {
			Self::Full => "VOICE_FULL_CHANNEL",
			Self::Unjoinable => "VOICE_UNJOINABLE_CHANNEL",
			Self::Unspeakable => "VOICE_UNSPEAKABLE_CHANNEL",
		}
	}
}

/// Users connected to a voice channel, bots included
pub(crate) fn members_in(
	discord: &serenity::Context,
	guild_id: GuildId,
	channel_id: ChannelId,
) -> Vec<UserId> {
	discord
		.cache
		.guild(guild_id)
		.map(|guild| {
			guild
				.voice_states
				.values()
				.filter(|state| state.channel_id == Some(channel_id))
				.map(|state| state.user_id)
				.collect()
		})
		.unwrap_or_default()
}

/// Whether `bot_id` is the only one left, an unknown channel counts as not alone
pub(crate) fn is_alone(members: &[UserId], bot_id: UserId) -> bool {
	matches!(members, [member] if *member == bot_id)
}

/// Whether the bot is the only one connected to a voice channel
pub(crate) fn bot_alone_in(
	discord: &serenity::Context,
	guild_id: GuildId,
	channel_id: ChannelId,
) -> bool {
	is_alone(
		&members_in(discord, guild_id, channel_id),
		discord.cache.current_user().id,
	)
}

/// The voice channel a user is connected to
pub(crate) fn channel_of(
	discord: &serenity::Context,
	guild_id: GuildId,
	user_id: UserId,
) -> Option<ChannelId> {
	discord
		.cache
		.guild(guild_id)?
		.voice_states
		.get(&user_id)
		.and_then(|state| state.channel_id)
}

/// The display name of a channel
pub(crate) fn channel_name(
	discord: &serenity::Context,
	guild_id: GuildId,
	channel_id: ChannelId,
) -> String {
	discord
		.cache
		.guild(guild_id)
		.and_then(|guild| guild.channels.get(&channel_id).map(|channel| channel.name.clone()))
		.unwrap_or_else(|| channel_id.to_string())
}

/// Check that the bot can join and speak in a voice channel
pub(crate) fn check_playable(
	discord: &serenity::Context,
	guild_id: GuildId,
	channel_id: ChannelId,
) -> Result<(), VoiceIssue> {
	let bot_id = discord.cache.current_user().id;
	let Some(guild) = discord.cache.guild(guild_id) else {
		return Err(VoiceIssue::Unjoinable);
	};
	let (Some(channel), Some(member)) = (guild.channels.get(&channel_id), guild.members.get(&bot_id))
	else {
		return Err(VoiceIssue::Unjoinable);
	};

	let connected = guild
		.voice_states
		.values()
		.filter(|state| state.channel_id == Some(channel_id))
		.count();
	let permissions = guild.user_permissions_in(channel, member);

	voice_issue(permissions, channel.user_limit, connected)
}

/// Decide whether a channel with `connected` users is usable with `permissions`
fn voice_issue(
	permissions: Permissions,
	user_limit: Option<u32>,
	connected: usize,
) -> Result<(), VoiceIssue> {
	let full = user_limit
		.filter(|limit| *limit > 0)
		.is_some_and(|limit| connected >= limit as usize);

	if full && !permissions.move_members() {
		Err(VoiceIssue::Full)
	} else if !permissions.connect() {
		Err(VoiceIssue::Unjoinable)
	} else if !permissions.speak() {
		Err(VoiceIssue::Unspeakable)
	} else {
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn permissions_and_limits() {
		let all = Permissions::CONNECT | Permissions::SPEAK;

		assert_eq!(voice_issue(all, None, 30), Ok(()));
		assert_eq!(voice_issue(all, Some(0), 30), Ok(()));
		assert_eq!(voice_issue(all, Some(2), 2), Err(VoiceIssue::Full));
		assert_eq!(
			voice_issue(all | Permissions::MOVE_MEMBERS, Some(2), 2),
			Ok(())
		);
		assert_eq!(
			voice_issue(Permissions::SPEAK, None, 0),
			Err(VoiceIssue::Unjoinable)
		);
		assert_eq!(
			voice_issue(Permissions::CONNECT, None, 0),
			Err(VoiceIssue::Unspeakable)
		);
	}

	#[test]
	fn alone_means_only_the_bot() {
		let bot = UserId::new(1);

		assert!(is_alone(&[bot], bot));
		assert!(!is_alone(&[], bot));
		assert!(!is_alone(&[bot, UserId::new(2)], bot));
		// Someone else left behind after the bot was moved out
		assert!(!is_alone(&[UserId::new(2)], bot));
	}
}
