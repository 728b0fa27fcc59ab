//! Vote for the bot on the bot list

use crate::{
	constants::urls::VOTE_URL,
	states::{Context, InteractionResult},
	translation::Translate,
	votes::WaitingChannel,
};
use fluent::fluent_args;
use poise::command;

/// Get the link to vote for the bot
#[command(prefix_command, slash_command, guild_only, aliases("upvote"))]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(crate) async fn vote(ctx: Context<'_>) -> InteractionResult {
	let url = VOTE_URL.replace("{}", &ctx.framework().bot_id.to_string());

	ctx.say(ctx.translate("VOTE_LINK", Some(fluent_args!["url" => url])))
		.await?;

	if let Some(guild_id) = ctx.guild_id() {
		ctx.data().votes.wait_in(WaitingChannel {
			channel_id: ctx.channel_id(),
			guild_id,
		});
	}

	Ok(())
}
