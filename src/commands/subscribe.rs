//! Manage the feeds posting in a channel

use crate::{
	constants::limits::MAX_SUBSCRIPTIONS_PER_CHANNEL,
	database::{
		models::{NewSubscription, Subscription},
		prelude::*,
		schema::subscriptions,
	},
	states::{Context, ContextPolyfill, InteractionResult},
	subscriptions::FeedKind,
	translation::Translate,
};
use fluent::fluent_args;
use poise::command;

/// Post new content from other sites in this channel
#[allow(clippy::unused_async)]
#[command(
	prefix_command,
	slash_command,
	guild_only,
	aliases("sub"),
	required_permissions = "MANAGE_CHANNELS",
	subcommand_required,
	subcommands("subscribe_add", "subscribe_list", "subscribe_remove")
)]
pub(crate) async fn subscribe(_: Context<'_>) -> InteractionResult {
	Ok(())
}

/// Subscribe this channel to a feed
#[command(
	prefix_command,
	slash_command,
	guild_only,
	rename = "add",
	required_permissions = "MANAGE_CHANNELS"
)]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(crate) async fn subscribe_add(
	ctx: Context<'_>,
	kind: FeedKind,
	data: String,
) -> InteractionResult {
	let data = data.trim().to_lowercase();

	if let Err(key) = kind.validate(&data) {
		ctx.shout(ctx.translate(key, Some(fluent_args!["data" => data])))
			.await?;
		return Ok(());
	}

	let mut connection = ctx.data().database.get().await?;

	let count = Subscription::all_from_channel(ctx.channel_id())
		.count()
		.get_result::<i64>(&mut connection)
		.await?;

	if count >= MAX_SUBSCRIPTIONS_PER_CHANNEL {
		ctx.shout(ctx.translate(
			"SUBSCRIBE_TOO_MANY",
			Some(fluent_args!["max" => MAX_SUBSCRIPTIONS_PER_CHANNEL]),
		))
		.await?;
		return Ok(());
	}

	let exists = Subscription::all_from_channel(ctx.channel_id())
		.filter(subscriptions::kind.eq(kind.as_str()))
		.filter(subscriptions::data.eq(&data))
		.select(subscriptions::id)
		.first::<i32>(&mut connection)
		.await
		.optional()?
		.is_some();

	if exists {
		ctx.shout(ctx.translate("SUBSCRIBE_EXISTS", Some(fluent_args!["data" => data])))
			.await?;
		return Ok(());
	}

	NewSubscription {
		server_id: ctx.guild_only_id().get(),
		channel_id: ctx.channel_id().get(),
		user_id: ctx.author().id.get(),
		kind: kind.as_str(),
		data: &data,
	}
	.insert()
	.execute(&mut connection)
	.await?;

	ctx.say(ctx.translate("SUBSCRIBE_ADDED", Some(fluent_args!["data" => data])))
		.await?;

	Ok(())
}

/// List the feeds of this channel
#[command(
	prefix_command,
	slash_command,
	guild_only,
	rename = "list",
	required_permissions = "MANAGE_CHANNELS"
)]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(crate) async fn subscribe_list(ctx: Context<'_>) -> InteractionResult {
	let subscriptions = Subscription::all_from_channel(ctx.channel_id())
		.select(Subscription::as_select())
		.load::<Subscription>(&mut ctx.data().database.get().await?)
		.await?;

	if subscriptions.is_empty() {
		ctx.say(ctx.translate("SUBSCRIBE_LIST_EMPTY", None)).await?;
		return Ok(());
	}

	let lines = subscriptions
		.iter()
		.map(|subscription| {
			format!(
				"`{}` {} `{}`",
				subscription.id, subscription.kind, subscription.data
			)
		})
		.collect::<Vec<_>>();

	ctx.say(ctx.translate(
		"SUBSCRIBE_LIST",
		Some(fluent_args!["subscriptions" => lines.join("\n")]),
	))
	.await?;

	Ok(())
}

/// Remove a feed from this channel
#[command(
	prefix_command,
	slash_command,
	guild_only,
	rename = "remove",
	aliases("delete"),
	required_permissions = "MANAGE_CHANNELS"
)]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(crate) async fn subscribe_remove(ctx: Context<'_>, id: i32) -> InteractionResult {
	let deleted = diesel::delete(
		Subscription::all_from_channel(ctx.channel_id()).filter(subscriptions::id.eq(id)),
	)
	.execute(&mut ctx.data().database.get().await?)
	.await?;

	let key = if deleted > 0 {
		"SUBSCRIBE_REMOVED"
	} else {
		"SUBSCRIBE_NOT_FOUND"
	};

	ctx.say(ctx.translate(key, Some(fluent_args!["id" => id])))
		.await?;

	Ok(())
}
