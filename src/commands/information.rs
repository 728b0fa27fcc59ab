//! Commands describing the bot itself

use crate::{
	database::{
		prelude::*,
		schema::{command_log, memes, reminders, servers},
	},
	states::{Context, InteractionResult},
	translation::Translate,
};
use fluent::fluent_args;
use poise::{builtins::HelpConfiguration, command, serenity_prelude::CreateEmbed, CreateReply};

/// Show the available commands
#[command(prefix_command, slash_command, aliases("commands"))]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(crate) async fn help(
	ctx: Context<'_>,
	#[rest]
	#[autocomplete = "poise::builtins::autocomplete_command"]
	command: Option<String>,
) -> InteractionResult {
	let extra_text_at_bottom = ctx.translate("HELP_FOOTER", None);

	poise::builtins::help(
		ctx,
		command.as_deref(),
		HelpConfiguration {
			extra_text_at_bottom: &extra_text_at_bottom,
			ephemeral: true,
			show_subcommands: true,
			..Default::default()
		},
	)
	.await?;

	Ok(())
}

/// Show how much the bot is used
#[command(prefix_command, slash_command, aliases("statistics"), user_cooldown = 10)]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(crate) async fn stats(ctx: Context<'_>) -> InteractionResult {
	let mut connection = ctx.data().database.get().await?;

	let servers = servers::table
		.count()
		.get_result::<i64>(&mut connection)
		.await?;
	let memes = memes::table.count().get_result::<i64>(&mut connection).await?;
	let reminders = reminders::table
		.count()
		.get_result::<i64>(&mut connection)
		.await?;
	let commands = command_log::table
		.count()
		.get_result::<i64>(&mut connection)
		.await?;
	let listeners = ctx.data().music.count();

	let field = |key: &str, value: String| (ctx.translate(key, None), value, true);

	let embed = CreateEmbed::new()
		.title(ctx.translate(
			"STATS_TITLE",
			Some(fluent_args!["version" => env!("CARGO_PKG_VERSION")]),
		))
		.fields([
			field("STATS_SERVERS", servers.to_string()),
			field("STATS_COMMANDS", commands.to_string()),
			field("STATS_MEMES", memes.to_string()),
			field("STATS_REMINDERS", reminders.to_string()),
			field("STATS_LISTENERS", listeners.to_string()),
		]);

	ctx.send(CreateReply::default().embed(embed)).await?;

	Ok(())
}
