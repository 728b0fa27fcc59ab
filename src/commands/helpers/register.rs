//! Push the slash commands to `Discord`

use crate::{
	states::{ApplicationContext, ApplicationContextPolyfill, InteractionResult},
	translation::Translate,
};
use poise::command;

/// Register the slash commands in this guild, or everywhere with `global`
#[command(slash_command, owners_only, hide_in_help, rename = "register")]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.interaction.user.id))]
pub(super) async fn debug_register(
	ctx: ApplicationContext<'_>,
	global: Option<bool>,
) -> InteractionResult {
	let commands = &ctx.framework.options.commands;

	if global.unwrap_or_default() {
		poise::builtins::register_globally(&ctx.serenity_context.http, commands).await?;
		ctx.shout(ctx.translate("debug_register-global", None))
			.await?;

		return Ok(());
	}

	let Some(guild_id) = ctx.interaction.guild_id else {
		ctx.shout(ctx.translate("error-guild-only", None)).await?;

		return Ok(());
	};

	super::register_(&ctx.serenity_context.http, &guild_id, commands).await?;
	ctx.shout(ctx.translate("debug_register-guild", None))
		.await?;

	Ok(())
}
