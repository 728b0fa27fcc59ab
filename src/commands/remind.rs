//! Reminders delivered later in the same channel

use crate::{
	database::{models::NewReminder, prelude::*},
	reminders::{parse_duration, DurationError},
	states::{Context, ContextPolyfill, InteractionResult},
	translation::Translate,
};
use anyhow::Context as _;
use chrono::Utc;
use fluent::fluent_args;
use poise::command;

/// Get reminded of something later
#[command(
	prefix_command,
	slash_command,
	aliases("remindme", "reminder"),
	user_cooldown = 3
)]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(crate) async fn remind(
	ctx: Context<'_>,
	duration: String,
	#[rest] message: String,
) -> InteractionResult {
	let delay = match parse_duration(&duration) {
		Ok(delay) => delay,
		Err(error) => {
			let key = match error {
				DurationError::Invalid => "REMIND_INVALID_DURATION",
				DurationError::OutOfRange => "REMIND_OUT_OF_RANGE",
			};

			ctx.shout(ctx.translate(key, Some(fluent_args!["duration" => duration])))
				.await?;
			return Ok(());
		}
	};

	let at = Utc::now().naive_utc()
		+ chrono::Duration::from_std(delay).context("reminder delay does not fit a date")?;

	NewReminder {
		user_id: ctx.author().id.get(),
		server_id: ctx.guild_id().map(|guild_id| guild_id.get()),
		channel_id: ctx.channel_id().get(),
		at,
		message: message.trim(),
	}
	.insert()
	.execute(&mut ctx.data().database.get().await?)
	.await?;

	ctx.say(ctx.translate(
		"REMIND_SET",
		Some(fluent_args!["timestamp" => format!("<t:{}:R>", at.and_utc().timestamp())]),
	))
	.await?;

	Ok(())
}
