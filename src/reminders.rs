//! Reminder durations and delivery

use crate::{
	constants::reminders::{MAX_DELAY, POLL_PERIOD},
	database::{models::Reminder, prelude::*},
	states::{ArcData, InteractionResult},
};
use chrono::Utc;
use fluent::fluent_args;
use poise::serenity_prelude::{self as serenity, ChannelId, GuildId, Mentionable, UserId};
use std::time::Duration;

/// Why a duration was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub(crate) enum DurationError {
	/// Not a sequence of `<number><unit>`
	#[error("invalid duration")]
	Invalid,
	/// Zero or too far away
	#[error("duration out of range")]
	OutOfRange,
}

/// Seconds in a unit suffix
const fn unit_seconds(unit: char) -> Option<u64> {
	match unit {
		's' => Some(1),
		'm' => Some(60),
		'h' => Some(60 * 60),
		'd' => Some(24 * 60 * 60),
		'w' => Some(7 * 24 * 60 * 60),
		_ => None,
	}
}

/// Parse durations like `90s`, `1h30m` or `2d`
pub(crate) fn parse_duration(input: &str) -> Result<Duration, DurationError> {
	let input = input.trim().to_lowercase();
	if input.is_empty() {
		return Err(DurationError::Invalid);
	}

	let mut total = 0_u64;
	let mut number: Option<u64> = None;

	for char in input.chars() {
		if let Some(digit) = char.to_digit(10) {
			number = Some(
				number
					.unwrap_or_default()
					.checked_mul(10)
					.and_then(|number| number.checked_add(u64::from(digit)))
					.ok_or(DurationError::OutOfRange)?,
			);
			continue;
		}

		let seconds = unit_seconds(char).ok_or(DurationError::Invalid)?;
		let amount = number.take().ok_or(DurationError::Invalid)?;

		total = amount
			.checked_mul(seconds)
			.and_then(|seconds| total.checked_add(seconds))
			.ok_or(DurationError::OutOfRange)?;
	}

	// Trailing number without unit
	if number.is_some() {
		return Err(DurationError::Invalid);
	}

	let duration = Duration::from_secs(total);
	if duration.is_zero() || duration > MAX_DELAY {
		return Err(DurationError::OutOfRange);
	}

	Ok(duration)
}

/// Deliver due reminders forever, reminders missed while offline are sent on the first pass
pub(crate) async fn deliver_reminders(discord: serenity::Context, data: ArcData) {
	let mut interval = tokio::time::interval(POLL_PERIOD);

	loop {
		interval.tick().await;

		if let Err(error) = deliver_due(&discord, &data).await {
			tracing::error!(error = ?error, "could not deliver reminders");
		}
	}
}

/// Send and delete every due reminder
async fn deliver_due(discord: &serenity::Context, data: &ArcData) -> InteractionResult {
	let mut connection = data.database.get().await?;
	let due = Reminder::due(&mut connection, Utc::now().naive_utc()).await?;

	for reminder in due {
		let content = data.translate_for_guild(
			reminder.server_id.map(GuildId::new),
			"REMIND_DELIVERED",
			Some(fluent_args![
				"user" => UserId::new(reminder.user_id).mention().to_string(),
				"message" => reminder.message.as_str()
			]),
		);

		// A deleted channel must not block the reminder forever
		if let Err(error) = ChannelId::new(reminder.channel_id).say(discord, content).await {
			tracing::warn!(reminder_id = reminder.id, error = ?error, "could not send reminder");
		}

		diesel::delete(Reminder::with_id(reminder.id))
			.execute(&mut connection)
			.await?;

		tracing::info!(reminder_id = reminder.id, "reminder delivered");
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn durations() {
		assert_eq!(parse_duration("90s"), Ok(Duration::from_secs(90)));
		assert_eq!(parse_duration("1h30m"), Ok(Duration::from_secs(5400)));
		assert_eq!(parse_duration(" 2D "), Ok(Duration::from_secs(172_800)));
		assert_eq!(parse_duration("1w1s"), Ok(Duration::from_secs(604_801)));
	}

	#[test]
	fn invalid_durations() {
		assert_eq!(parse_duration(""), Err(DurationError::Invalid));
		assert_eq!(parse_duration("10"), Err(DurationError::Invalid));
		assert_eq!(parse_duration("h"), Err(DurationError::Invalid));
		assert_eq!(parse_duration("5 minutes"), Err(DurationError::Invalid));
		assert_eq!(parse_duration("0m"), Err(DurationError::OutOfRange));
		assert_eq!(parse_duration("9999w"), Err(DurationError::OutOfRange));
		assert_eq!(
			parse_duration("99999999999999999999999s"),
			Err(DurationError::OutOfRange)
		);
	}
}
