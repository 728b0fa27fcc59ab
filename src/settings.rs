//! In memory cache of the per guild settings stored in the database

use crate::{
	constants::settings::DEFAULTS,
	database::{models::ServerSetting, DatabasePooledConnection},
};
use diesel::QueryResult;
use poise::serenity_prelude::GuildId;
use std::{
	collections::HashMap,
	sync::{PoisonError, RwLock},
};

/// The settings of every guild
#[derive(Debug, Default)]
struct Settings {
	/// Values applying to every guild without override
	global: HashMap<String, String>,
	/// Per guild overrides
	guilds: HashMap<GuildId, HashMap<String, String>>,
}

impl Settings {
	/// Resolve a key: guild override, then global value, then compiled default
	fn get(&self, guild_id: Option<GuildId>, key: &str) -> Option<&str> {
		guild_id
			.and_then(|guild_id| self.guilds.get(&guild_id))
			.and_then(|settings| settings.get(key))
			.or_else(|| self.global.get(key))
			.map(String::as_str)
			.or_else(|| {
				DEFAULTS
					.iter()
					.find(|(default_key, _)| *default_key == key)
					.map(|(_, value)| *value)
			})
	}

	/// Replace every value with the given rows
	fn replace_all(&mut self, rows: Vec<ServerSetting>) {
		self.global.clear();
		self.guilds.clear();

		for row in rows {
			match row.server_id {
				Some(guild_id) => {
					self.guilds
						.entry(GuildId::new(guild_id))
						.or_default()
						.insert(row.setting, row.value);
				}
				None => {
					self.global.insert(row.setting, row.value);
				}
			}
		}
	}

	/// Replace the overrides of a single guild
	fn replace_guild(&mut self, guild_id: GuildId, rows: Vec<ServerSetting>) {
		let settings = rows
			.into_iter()
			.map(|row| (row.setting, row.value))
			.collect::<HashMap<_, _>>();

		if settings.is_empty() {
			self.guilds.remove(&guild_id);
		} else {
			self.guilds.insert(guild_id, settings);
		}
	}
}

/// Shared access to the cached settings
///
/// Reads are synchronous so that they can be used from the prefix resolver and the
/// translation helpers.
#[derive(Debug, Default)]
pub(crate) struct SettingsCache {
	/// The cached values
	inner: RwLock<Settings>,
}

/// Whether a raw setting value means `true`
fn parse_bool(value: &str) -> bool {
	matches!(value.trim(), "true" | "1" | "yes" | "on")
}

impl SettingsCache {
	/// Get a setting value for a guild, falling back to the global value
	pub(crate) fn get(&self, guild_id: Option<GuildId>, key: &str) -> Option<String> {
		self.inner
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.get(guild_id, key)
			.map(str::to_owned)
	}

	/// Get a boolean setting, unset means `false`
	pub(crate) fn get_bool(&self, guild_id: Option<GuildId>, key: &str) -> bool {
		self.get(guild_id, key).is_some_and(|value| parse_bool(&value))
	}

	/// Get a numeric setting, `None` when unset or invalid
	pub(crate) fn get_u64(&self, guild_id: Option<GuildId>, key: &str) -> Option<u64> {
		self.get(guild_id, key)
			.and_then(|value| value.trim().parse().ok())
	}

	/// Load every setting from the database
	pub(crate) async fn load(&self, connection: &mut DatabasePooledConnection) -> QueryResult<()> {
		let rows = ServerSetting::all(connection).await?;
		let count = rows.len();

		self.inner
			.write()
			.unwrap_or_else(PoisonError::into_inner)
			.replace_all(rows);

		tracing::info!(count, "loaded settings");

		Ok(())
	}

	/// Reload the overrides of a single guild
	pub(crate) async fn reload_for_server(
		&self,
		connection: &mut DatabasePooledConnection,
		guild_id: GuildId,
	) -> QueryResult<()> {
		let rows = ServerSetting::all_from_guild(connection, guild_id).await?;

		self.inner
			.write()
			.unwrap_or_else(PoisonError::into_inner)
			.replace_guild(guild_id, rows);

		tracing::debug!(guild_id = guild_id.get(), "reloaded guild settings");

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::constants::settings::{MUSIC_UPDATE_FREQUENCY, PREFIX};

	fn row(server_id: Option<u64>, setting: &str, value: &str) -> ServerSetting {
		ServerSetting {
			id: 0,
			server_id,
			setting: setting.into(),
			value: value.into(),
		}
	}

	fn cache(rows: Vec<ServerSetting>) -> SettingsCache {
		let cache = SettingsCache::default();
		cache.inner.write().expect("lock").replace_all(rows);
		cache
	}

	#[test]
	fn guild_overrides_global_overrides_default() {
		let guild = GuildId::new(42);
		let cache = cache(vec![
			row(None, PREFIX, "?"),
			row(Some(42), PREFIX, "o!"),
			row(None, "bot.name", "ocelot"),
		]);

		assert_eq!(cache.get(Some(guild), PREFIX).as_deref(), Some("o!"));
		assert_eq!(cache.get(Some(GuildId::new(7)), PREFIX).as_deref(), Some("?"));
		assert_eq!(cache.get(None, "bot.name").as_deref(), Some("ocelot"));
		assert_eq!(
			cache.get(Some(guild), MUSIC_UPDATE_FREQUENCY).as_deref(),
			Some("10000")
		);
		assert_eq!(cache.get(Some(guild), "missing"), None);
	}

	#[test]
	fn typed_getters() {
		let guild = Some(GuildId::new(1));
		let cache = cache(vec![
			row(Some(1), "a", "true"),
			row(Some(1), "b", "0"),
			row(Some(1), "c", " 1500 "),
			row(Some(1), "d", "soon"),
		]);

		assert!(cache.get_bool(guild, "a"));
		assert!(!cache.get_bool(guild, "b"));
		assert!(!cache.get_bool(guild, "unset"));
		assert_eq!(cache.get_u64(guild, "c"), Some(1500));
		assert_eq!(cache.get_u64(guild, "d"), None);
	}

	#[test]
	fn guild_reload_drops_removed_overrides() {
		let guild = GuildId::new(3);
		let cache = cache(vec![row(Some(3), PREFIX, "3!")]);

		cache
			.inner
			.write()
			.expect("lock")
			.replace_guild(guild, vec![]);

		assert_eq!(cache.get(Some(guild), PREFIX).as_deref(), Some("!"));
	}
}
