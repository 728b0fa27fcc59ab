//! Rows of the database and the common queries built on them

use super::{
	prelude::*,
	schema::{
		bans, command_log, left_servers, memes, music_queue, reminders, server_settings, servers,
		song_guesses, subscriptions, votes,
	},
	DatabasePooledConnection,
};
use chrono::NaiveDateTime;
use diesel::{
	dsl,
	mysql::Mysql,
	prelude::{Identifiable, Insertable, Queryable, Selectable},
	query_builder::InsertStatement,
	QueryResult,
};
use poise::serenity_prelude::{ChannelId, GuildId, UserId};

/// Shorthand for the statement returned by the `insert` helpers
type Insert<'a, T, R> = InsertStatement<T, <&'a R as Insertable<T>>::Values>;

/// A guild the bot is part of
#[derive(Debug, Queryable, Selectable, Identifiable)]
#[diesel(table_name = servers)]
#[diesel(check_for_backend(Mysql))]
pub(crate) struct Server {
	/// The guild id
	pub(crate) id: u64,
	/// The guild owner id
	pub(crate) owner_id: u64,
	/// The guild name when it was added
	pub(crate) name: String,
	/// When the bot joined
	pub(crate) joined_at: NaiveDateTime,
}

impl Server {
	/// Select the server with the given id
	pub(crate) fn with_id(guild_id: GuildId) -> dsl::Find<servers::table, u64> {
		servers::table.find(guild_id.get())
	}
}

/// A guild to insert
#[derive(Debug, Insertable)]
#[diesel(table_name = servers)]
pub(crate) struct NewServer<'a> {
	/// The guild id
	pub(crate) id: u64,
	/// The guild owner id
	pub(crate) owner_id: u64,
	/// The guild name
	pub(crate) name: &'a str,
}

impl NewServer<'_> {
	/// Insert the guild
	pub(crate) fn insert(&self) -> Insert<'_, servers::table, Self> {
		diesel::insert_into(servers::table).values(self)
	}
}

/// Record of a guild that removed the bot
#[derive(Debug, Insertable)]
#[diesel(table_name = left_servers)]
pub(crate) struct NewLeftServer {
	/// The guild id
	pub(crate) server_id: u64,
}

impl NewLeftServer {
	/// Insert the record
	pub(crate) fn insert(&self) -> Insert<'_, left_servers::table, Self> {
		diesel::insert_into(left_servers::table).values(self)
	}
}

/// A key value setting, `server_id` is `None` for global defaults
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = server_settings)]
#[diesel(check_for_backend(Mysql))]
pub(crate) struct ServerSetting {
	/// The row id
	pub(crate) id: i32,
	/// The guild the setting belongs to
	pub(crate) server_id: Option<u64>,
	/// The setting key
	pub(crate) setting: String,
	/// The raw value
	pub(crate) value: String,
}

impl ServerSetting {
	/// Every setting row, global ones included
	pub(crate) async fn all(connection: &mut DatabasePooledConnection) -> QueryResult<Vec<Self>> {
		server_settings::table
			.select(Self::as_select())
			.load(connection)
			.await
	}

	/// The settings overridden by the given guild
	pub(crate) async fn all_from_guild(
		connection: &mut DatabasePooledConnection,
		guild_id: GuildId,
	) -> QueryResult<Vec<Self>> {
		server_settings::table
			.filter(server_settings::server_id.eq(guild_id.get()))
			.select(Self::as_select())
			.load(connection)
			.await
	}

	/// Find the row id of a setting, `None` targets the global value
	async fn find_id(
		connection: &mut DatabasePooledConnection,
		guild_id: Option<GuildId>,
		setting: &str,
	) -> QueryResult<Option<i32>> {
		let query = server_settings::table
			.select(server_settings::id)
			.filter(server_settings::setting.eq(setting))
			.into_boxed();

		let query = match guild_id {
			Some(guild_id) => query.filter(server_settings::server_id.eq(guild_id.get())),
			None => query.filter(server_settings::server_id.is_null()),
		};

		query.first::<i32>(connection).await.optional()
	}

	/// Update the setting if it exists or insert it
	pub(crate) async fn set(
		connection: &mut DatabasePooledConnection,
		guild_id: Option<GuildId>,
		setting: &str,
		value: &str,
	) -> QueryResult<()> {
		match Self::find_id(connection, guild_id, setting).await? {
			Some(id) => {
				diesel::update(server_settings::table.find(id))
					.set(server_settings::value.eq(value))
					.execute(connection)
					.await?;
			}
			None => {
				diesel::insert_into(server_settings::table)
					.values((
						server_settings::server_id.eq(guild_id.map(GuildId::get)),
						server_settings::setting.eq(setting),
						server_settings::value.eq(value),
					))
					.execute(connection)
					.await?;
			}
		}

		Ok(())
	}

	/// Remove a setting, returns whether something was deleted
	pub(crate) async fn delete(
		connection: &mut DatabasePooledConnection,
		guild_id: Option<GuildId>,
		setting: &str,
	) -> QueryResult<bool> {
		let Some(id) = Self::find_id(connection, guild_id, setting).await? else {
			return Ok(false);
		};

		diesel::delete(server_settings::table.find(id))
			.execute(connection)
			.await?;

		Ok(true)
	}
}

/// A stored meme, `server_id` is `None` for memes available everywhere
#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = memes)]
#[diesel(check_for_backend(Mysql))]
pub(crate) struct Meme {
	/// The row id
	pub(crate) id: i32,
	/// The name used to summon the meme
	pub(crate) name: String,
	/// The guild the meme is restricted to
	pub(crate) server_id: Option<u64>,
	/// The author
	pub(crate) added_by: u64,
	/// The content sent back
	pub(crate) content: String,
}

impl Meme {
	/// Names of every meme usable in the guild
	pub(crate) async fn names_for_guild(
		connection: &mut DatabasePooledConnection,
		guild_id: GuildId,
	) -> QueryResult<Vec<String>> {
		memes::table
			.filter(
				memes::server_id
					.eq(guild_id.get())
					.or(memes::server_id.is_null()),
			)
			.select(memes::name)
			.order(memes::name.asc())
			.load(connection)
			.await
	}

	/// Find a meme by name, a guild meme shadows a global one with the same name
	pub(crate) async fn find(
		connection: &mut DatabasePooledConnection,
		guild_id: GuildId,
		name: &str,
	) -> QueryResult<Option<Self>> {
		memes::table
			.filter(memes::name.eq(name))
			.filter(
				memes::server_id
					.eq(guild_id.get())
					.or(memes::server_id.is_null()),
			)
			// `NULL` sorts last when descending
			.order(memes::server_id.desc())
			.select(Self::as_select())
			.first(connection)
			.await
			.optional()
	}

	/// Delete a meme added by `user_id`, returns whether something was deleted
	pub(crate) async fn delete_owned(
		connection: &mut DatabasePooledConnection,
		guild_id: GuildId,
		user_id: UserId,
		name: &str,
	) -> QueryResult<bool> {
		let deleted = diesel::delete(
			memes::table
				.filter(memes::name.eq(name))
				.filter(memes::added_by.eq(user_id.get()))
				.filter(
					memes::server_id
						.eq(guild_id.get())
						.or(memes::server_id.is_null()),
				),
		)
		.execute(connection)
		.await?;

		Ok(deleted > 0)
	}
}

/// A meme to insert
#[derive(Debug, Insertable)]
#[diesel(table_name = memes)]
pub(crate) struct NewMeme<'a> {
	/// The name used to summon the meme
	pub(crate) name: &'a str,
	/// The guild the meme is restricted to
	pub(crate) server_id: Option<u64>,
	/// The author
	pub(crate) added_by: u64,
	/// The content sent back
	pub(crate) content: &'a str,
}

impl NewMeme<'_> {
	/// Insert the meme
	pub(crate) fn insert(&self) -> Insert<'_, memes::table, Self> {
		diesel::insert_into(memes::table).values(self)
	}
}

/// A pending reminder
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = reminders)]
#[diesel(check_for_backend(Mysql))]
pub(crate) struct Reminder {
	/// The row id
	pub(crate) id: i32,
	/// Who to remind
	pub(crate) user_id: u64,
	/// Where the reminder was set
	pub(crate) server_id: Option<u64>,
	/// Where to send the reminder
	pub(crate) channel_id: u64,
	/// When to send it, in UTC
	pub(crate) at: NaiveDateTime,
	/// What to remind
	pub(crate) message: String,
}

impl Reminder {
	/// Select the reminder with the given id
	pub(crate) fn with_id(id: i32) -> dsl::Find<reminders::table, i32> {
		reminders::table.find(id)
	}

	/// Every reminder due at `now`, oldest first
	pub(crate) async fn due(
		connection: &mut DatabasePooledConnection,
		now: NaiveDateTime,
	) -> QueryResult<Vec<Self>> {
		reminders::table
			.filter(reminders::at.le(now))
			.order(reminders::at.asc())
			.select(Self::as_select())
			.load(connection)
			.await
	}
}

/// A reminder to insert
#[derive(Debug, Insertable)]
#[diesel(table_name = reminders)]
pub(crate) struct NewReminder<'a> {
	/// Who to remind
	pub(crate) user_id: u64,
	/// Where the reminder was set
	pub(crate) server_id: Option<u64>,
	/// Where to send the reminder
	pub(crate) channel_id: u64,
	/// When to send it, in UTC
	pub(crate) at: NaiveDateTime,
	/// What to remind
	pub(crate) message: &'a str,
}

impl NewReminder<'_> {
	/// Insert the reminder
	pub(crate) fn insert(&self) -> Insert<'_, reminders::table, Self> {
		diesel::insert_into(reminders::table).values(self)
	}
}

/// A command invocation to log
#[derive(Debug, Insertable)]
#[diesel(table_name = command_log)]
pub(crate) struct NewCommandLog<'a> {
	/// The invoker
	pub(crate) user_id: u64,
	/// Where it was invoked
	pub(crate) channel_id: u64,
	/// The guild, if any
	pub(crate) server_id: Option<u64>,
	/// The invocation text
	pub(crate) command: &'a str,
}

impl NewCommandLog<'_> {
	/// Insert the log line
	pub(crate) fn insert(&self) -> Insert<'_, command_log::table, Self> {
		diesel::insert_into(command_log::table).values(self)
	}
}

/// What a [`Ban`] targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub(crate) enum BanKind {
	/// A single user
	#[name = "user"]
	User,
	/// A whole guild
	#[name = "server"]
	Server,
	/// A single channel
	#[name = "channel"]
	Channel,
}

impl BanKind {
	/// The stored representation
	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			Self::User => "user",
			Self::Server => "server",
			Self::Channel => "channel",
		}
	}
}

/// A banned user, guild or channel
#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = bans)]
#[diesel(check_for_backend(Mysql))]
pub(crate) struct Ban {
	/// The banned id
	pub(crate) id: u64,
	/// `user`, `server` or `channel`
	pub(crate) kind: String,
	/// Why
	pub(crate) reason: String,
	/// When
	pub(crate) banned_at: NaiveDateTime,
}

impl Ban {
	/// Whether any of the given ids is banned
	pub(crate) async fn any_of(
		connection: &mut DatabasePooledConnection,
		ids: &[u64],
	) -> QueryResult<bool> {
		diesel::select(dsl::exists(bans::table.filter(bans::id.eq_any(ids))))
			.get_result(connection)
			.await
	}

	/// Select the ban with the given id
	pub(crate) fn with_id(id: u64) -> dsl::Find<bans::table, u64> {
		bans::table.find(id)
	}
}

/// A ban to insert
#[derive(Debug, Insertable)]
#[diesel(table_name = bans)]
pub(crate) struct NewBan<'a> {
	/// The banned id
	pub(crate) id: u64,
	/// `user`, `server` or `channel`
	pub(crate) kind: &'a str,
	/// Why
	pub(crate) reason: &'a str,
}

impl NewBan<'_> {
	/// Insert the ban
	pub(crate) fn insert(&self) -> Insert<'_, bans::table, Self> {
		diesel::insert_into(bans::table).values(self)
	}
}

/// A vote to insert
#[derive(Debug, Insertable)]
#[diesel(table_name = votes)]
pub(crate) struct NewVote {
	/// The voter
	pub(crate) user_id: u64,
	/// The guild the vote was matched with
	pub(crate) server_id: Option<u64>,
}

impl NewVote {
	/// Insert the vote
	pub(crate) fn insert(&self) -> Insert<'_, votes::table, Self> {
		diesel::insert_into(votes::table).values(self)
	}
}

/// A feed subscription posting to a channel
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = subscriptions)]
#[diesel(check_for_backend(Mysql))]
pub(crate) struct Subscription {
	/// The row id
	pub(crate) id: i32,
	/// The guild
	pub(crate) server_id: u64,
	/// Where to post
	pub(crate) channel_id: u64,
	/// Who subscribed
	pub(crate) user_id: u64,
	/// The feed kind, e.g. `reddit`
	pub(crate) kind: String,
	/// The feed specific data, e.g. `r/aww/new`
	pub(crate) data: String,
	/// Posts older than this were already sent
	pub(crate) last_check: NaiveDateTime,
}

impl Subscription {
	/// Every subscription posting to the channel
	pub(crate) fn all_from_channel(
		channel_id: ChannelId,
	) -> dsl::Filter<subscriptions::table, dsl::Eq<subscriptions::channel_id, u64>> {
		subscriptions::table.filter(subscriptions::channel_id.eq(channel_id.get()))
	}

	/// Select the subscription with the given id
	pub(crate) fn with_id(id: i32) -> dsl::Find<subscriptions::table, i32> {
		subscriptions::table.find(id)
	}

	/// Every subscription
	pub(crate) async fn all(connection: &mut DatabasePooledConnection) -> QueryResult<Vec<Self>> {
		subscriptions::table
			.select(Self::as_select())
			.load(connection)
			.await
	}

	/// Remember that posts up to `at` were sent
	pub(crate) async fn touch(
		connection: &mut DatabasePooledConnection,
		id: i32,
		at: NaiveDateTime,
	) -> QueryResult<usize> {
		diesel::update(Self::with_id(id))
			.set(subscriptions::last_check.eq(at))
			.execute(connection)
			.await
	}
}

/// A subscription to insert
#[derive(Debug, Insertable)]
#[diesel(table_name = subscriptions)]
pub(crate) struct NewSubscription<'a> {
	/// The guild
	pub(crate) server_id: u64,
	/// Where to post
	pub(crate) channel_id: u64,
	/// Who subscribed
	pub(crate) user_id: u64,
	/// The feed kind
	pub(crate) kind: &'a str,
	/// The feed specific data
	pub(crate) data: &'a str,
}

impl NewSubscription<'_> {
	/// Insert the subscription
	pub(crate) fn insert(&self) -> Insert<'_, subscriptions::table, Self> {
		diesel::insert_into(subscriptions::table).values(self)
	}
}

/// A song guess attempt to insert
#[derive(Debug, Insertable)]
#[diesel(table_name = song_guesses)]
pub(crate) struct NewSongGuess<'a> {
	/// The guesser
	pub(crate) user_id: u64,
	/// Where the guess was sent
	pub(crate) channel_id: u64,
	/// The guild
	pub(crate) server_id: u64,
	/// The raw guess
	pub(crate) guess: &'a str,
	/// The song being played
	pub(crate) song: &'a str,
	/// Whether the guess won
	pub(crate) correct: bool,
	/// Time since the song started
	pub(crate) elapsed_ms: u64,
}

impl NewSongGuess<'_> {
	/// Insert the guess
	pub(crate) fn insert(&self) -> Insert<'_, song_guesses::table, Self> {
		diesel::insert_into(song_guesses::table).values(self)
	}
}

/// A persisted copy of a queued song
#[derive(Debug, Insertable)]
#[diesel(table_name = music_queue)]
pub(crate) struct NewQueuedSong<'a> {
	/// The guild
	pub(crate) server_id: u64,
	/// Who asked for the song
	pub(crate) requester_id: u64,
	/// The song title
	pub(crate) title: &'a str,
	/// Where the song comes from
	pub(crate) uri: &'a str,
	/// The song length, `None` for streams
	pub(crate) length_ms: Option<u64>,
}

/// Queries on the persisted music queue
pub(crate) struct MusicQueue;

impl MusicQueue {
	/// Persist queued songs
	pub(crate) async fn push(
		connection: &mut DatabasePooledConnection,
		songs: &[NewQueuedSong<'_>],
	) -> QueryResult<usize> {
		diesel::insert_into(music_queue::table)
			.values(songs)
			.execute(connection)
			.await
	}

	/// Forget every queued song of the guild
	pub(crate) async fn clear(
		connection: &mut DatabasePooledConnection,
		guild_id: GuildId,
	) -> QueryResult<usize> {
		diesel::delete(music_queue::table.filter(music_queue::server_id.eq(guild_id.get())))
			.execute(connection)
			.await
	}
}
