//! Handles all the states of the bot and initial configuration

use crate::{
	database::DatabasePool,
	images::ImageFilterClient,
	music::MusicManager,
	polyfill,
	settings::SettingsCache,
	songguess::SongGuess,
	tasks::Tasks,
	translation::Translations,
	votes::VoteRegistry,
};
use anyhow::{anyhow, Context as _};
use diesel_async::{
	pooled_connection::{
		deadpool::{Pool, PoolError},
		AsyncDieselConnectionManager,
	},
	AsyncMysqlConnection,
};
use dotenvy::dotenv;
use poise::{
	async_trait,
	serenity_prelude::{self as serenity, GuildId},
	CreateReply, ReplyHandle,
};
use secrecy::{ExposeSecret, SecretString};
use songbird::Songbird;
use std::{
	env::{self, VarError},
	fmt,
	net::IpAddr,
	path::PathBuf,
	sync::Arc,
};
use unic_langid::LanguageIdentifier;

/// App global configuration
#[derive(Debug)]
pub(crate) struct Config {
	/// The token needed to access the `Discord` Api
	pub(crate) discord_token: SecretString,
	/// The guild on witch you can access development commands
	pub(crate) discord_development_guild: GuildId,
	/// The `MySQL` connection uri
	pub(crate) database_url: SecretString,
	/// The `NATS` server the image workers listen on
	pub(crate) nats_url: SecretString,

	/// The address the webhook server binds to
	pub(crate) server_address: IpAddr,
	/// The port the webhook server binds to
	pub(crate) server_port: u16,
	/// The shared secret sent by the vote webhook in the `Authorization` header
	pub(crate) vote_webhook_secret: SecretString,

	/// Where to fetch the song guess list from
	///
	/// The song guess game is disabled when unset
	pub(crate) song_list_url: Option<String>,
	/// The directory the song guess paths are relative to
	pub(crate) song_directory: PathBuf,

	/// The default locale to use
	pub(crate) default_locale: LanguageIdentifier,
	/// Whether or not to use production defaults
	///
	/// Currently only affects logging
	pub(crate) production: bool,
}

/// Resolve an environment variable or return an appropriate error
fn required_env_var(name: &str) -> anyhow::Result<String> {
	match env::var(name) {
		Ok(val) => Ok(val),
		Err(VarError::NotPresent) => Err(anyhow!("{} must be set in the environnement", name)),
		Err(VarError::NotUnicode(_)) => {
			Err(anyhow!("{} does not contains Unicode valid text", name))
		}
	}
}

impl Config {
	/// Parse the config from `.env` file
	fn from_dotenv() -> anyhow::Result<Self> {
		// Load the `.env` file ond error if not found
		dotenv()?;

		let discord_development_guild = required_env_var("DISCORD_DEV_GUILD")?
			.parse::<u64>()
			.map_err(|_| anyhow!("DISCORD_DEV_GUILD environnement variable must be a `u64`"))?;

		let production = env::var("PRODUCTION")
			.unwrap_or_else(|_| "false".into())
			.parse::<bool>()
			.map_err(|_| anyhow!("PRODUCTION environnement variable must be a `bool`"))?;

		let default_locale = required_env_var("DEFAULT_LOCALE")?
			.parse::<LanguageIdentifier>()
			.map_err(|_| {
				anyhow!("DEFAULT_LOCALE environnement variable must be a `LanguageIdentifier`")
			})?;

		let server_address = env::var("SERVER_ADDRESS")
			.unwrap_or_else(|_| "127.0.0.1".into())
			.parse::<IpAddr>()
			.map_err(|_| anyhow!("SERVER_ADDRESS environnement variable must be an ip address"))?;

		let server_port = env::var("SERVER_PORT")
			.unwrap_or_else(|_| "8000".into())
			.parse::<u16>()
			.map_err(|_| anyhow!("SERVER_PORT environnement variable must be a `u16`"))?;

		Ok(Self {
			discord_token: SecretString::from(required_env_var("DISCORD_TOKEN")?),
			discord_development_guild: GuildId::new(discord_development_guild),
			database_url: SecretString::from(required_env_var("DATABASE_URL")?),
			nats_url: SecretString::from(required_env_var("NATS_URL")?),

			server_address,
			server_port,
			vote_webhook_secret: SecretString::from(required_env_var("VOTE_WEBHOOK_SECRET")?),

			song_list_url: env::var("SONG_LIST_URL").ok(),
			song_directory: env::var("SONG_DIRECTORY")
				.unwrap_or_else(|_| "songs".into())
				.into(),

			default_locale,
			production,
		})
	}
}

/// App global data
pub(crate) struct Data {
	/// An access to the database
	pub(crate) database: DatabasePool,
	/// An instance of the parsed initial config
	pub(crate) config: Config,
	/// The translations for the client
	pub(crate) translations: Translations,
	/// The cached guild settings
	pub(crate) settings: SettingsCache,
	/// The long running tasks that should finish before a restart
	pub(crate) tasks: Tasks,
	/// A HTTP client for outgoing requests
	pub(crate) http: reqwest::Client,
	/// The voice manager
	pub(crate) songbird: Arc<Songbird>,
	/// The per guild music listeners
	pub(crate) music: MusicManager,
	/// The client of the image filter workers
	pub(crate) images: ImageFilterClient,
	/// The channels waiting for a vote
	pub(crate) votes: VoteRegistry,
	/// The song guess list and running games
	pub(crate) songguess: SongGuess,
}

impl fmt::Debug for Data {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Data")
			.field("config", &&self.config)
			.field("translations", &&self.translations)
			.field("tasks", &&self.tasks)
			.finish_non_exhaustive()
	}
}

impl Data {
	/// Parse the bot data from the environment and connect to the services
	pub(crate) async fn new() -> anyhow::Result<Self> {
		let config = Config::from_dotenv()?;

		let manager = AsyncDieselConnectionManager::<AsyncMysqlConnection>::new(
			config.database_url.expose_secret(),
		);
		let database = Pool::builder(manager)
			.build()
			.context("failed to create database pool")?;

		let translations = Translations::from_folder("translations", config.default_locale.clone())
			.context("failed to load translations")?;

		// Reddit refuses requests without a user agent
		let http = reqwest::Client::builder()
			.user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
			.build()
			.context("failed to create http client")?;

		let nats = async_nats::connect(config.nats_url.expose_secret().as_str())
			.await
			.context("failed to connect to the message queue")?;

		Ok(Self {
			database,
			translations,
			settings: SettingsCache::default(),
			tasks: Tasks::default(),
			http,
			songbird: Songbird::serenity(),
			music: MusicManager::default(),
			images: ImageFilterClient::new(nats),
			votes: VoteRegistry::default(),
			songguess: SongGuess::default(),
			config,
		})
	}

	/// Translate a message for a guild outside of any interaction context
	pub(crate) fn translate_for_guild(
		&self,
		guild_id: Option<GuildId>,
		key: &str,
		args: Option<fluent::FluentArgs>,
	) -> String {
		let language = self
			.settings
			.get(guild_id, crate::constants::settings::LANGUAGE);
		let locale = self.translations.resolve_locale([language.as_deref()]);

		self.translations.translate(&locale, key, args.as_ref())
	}
}

/// Trait for sending ephemeral messages
#[async_trait]
pub(crate) trait ApplicationContextPolyfill<'a>: Send + Sync {
	/// Send an ephemeral message to the user
	async fn shout(
		&self,
		content: impl Into<String> + Send,
	) -> Result<ReplyHandle<'_>, serenity::Error>;

	/// Get a [`GuildId`] in a `guild_only` interaction context
	///
	/// # Panics
	/// If used in a non `guild_only` interaction context
	fn guild_only_id(&self) -> GuildId;
}

#[async_trait]
impl<'a> ApplicationContextPolyfill<'a> for ApplicationContext<'a> {
	#[inline]
	async fn shout(
		&self,
		content: impl Into<String> + Send,
	) -> Result<ReplyHandle<'_>, serenity::Error> {
		poise::send_application_reply(
			*self,
			CreateReply::default().content(content).ephemeral(true),
		)
		.await
	}

	#[inline]
	fn guild_only_id(&self) -> GuildId {
		if self.command.guild_only {
			self.interaction.guild_id.expect("guild_only interactions")
		} else {
			panic!("Should be used only in guild_only interactions")
		}
	}
}

/// Trait for sending ephemeral messages
#[async_trait]
pub(crate) trait ContextPolyfill: Send + Sync {
	/// Send an ephemeral message to the user
	///
	/// Prefix invocations cannot be ephemeral and get a regular reply
	async fn shout(
		&self,
		content: impl Into<String> + Send,
	) -> Result<ReplyHandle<'_>, serenity::Error>;

	/// Get a [`GuildId`] in a `guild_only` command
	///
	/// # Panics
	/// If used in a non `guild_only` command
	fn guild_only_id(&self) -> GuildId;
}

#[async_trait]
impl ContextPolyfill for Context<'_> {
	#[inline]
	async fn shout(
		&self,
		content: impl Into<String> + Send,
	) -> Result<ReplyHandle<'_>, serenity::Error> {
		self.send(CreateReply::default().content(content).ephemeral(true))
			.await
	}

	#[inline]
	fn guild_only_id(&self) -> GuildId {
		if self.command().guild_only {
			self.guild_id().expect("guild_only commands")
		} else {
			panic!("Should be used only in guild_only commands")
		}
	}
}

/// Common wrapper for the [`Data`]
pub(crate) type ArcData = Arc<Data>;
/// Common interaction or event error type
pub(crate) type InteractionError = Error;
/// Common interaction or event return type
pub(crate) type InteractionResult = Result<(), InteractionError>;

/// A [`poise::Command`] type alias with our common types
pub(crate) type Command = poise::Command<ArcData, InteractionError>;
/// A [`poise::Context`] type alias with our common types, provided to each command
pub(crate) type Context<'a> = poise::Context<'a, ArcData, InteractionError>;
/// A [`poise::ApplicationContext`] type alias with our common types, provided to each slash command
pub(crate) type ApplicationContext<'a> = poise::ApplicationContext<'a, ArcData, InteractionError>;
/// A [`polyfill::MessageComponentContext`] type alias with our common types, provided to each message component interaction
pub(crate) type MessageComponentContext<'a> = polyfill::MessageComponentContext<'a, ArcData>;

/// A [`poise::Framework`] type alias with our common types
pub(crate) type Framework = poise::Framework<ArcData, InteractionError>;
/// A [`poise::FrameworkContext`] type alias with our common types
pub(crate) type FrameworkContext<'a> = poise::FrameworkContext<'a, ArcData, InteractionError>;
/// A [`poise::FrameworkError`] type alias with our common types
pub(crate) type FrameworkError<'a> = poise::FrameworkError<'a, ArcData, InteractionError>;

/// An error in an interaction or an event
#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
	/// A serenity error
	#[error(transparent)]
	Serenity(#[from] serenity::Error),
	/// A database error
	#[error(transparent)]
	Pool(#[from] PoolError),
	/// A diesel error
	#[error(transparent)]
	Diesel(#[from] diesel::result::Error),
	/// Could not join or leave a voice channel
	#[error(transparent)]
	Join(#[from] songbird::error::JoinError),
	/// Could not control a playing track
	#[error(transparent)]
	Control(#[from] songbird::error::ControlError),
	/// The message queue request failed
	#[error(transparent)]
	Queue(#[from] async_nats::RequestError),
	/// Collects any other general purpose error
	#[error(transparent)]
	Other(#[from] anyhow::Error),
}
