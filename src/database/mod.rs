//! Database connection, models and migrations

use anyhow::{anyhow, Context};
use diesel::{Connection, MysqlConnection};
use diesel_async::{
	pooled_connection::deadpool::{Object, Pool},
	AsyncMysqlConnection,
};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

pub(crate) mod models;
pub(crate) mod schema;

/// The migrations bundled in the binary
const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// A pool of async `MySQL` connections
pub(crate) type DatabasePool = Pool<AsyncMysqlConnection>;
/// A connection taken from the [`DatabasePool`]
pub(crate) type DatabasePooledConnection = Object<AsyncMysqlConnection>;

/// Everything needed to write queries
pub(crate) mod prelude {
	pub(crate) use diesel::{
		BoolExpressionMethods, ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper,
	};
	pub(crate) use diesel_async::RunQueryDsl;
}

/// Run every pending migration on a dedicated synchronous connection
pub(crate) fn run_migrations(database_url: &str) -> anyhow::Result<()> {
	let mut connection =
		MysqlConnection::establish(database_url).context("failed to connect to database")?;

	let applied = connection
		.run_pending_migrations(MIGRATIONS)
		.map_err(|error| anyhow!(error))?;

	for migration in applied {
		tracing::info!("applied migration `{}`", migration);
	}

	Ok(())
}
