pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("TALLY_PG_DSN is not a valid Postgres DSN.")]
	Dsn(#[source] sqlx::Error),

	#[error("No admin database accepted a connection ({failures}).")]
	NoAdminDatabase { failures: String },

	/// A `CREATE DATABASE`, `DROP DATABASE`, or cleanup connection failed.
	#[error("Failed to {action} test database {name}.")]
	Admin { action: &'static str, name: String, source: sqlx::Error },

	#[error(transparent)]
	Storage(#[from] tally_storage::Error),
}
