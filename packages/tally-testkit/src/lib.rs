mod contended;
mod error;

pub use contended::ContendedStore;
pub use error::{Error, Result};

use std::{env, str::FromStr, thread};

use sqlx::{
	ConnectOptions, Connection, Executor,
	postgres::{PgConnectOptions, PgConnection},
};
use time::{OffsetDateTime, macros::datetime};
use tokio::runtime::Builder;
use uuid::Uuid;

use tally_storage::db::Db;

/// Databases tried, in order, for `CREATE DATABASE` and `DROP DATABASE`.
const ADMIN_DATABASES: [&str; 2] = ["postgres", "template1"];

/// A throwaway Postgres database that is dropped on cleanup or, failing that, on drop.
pub struct TestDatabase {
	name: String,
	dsn: String,
	admin: PgConnectOptions,
	dropped: bool,
}
impl TestDatabase {
	pub async fn new(base_dsn: &str) -> Result<Self> {
		let base = PgConnectOptions::from_str(base_dsn).map_err(Error::Dsn)?;
		let (admin, mut conn) = connect_admin(&base).await?;
		let name = format!("tally_test_{}", Uuid::new_v4().simple());

		conn.execute(format!(r#"CREATE DATABASE "{name}""#).as_str())
			.await
			.map_err(admin_error("create", &name))?;

		let dsn = base.database(&name).to_url_lossy().to_string();

		Ok(Self { name, dsn, admin, dropped: false })
	}

	/// Postgres settings pointing at this database.
	pub fn postgres_config(&self, pool_max_conns: u32) -> tally_config::Postgres {
		tally_config::Postgres { dsn: self.dsn.clone(), pool_max_conns }
	}

	/// Connects a store with the schema applied and `seed` categories present.
	pub async fn open_store(&self, pool_max_conns: u32, seed: &[&str]) -> Result<Db> {
		let db = Db::connect(&self.postgres_config(pool_max_conns)).await?;
		let seed = seed.iter().map(|name| name.to_string()).collect::<Vec<_>>();

		db.ensure_schema(&seed).await?;

		Ok(db)
	}

	pub async fn cleanup(mut self) -> Result<()> {
		drop_database(&self.name, &self.admin).await?;

		self.dropped = true;

		Ok(())
	}
}
impl Drop for TestDatabase {
	fn drop(&mut self) {
		if self.dropped {
			return;
		}

		let name = self.name.clone();
		let admin = self.admin.clone();
		// Drop may run inside a runtime, so the cleanup gets a runtime of its own.
		let worker = thread::spawn(move || {
			let result = Builder::new_current_thread()
				.enable_all()
				.build()
				.map_err(|err| err.to_string())
				.and_then(|runtime| {
					runtime.block_on(drop_database(&name, &admin)).map_err(|err| err.to_string())
				});

			if let Err(err) = result {
				eprintln!("Leaked test database {name}: {err}");
			}
		});
		let _ = worker.join();
	}
}

pub fn env_dsn() -> Option<String> {
	env::var("TALLY_PG_DSN").ok()
}

/// A fixed instant so that stored timestamps are predictable in assertions.
pub fn fixed_now() -> OffsetDateTime {
	datetime!(2025-05-01 09:00 UTC)
}

async fn connect_admin(base: &PgConnectOptions) -> Result<(PgConnectOptions, PgConnection)> {
	let mut failures = Vec::new();

	for database in ADMIN_DATABASES {
		let options = base.clone().database(database);

		match PgConnection::connect_with(&options).await {
			Ok(conn) => return Ok((options, conn)),
			Err(err) => failures.push(format!("{database}: {err}")),
		}
	}

	Err(Error::NoAdminDatabase { failures: failures.join("; ") })
}

async fn drop_database(name: &str, admin: &PgConnectOptions) -> Result<()> {
	let mut conn = PgConnection::connect_with(admin).await.map_err(admin_error("reach", name))?;

	// Pool connections left by a failed test would block the drop.
	let _ = sqlx::query(
		"\
SELECT pg_terminate_backend(pid)
FROM pg_stat_activity
WHERE datname = $1 AND pid <> pg_backend_pid()",
	)
	.bind(name)
	.fetch_all(&mut conn)
	.await;

	conn.execute(format!(r#"DROP DATABASE IF EXISTS "{name}""#).as_str())
		.await
		.map_err(admin_error("drop", name))?;

	Ok(())
}

fn admin_error<'a>(action: &'static str, name: &'a str) -> impl FnOnce(sqlx::Error) -> Error + 'a {
	move |source| Error::Admin { action, name: name.to_string(), source }
}
