use sqlx::{PgConnection, PgPool, postgres::PgPoolOptions};

use crate::{Result, schema};

pub struct Db {
	pub pool: PgPool,
}
impl Db {
	pub async fn connect(cfg: &tally_config::Postgres) -> Result<Self> {
		let pool =
			PgPoolOptions::new().max_connections(cfg.pool_max_conns).connect(&cfg.dsn).await?;

		Ok(Self { pool })
	}

	/// Creates missing tables and seeds categories into an empty category table.
	pub async fn ensure_schema(&self, seed: &[String]) -> Result<()> {
		let sql = schema::render_schema();
		let lock_id: i64 = 7_410_221;
		// Advisory locks are held per connection. Use a single transaction so the lock is scoped to
		// one connection and automatically released when the transaction ends.
		let mut tx = self.pool.begin().await?;

		sqlx::query("SELECT pg_advisory_xact_lock($1)").bind(lock_id).execute(&mut *tx).await?;

		for statement in sql.split(';') {
			let trimmed = statement.trim();

			if trimmed.is_empty() {
				continue;
			}

			sqlx::query(trimmed).execute(&mut *tx).await?;
		}

		let seeded = seed_categories(&mut tx, seed).await?;

		tx.commit().await?;

		if seeded > 0 {
			tracing::info!(seeded, "Seeded categories.");
		}

		Ok(())
	}
}

async fn seed_categories(conn: &mut PgConnection, seed: &[String]) -> Result<u64> {
	let existing: i64 =
		sqlx::query_scalar("SELECT count(*) FROM categories").fetch_one(&mut *conn).await?;

	if existing > 0 {
		return Ok(0);
	}

	let mut seeded = 0;

	for name in seed {
		seeded += sqlx::query("INSERT INTO categories (name) VALUES ($1) ON CONFLICT DO NOTHING")
			.bind(name.as_str())
			.execute(&mut *conn)
			.await?
			.rows_affected();
	}

	Ok(seeded)
}
