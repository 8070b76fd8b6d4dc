use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, info};

use crate::error::Result;
use crate::models::{Critic, Movie, NewReview, Review, SaveSummary, StoreStats};

/// SQLite-backed cache of movies, critics and reviews
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if missing) the database at `database_url`
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        info!(url = database_url, "Connected to SQLite");

        Ok(Self { pool })
    }

    /// Private in-memory database, already migrated
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // Every pooled connection to :memory: is a separate database, so pin one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;

        info!("Database migrations complete");

        Ok(())
    }

    /// Whether a movie with exactly this title is cached
    pub async fn has_movie(&self, title: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM movies WHERE title = ?")
            .bind(title)
            .fetch_one(&self.pool)
            .await?;

        Ok(count > 0)
    }

    /// First cached movie with exactly this title
    pub async fn find_movie_by_title(&self, title: &str) -> Result<Option<Movie>> {
        let row = sqlx::query("SELECT id, title FROM movies WHERE title = ? ORDER BY rowid LIMIT 1")
            .bind(title)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| Movie {
            id: row.get("id"),
            title: row.get("title"),
        }))
    }

    /// All reviews stored for a movie, oldest first
    pub async fn reviews_for_movie(&self, movie_id: &str) -> Result<Vec<Review>> {
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.movie_id, c.name AS critic, c.publication,
                   r.fresh, r.original_score, r.quote, r.url, r.date
            FROM reviews r
            JOIN critics c ON c.id = r.critic_id
            WHERE r.movie_id = ?
            ORDER BY r.id
            "#,
        )
        .bind(movie_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(review_from_row).collect())
    }

    /// Save a movie and all of its reviews in one transaction.
    ///
    /// Critics are matched by name, and by publication too when the review
    /// carries one; critics created earlier in the same call are reused. A movie
    /// id that is already stored keeps its existing row and reviews, and nothing
    /// is written.
    pub async fn save_movie(&self, movie: &Movie, reviews: &[NewReview]) -> Result<SaveSummary> {
        let mut tx = self.pool.begin().await?;
        let mut summary = SaveSummary::default();

        let inserted =
            sqlx::query("INSERT INTO movies (id, title) VALUES (?, ?) ON CONFLICT (id) DO NOTHING")
                .bind(&movie.id)
                .bind(&movie.title)
                .execute(&mut *tx)
                .await?
                .rows_affected();

        if inserted == 0 {
            tx.rollback().await?;
            debug!(id = %movie.id, "Movie already stored, skipping reviews");
            return Ok(summary);
        }

        for review in reviews {
            let critic_id =
                match find_critic(&mut tx, &review.critic, review.publication.as_deref()).await? {
                    Some(critic) => critic.id,
                    None => {
                        summary.critics_created += 1;
                        sqlx::query("INSERT INTO critics (name, publication) VALUES (?, ?)")
                            .bind(&review.critic)
                            .bind(&review.publication)
                            .execute(&mut *tx)
                            .await?
                            .last_insert_rowid()
                    }
                };

            sqlx::query(
                r#"
                INSERT INTO reviews (
                    movie_id, critic_id, fresh, original_score, quote, url, date
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&movie.id)
            .bind(critic_id)
            .bind(review.fresh)
            .bind(&review.original_score)
            .bind(&review.quote)
            .bind(&review.url)
            .bind(review.date)
            .execute(&mut *tx)
            .await?;

            summary.reviews += 1;
        }

        tx.commit().await?;

        debug!(
            id = %movie.id,
            reviews = summary.reviews,
            critics_created = summary.critics_created,
            "Saved movie to store"
        );

        Ok(summary)
    }

    /// Row counts per table
    pub async fn stats(&self) -> Result<StoreStats> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM movies) AS movies,
                (SELECT COUNT(*) FROM critics) AS critics,
                (SELECT COUNT(*) FROM reviews) AS reviews
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(StoreStats {
            movies: row.get::<i64, _>("movies") as u64,
            critics: row.get::<i64, _>("critics") as u64,
            reviews: row.get::<i64, _>("reviews") as u64,
        })
    }
}

async fn find_critic(
    conn: &mut SqliteConnection,
    name: &str,
    publication: Option<&str>,
) -> Result<Option<Critic>> {
    let row = match publication {
        Some(publication) => {
            sqlx::query(
                "SELECT id, name, publication FROM critics \
                 WHERE name = ? AND publication = ? ORDER BY id LIMIT 1",
            )
            .bind(name)
            .bind(publication)
            .fetch_optional(&mut *conn)
            .await?
        }
        None => {
            sqlx::query("SELECT id, name, publication FROM critics WHERE name = ? ORDER BY id LIMIT 1")
                .bind(name)
                .fetch_optional(&mut *conn)
                .await?
        }
    };

    Ok(row.map(|row| Critic {
        id: row.get("id"),
        name: row.get("name"),
        publication: row.get("publication"),
    }))
}

fn review_from_row(row: &SqliteRow) -> Review {
    Review {
        id: row.get("id"),
        movie_id: row.get("movie_id"),
        critic: row.get("critic"),
        publication: row.get("publication"),
        fresh: row.get("fresh"),
        original_score: row.get("original_score"),
        quote: row.get("quote"),
        url: row.get("url"),
        date: row.get("date"),
    }
}
