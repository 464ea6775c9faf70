//! Database repository for players and matches.

use chrono::Utc;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use drones_game::{Match, MatchStatus, NewMatch, Player};
use tracing::{debug, info, instrument, warn};

use crate::db::{
    DbError, DbErrorKind, MatchChangeset, MatchRow, NewMatchRow, NewPlayerRow, PlayerRow, schema,
};

/// Schema migrations compiled into the binary.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Milliseconds SQLite waits on a locked database before failing.
const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Synchronous repository over one SQLite file.
///
/// Every call opens its own connection, so the repository is cheap to
/// clone and safe to use from blocking worker threads.
#[derive(Debug, Clone)]
pub struct ArenaRepository {
    db_path: String,
}

impl ArenaRepository {
    /// Creates a repository for the database at the given path.
    ///
    /// The file is created on first connection if it does not exist.
    #[instrument(skip(db_path))]
    pub fn new(db_path: impl Into<String>) -> Self {
        let db_path = db_path.into();
        info!(path = %db_path, "Creating ArenaRepository");
        Self { db_path }
    }

    /// Path this repository connects to.
    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    #[instrument(skip(self))]
    fn connection(&self) -> Result<SqliteConnection, DbError> {
        debug!(path = %self.db_path, "Establishing connection");
        let mut conn = SqliteConnection::establish(&self.db_path).map_err(|e| {
            DbError::new(
                DbErrorKind::Connection,
                format!("Failed to connect to '{}': {}", self.db_path, e),
            )
        })?;
        conn.batch_execute(&format!(
            "PRAGMA busy_timeout = {}; PRAGMA foreign_keys = ON;",
            BUSY_TIMEOUT_MS
        ))?;
        Ok(conn)
    }

    /// Applies any pending migrations and returns how many ran.
    ///
    /// # Errors
    ///
    /// Returns [`DbErrorKind::Migration`] if a migration fails.
    #[instrument(skip(self))]
    pub fn run_migrations(&self) -> Result<usize, DbError> {
        let mut conn = self.connection()?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| DbError::new(DbErrorKind::Migration, format!("Migration failed: {}", e)))?;
        info!(count = applied.len(), "Migrations applied");
        Ok(applied.len())
    }

    /// Inserts a player with zeroed counters.
    ///
    /// # Errors
    ///
    /// Returns [`DbErrorKind::UniqueViolation`] if the name is taken.
    #[instrument(skip(self))]
    pub fn create_player(&self, name: &str) -> Result<Player, DbError> {
        debug!(name, "Creating player");
        let mut conn = self.connection()?;

        let row = diesel::insert_into(schema::players::table)
            .values(&NewPlayerRow::new(name.to_string()))
            .returning(PlayerRow::as_returning())
            .get_result::<PlayerRow>(&mut conn)
            .map_err(|e| match DbError::from(e) {
                err if err.kind == DbErrorKind::UniqueViolation => DbError::new(
                    DbErrorKind::UniqueViolation,
                    format!("Player name '{}' is already registered", name),
                ),
                err => err,
            })?;

        info!(player_id = row.id(), name = %row.name(), "Player created");
        Ok(row.into())
    }

    /// Gets a player by id. Returns `None` if not found.
    #[instrument(skip(self))]
    pub fn player_by_id(&self, id: i32) -> Result<Option<Player>, DbError> {
        let mut conn = self.connection()?;
        let row = schema::players::table
            .find(id)
            .select(PlayerRow::as_select())
            .first::<PlayerRow>(&mut conn)
            .optional()?;
        debug!(found = row.is_some(), "Player lookup by id");
        Ok(row.map(Player::from))
    }

    /// Gets a player by exact name. Returns `None` if not found.
    #[instrument(skip(self))]
    pub fn player_by_name(&self, name: &str) -> Result<Option<Player>, DbError> {
        let mut conn = self.connection()?;
        let row = schema::players::table
            .filter(schema::players::name.eq(name))
            .select(PlayerRow::as_select())
            .first::<PlayerRow>(&mut conn)
            .optional()?;
        debug!(found = row.is_some(), "Player lookup by name");
        Ok(row.map(Player::from))
    }

    /// Lists all players in registration order.
    #[instrument(skip(self))]
    pub fn list_players(&self) -> Result<Vec<Player>, DbError> {
        let mut conn = self.connection()?;
        let rows = schema::players::table
            .order(schema::players::id.asc())
            .select(PlayerRow::as_select())
            .load::<PlayerRow>(&mut conn)?;
        debug!(count = rows.len(), "Players loaded");
        Ok(rows.into_iter().map(Player::from).collect())
    }

    /// Adds one to a player's win counter.
    ///
    /// Returns `false` if no player has this id.
    #[instrument(skip(self))]
    pub fn increment_wins(&self, id: i32) -> Result<bool, DbError> {
        use schema::players::dsl;
        let mut conn = self.connection()?;
        let changed = diesel::update(dsl::players.find(id))
            .set(dsl::wins.eq(dsl::wins + 1))
            .execute(&mut conn)?;
        debug!(changed, "Win recorded");
        Ok(changed > 0)
    }

    /// Adds one to a player's loss counter.
    ///
    /// Returns `false` if no player has this id.
    #[instrument(skip(self))]
    pub fn increment_losses(&self, id: i32) -> Result<bool, DbError> {
        use schema::players::dsl;
        let mut conn = self.connection()?;
        let changed = diesel::update(dsl::players.find(id))
            .set(dsl::losses.eq(dsl::losses + 1))
            .execute(&mut conn)?;
        debug!(changed, "Loss recorded");
        Ok(changed > 0)
    }

    /// Inserts a new ONGOING match.
    #[instrument(skip(self, initial), fields(player_a = initial.player_a(), player_b = initial.player_b()))]
    pub fn create_match(&self, initial: &NewMatch) -> Result<Match, DbError> {
        let mut conn = self.connection()?;
        let row = diesel::insert_into(schema::matches::table)
            .values(&NewMatchRow::from(initial))
            .returning(MatchRow::as_returning())
            .get_result::<MatchRow>(&mut conn)?;
        info!(match_id = row.id(), "Match row created");
        row.into_match()
    }

    /// Gets a match by id. Returns `None` if not found.
    #[instrument(skip(self))]
    pub fn match_by_id(&self, id: i32) -> Result<Option<Match>, DbError> {
        let mut conn = self.connection()?;
        schema::matches::table
            .find(id)
            .select(MatchRow::as_select())
            .first::<MatchRow>(&mut conn)
            .optional()?
            .map(MatchRow::into_match)
            .transpose()
    }

    /// Finds a non-finished match between the two players, in either order.
    #[instrument(skip(self))]
    pub fn active_match_between(&self, a: i32, b: i32) -> Result<Option<Match>, DbError> {
        use schema::matches::dsl;
        let mut conn = self.connection()?;
        let rows = dsl::matches
            .filter(dsl::status.ne(MatchStatus::Finished.to_string()))
            .filter(
                dsl::player_a
                    .eq(a)
                    .and(dsl::player_b.eq(b))
                    .or(dsl::player_a.eq(b).and(dsl::player_b.eq(a))),
            )
            .order(dsl::id.asc())
            .select(MatchRow::as_select())
            .load::<MatchRow>(&mut conn)?;

        if rows.len() > 1 {
            warn!(count = rows.len(), "Pair has several active matches");
        }
        rows.into_iter().next().map(MatchRow::into_match).transpose()
    }

    /// Replaces the mutable columns of a match with `state`.
    ///
    /// Returns `None` if the match no longer exists.
    #[instrument(skip(self, state))]
    pub fn update_match(&self, id: i32, state: &Match) -> Result<Option<Match>, DbError> {
        let changeset = MatchChangeset::capture(state, Utc::now().naive_utc())?;
        let mut conn = self.connection()?;
        let row = diesel::update(schema::matches::table.find(id))
            .set(&changeset)
            .returning(MatchRow::as_returning())
            .get_result::<MatchRow>(&mut conn)
            .optional()?;
        match row {
            Some(row) => {
                debug!(status = %row.status(), "Match row updated");
                row.into_match().map(Some)
            }
            None => {
                warn!("Update target missing");
                Ok(None)
            }
        }
    }

    /// Lists every match a player took part in, oldest first.
    #[instrument(skip(self))]
    pub fn matches_for_player(&self, player: i32) -> Result<Vec<Match>, DbError> {
        use schema::matches::dsl;
        let mut conn = self.connection()?;
        let rows = dsl::matches
            .filter(dsl::player_a.eq(player).or(dsl::player_b.eq(player)))
            .order(dsl::id.asc())
            .select(MatchRow::as_select())
            .load::<MatchRow>(&mut conn)?;
        debug!(count = rows.len(), "Player matches loaded");
        rows.into_iter().map(MatchRow::into_match).collect()
    }

    /// Lists every match, oldest first.
    #[instrument(skip(self))]
    pub fn list_matches(&self) -> Result<Vec<Match>, DbError> {
        let mut conn = self.connection()?;
        let rows = schema::matches::table
            .order(schema::matches::id.asc())
            .select(MatchRow::as_select())
            .load::<MatchRow>(&mut conn)?;
        debug!(count = rows.len(), "Matches loaded");
        rows.into_iter().map(MatchRow::into_match).collect()
    }
}
