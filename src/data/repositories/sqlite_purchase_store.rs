//! SQLite-backed purchase ledger.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::domain::entities::purchase::{ContributionRecord, PurchaseKind};
use crate::domain::repositories::purchase_store::PurchaseStore;
use crate::errors::StoreError;

/// Resident connections kept open between requests, plus how many extra may
/// be opened under load before callers queue. Matches the pool shape the
/// service has always run with.
const POOL_SIZE: usize = 5;
const POOL_OVERFLOW: usize = 10;

const SCHEMA: &str = r#"
    -- Purchase ledger, one row per acquisition event.
    CREATE TABLE IF NOT EXISTS app_purchases (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        app_id INTEGER NOT NULL,
        identifier TEXT NOT NULL,
        kind INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS app_purchases_lookup
        ON app_purchases (app_id, identifier);

    -- Products sold inside apps.
    CREATE TABLE IF NOT EXISTS inapp_products (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        guid TEXT NOT NULL UNIQUE
    );

    -- Contributions backing in-app purchases.
    CREATE TABLE IF NOT EXISTS contributions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        kind INTEGER NOT NULL,
        inapp_product_id INTEGER REFERENCES inapp_products (id)
    );
"#;

enum Backing {
    File(PathBuf),
    Memory,
}

pub struct SqlitePurchaseStore {
    backing: Backing,
    permits: Semaphore,
    idle: Mutex<Vec<Connection>>,
}

impl SqlitePurchaseStore {
    /// Open or create the ledger database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch(SCHEMA)?;
        info!(path = %path.as_ref().display(), "opened purchase database");
        Ok(Self {
            backing: Backing::File(path.as_ref().to_path_buf()),
            permits: Semaphore::new(POOL_SIZE + POOL_OVERFLOW),
            idle: Mutex::new(vec![conn]),
        })
    }

    /// In-memory ledger for tests and local runs. Distinct in-memory
    /// connections would each see their own empty database, so this pool
    /// holds exactly one connection.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            backing: Backing::Memory,
            permits: Semaphore::new(1),
            idle: Mutex::new(vec![conn]),
        })
    }

    /// Records an acquisition event. Lookups take the latest row.
    pub async fn insert_app_purchase(
        &self,
        app_id: i64,
        identifier: &str,
        kind: PurchaseKind,
    ) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO app_purchases (app_id, identifier, kind) VALUES (?1, ?2, ?3)",
                params![app_id, identifier, kind.code()],
            )
            .map(|_| ())
        })
        .await
    }

    /// Registers an in-app product, returning its row id.
    pub async fn insert_inapp_product(&self, guid: &str) -> Result<i64, StoreError> {
        self.with_conn(move |conn| {
            conn.execute("INSERT INTO inapp_products (guid) VALUES (?1)", params![guid])?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Records a contribution, optionally linked to an in-app product.
    pub async fn insert_contribution(
        &self,
        kind: PurchaseKind,
        inapp_product_id: Option<i64>,
    ) -> Result<i64, StoreError> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO contributions (kind, inapp_product_id) VALUES (?1, ?2)",
                params![kind.code(), inapp_product_id],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn with_conn<T>(
        &self,
        job: impl FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    ) -> Result<T, StoreError> {
        let _permit = self.permits.acquire().await.map_err(|_| StoreError::Pool)?;
        let conn = match self.pop_idle() {
            Some(conn) => conn,
            None => self.open_overflow()?,
        };
        let result = job(&conn);
        self.push_idle(conn);
        result.map_err(StoreError::from)
    }

    fn pop_idle(&self) -> Option<Connection> {
        match self.idle.lock() {
            Ok(mut idle) => idle.pop(),
            Err(poisoned) => poisoned.into_inner().pop(),
        }
    }

    fn push_idle(&self, conn: Connection) {
        let mut idle = match self.idle.lock() {
            Ok(idle) => idle,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Overflow connections close on drop.
        if idle.len() < POOL_SIZE {
            idle.push(conn);
        }
    }

    fn open_overflow(&self) -> Result<Connection, StoreError> {
        match &self.backing {
            Backing::File(path) => {
                debug!("opening overflow connection");
                Ok(Connection::open(path)?)
            }
            // The in-memory pool has one permit; a second connection can
            // never be requested.
            Backing::Memory => Err(StoreError::Pool),
        }
    }
}

#[async_trait]
impl PurchaseStore for SqlitePurchaseStore {
    async fn app_purchase(
        &self,
        app_id: i64,
        identifier: &str,
    ) -> Result<Option<PurchaseKind>, StoreError> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT kind FROM app_purchases
                 WHERE app_id = ?1 AND identifier = ?2
                 ORDER BY id DESC LIMIT 1",
                params![app_id, identifier],
                |row| row.get::<_, i64>(0),
            )
            .optional()
        })
        .await
        .map(|code| code.map(PurchaseKind::from_code))
    }

    async fn contribution(
        &self,
        contribution_id: i64,
    ) -> Result<Option<ContributionRecord>, StoreError> {
        let row = self
            .with_conn(move |conn| {
                conn.query_row(
                    "SELECT c.kind, p.guid FROM contributions c
                     LEFT JOIN inapp_products p ON p.id = c.inapp_product_id
                     WHERE c.id = ?1",
                    params![contribution_id],
                    |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?)),
                )
                .optional()
            })
            .await?;
        Ok(row.map(|(kind, inapp_guid)| ContributionRecord {
            kind: PurchaseKind::from_code(kind),
            inapp_guid,
        }))
    }

    async fn probe(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id FROM app_purchases ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get::<_, i64>(0),
            )
            .optional()
        })
        .await
        .map(|_| ())
    }
}
