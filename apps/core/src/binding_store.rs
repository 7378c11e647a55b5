use rusqlite::{params, OptionalExtension, Row};
use tracing::warn;

use crate::model::{normalize_routing_key, HandlerBinding, Owner};
use crate::store::{Store, StoreError};

const SELECT_BINDING: &str = "SELECT routing_key, candidate_id, owner_id, last_checked_at, previous_candidate_id FROM bindings";

/// Persisted routing key -> chosen candidate mapping.
#[derive(Debug, Clone)]
pub struct BindingStore {
    store: Store,
}

impl BindingStore {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Storage failures read as "unbound"; they are logged, never raised.
    pub async fn lookup(&self, routing_key: &str) -> Option<HandlerBinding> {
        match self.try_lookup(routing_key).await {
            Ok(binding) => binding,
            Err(error) => {
                warn!(routing_key, %error, "binding lookup failed; treating key as unbound");
                None
            }
        }
    }

    pub async fn try_lookup(&self, routing_key: &str) -> Result<Option<HandlerBinding>, StoreError> {
        let key = normalize_routing_key(routing_key);
        self.store
            .run(move |conn| {
                conn.query_row(
                    &format!("{SELECT_BINDING} WHERE routing_key = ?1"),
                    params![key],
                    binding_from_row,
                )
                .optional()
            })
            .await
    }

    /// Binds `routing_key` to `candidate_id`, keeping the replaced candidate as
    /// `previous_candidate_id`. Re-applying the same binding only refreshes
    /// `last_checked_at`.
    pub async fn upsert(
        &self,
        routing_key: &str,
        candidate_id: &str,
        owner: &Owner,
    ) -> Result<(), StoreError> {
        let key = normalize_routing_key(routing_key);
        let candidate_id = candidate_id.to_string();
        let owner_id = owner.to_column().map(str::to_string);
        let now = self.store.now_millis();
        self.store
            .run(move |conn| {
                conn.execute(
                    "INSERT INTO bindings (routing_key, candidate_id, owner_id, last_checked_at, previous_candidate_id)
                     VALUES (?1, ?2, ?3, ?4, NULL)
                     ON CONFLICT(routing_key) DO UPDATE SET
                        previous_candidate_id = CASE
                            WHEN bindings.candidate_id <> excluded.candidate_id THEN bindings.candidate_id
                            ELSE bindings.previous_candidate_id
                        END,
                        candidate_id = excluded.candidate_id,
                        owner_id = excluded.owner_id,
                        last_checked_at = excluded.last_checked_at",
                    params![key, candidate_id, owner_id, now],
                )
            })
            .await?;
        Ok(())
    }

    /// Refreshes `last_checked_at` without changing the bound candidate.
    pub async fn touch(&self, routing_key: &str) -> Result<(), StoreError> {
        let key = normalize_routing_key(routing_key);
        let now = self.store.now_millis();
        self.store
            .run(move |conn| {
                conn.execute(
                    "UPDATE bindings SET last_checked_at = ?2 WHERE routing_key = ?1",
                    params![key, now],
                )
            })
            .await?;
        Ok(())
    }

    pub async fn remove(&self, routing_key: &str) -> Result<(), StoreError> {
        let key = normalize_routing_key(routing_key);
        self.store
            .run(move |conn| conn.execute("DELETE FROM bindings WHERE routing_key = ?1", params![key]))
            .await?;
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<HandlerBinding>, StoreError> {
        self.store
            .run(|conn| {
                let mut stmt = conn.prepare(&format!("{SELECT_BINDING} ORDER BY routing_key"))?;
                let rows = stmt.query_map([], binding_from_row)?;
                rows.collect()
            })
            .await
    }
}

fn binding_from_row(row: &Row<'_>) -> Result<HandlerBinding, rusqlite::Error> {
    Ok(HandlerBinding {
        routing_key: row.get(0)?,
        candidate_id: row.get(1)?,
        owner: Owner::from_column(row.get(2)?),
        last_checked_at: row.get(3)?,
        previous_candidate_id: row.get(4)?,
    })
}
