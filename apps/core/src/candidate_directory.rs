use rusqlite::{params, OptionalExtension, Row};

use crate::model::{normalize_routing_key, CandidateRegistration, HandlerCandidate, Owner};
use crate::store::{Store, StoreError};

const SELECT_CANDIDATE: &str = "SELECT candidate_id, routing_key, owner_id, description, command_template, updated_at FROM candidates";

/// Every handler ever registered for a routing key.
#[derive(Debug, Clone)]
pub struct CandidateDirectory {
    store: Store,
}

impl CandidateDirectory {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Candidates for `routing_key`, most recently updated first.
    pub async fn list(&self, routing_key: &str) -> Result<Vec<HandlerCandidate>, StoreError> {
        let key = normalize_routing_key(routing_key);
        self.store
            .run(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "{SELECT_CANDIDATE} WHERE routing_key = ?1 ORDER BY updated_at DESC, rowid DESC"
                ))?;
                let rows = stmt.query_map(params![key], candidate_from_row)?;
                rows.collect()
            })
            .await
    }

    pub async fn get(&self, candidate_id: &str) -> Result<Option<HandlerCandidate>, StoreError> {
        let candidate_id = candidate_id.to_string();
        self.store
            .run(move |conn| {
                conn.query_row(
                    &format!("{SELECT_CANDIDATE} WHERE candidate_id = ?1"),
                    params![candidate_id],
                    candidate_from_row,
                )
                .optional()
            })
            .await
    }

    /// Inserts a candidate, or refreshes the one with the same id (a reinstall).
    pub async fn register(
        &self,
        registration: CandidateRegistration,
    ) -> Result<HandlerCandidate, StoreError> {
        let candidate = HandlerCandidate {
            candidate_id: registration.candidate_id,
            routing_key: normalize_routing_key(&registration.routing_key),
            owner: registration.owner,
            description: registration.description,
            command_template: registration.command_template,
            updated_at: self.store.now_millis(),
        };
        let row = candidate.clone();
        self.store
            .run(move |conn| {
                conn.execute(
                    "INSERT INTO candidates (candidate_id, routing_key, owner_id, description, command_template, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(candidate_id) DO UPDATE SET
                        routing_key = excluded.routing_key,
                        owner_id = excluded.owner_id,
                        description = excluded.description,
                        command_template = excluded.command_template,
                        updated_at = excluded.updated_at",
                    params![
                        row.candidate_id,
                        row.routing_key,
                        row.owner.to_column(),
                        row.description,
                        row.command_template,
                        row.updated_at
                    ],
                )
            })
            .await?;
        Ok(candidate)
    }
}

fn candidate_from_row(row: &Row<'_>) -> Result<HandlerCandidate, rusqlite::Error> {
    Ok(HandlerCandidate {
        candidate_id: row.get(0)?,
        routing_key: row.get(1)?,
        owner: Owner::from_column(row.get(2)?),
        description: row.get(3)?,
        command_template: row.get(4)?,
        updated_at: row.get(5)?,
    })
}
