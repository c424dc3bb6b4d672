use crate::common::{FaceRollError, Result, StoreConfig};
use crate::core::embedding::{
    l2_normalize, similarity_from_distance, validate_embedding, Embedding, Gallery, EMBEDDING_DIM,
};
use crate::storage::database::{page_offset, violated_constraint, Constraint, Database};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// An enrolled person together with the embedding used to recognise them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub identity_id: String,
    pub display_name: String,
    pub reference_image_path: String,
    pub embedding: Embedding,
}

/// The human-readable part of an [`Identity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySummary {
    pub identity_id: String,
    pub display_name: String,
    pub reference_image_path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimilarIdentity {
    pub identity: Identity,
    pub distance: f32,
    pub similarity: f32,
}

/// Sort keys accepted by [`IdentityStore::list`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderBy {
    Name,
    Id,
}

impl OrderBy {
    fn order_clause(self) -> &'static str {
        match self {
            OrderBy::Name => "display_name, identity_id",
            OrderBy::Id => "identity_id",
        }
    }
}

impl FromStr for OrderBy {
    type Err = FaceRollError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "name" | "display_name" | "student_name" => Ok(OrderBy::Name),
            "id" | "identity_id" | "student_id" => Ok(OrderBy::Id),
            other => Err(FaceRollError::InvalidArgument(format!(
                "Invalid order_by column '{}'. Must be one of name, id", other
            ))),
        }
    }
}

#[derive(Clone)]
pub struct IdentityStore {
    db: Database,
    normalize: bool,
}

impl IdentityStore {
    pub fn new(db: Database, config: &StoreConfig) -> Self {
        Self {
            db,
            normalize: config.normalize_embeddings,
        }
    }

    fn prepare_vector(&self, embedding: &[f32]) -> Result<Embedding> {
        validate_embedding(embedding)?;
        if self.normalize {
            l2_normalize(embedding)
        } else {
            Ok(embedding.to_vec())
        }
    }

    /// Inserts the identity row and its vector in one transaction.
    pub fn enroll(&self, identity: &Identity) -> Result<()> {
        let vector = self.prepare_vector(&identity.embedding)?;
        let blob = encode_vector(&vector)?;

        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO identities (identity_id, display_name, reference_image_path) VALUES (?1, ?2, ?3)",
            params![identity.identity_id, identity.display_name, identity.reference_image_path],
        )
        .map_err(|e| match violated_constraint(&e) {
            Some(Constraint::Key) => {
                tracing::warn!("Failed to enroll identity. ID '{}' already exists.", identity.identity_id);
                FaceRollError::DuplicateId(identity.identity_id.clone())
            }
            _ => e.into(),
        })?;

        tx.execute(
            "INSERT INTO identity_embeddings (identity_id, dimension, vector) VALUES (?1, ?2, ?3)",
            params![identity.identity_id, vector.len() as i64, blob],
        )?;

        tx.commit()?;
        tracing::info!("Enrolled identity: {} ({})", identity.display_name, identity.identity_id);
        Ok(())
    }

    pub fn list(&self, order_by: OrderBy, page: u32, page_size: u32) -> Result<Vec<IdentitySummary>> {
        let (limit, offset) = page_offset(page, page_size)?;
        let sql = format!(
            "SELECT identity_id, display_name, reference_image_path FROM identities ORDER BY {} LIMIT ?1 OFFSET ?2",
            order_by.order_clause()
        );

        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![limit, offset], |row| {
                Ok(IdentitySummary {
                    identity_id: row.get(0)?,
                    display_name: row.get(1)?,
                    reference_image_path: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn get(&self, identity_id: &str) -> Result<Option<Identity>> {
        let conn = self.db.lock()?;
        let row = conn
            .query_row(
                "SELECT i.identity_id, i.display_name, i.reference_image_path, e.vector
                 FROM identities i JOIN identity_embeddings e ON e.identity_id = i.identity_id
                 WHERE i.identity_id = ?1",
                params![identity_id],
                read_identity_row,
            )
            .optional()?;

        row.map(|(summary, blob)| into_identity(summary, &blob)).transpose()
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.db.lock()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM identities", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Deletes an identity and its vector. Identities with attendance events are kept.
    pub fn remove(&self, identity_id: &str) -> Result<bool> {
        let conn = self.db.lock()?;
        let deleted = conn
            .execute("DELETE FROM identities WHERE identity_id = ?1", params![identity_id])
            .map_err(|e| match violated_constraint(&e) {
                Some(Constraint::ForeignKey) => {
                    tracing::warn!("Refusing to remove identity '{}': attendance events reference it", identity_id);
                    FaceRollError::IdentityReferenced(identity_id.to_string())
                }
                _ => e.into(),
            })?;

        if deleted > 0 {
            tracing::info!("Removed identity: {}", identity_id);
        }
        Ok(deleted > 0)
    }

    /// Exact k-nearest-neighbour search over every enrolled vector, most similar first.
    pub fn find_similar(&self, query: &[f32], k: usize) -> Result<Vec<SimilarIdentity>> {
        let query = self.prepare_vector(query)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let rows = {
            let conn = self.db.lock()?;
            let mut stmt = conn.prepare(
                "SELECT i.identity_id, i.display_name, i.reference_image_path, e.vector
                 FROM identities i JOIN identity_embeddings e ON e.identity_id = i.identity_id
                 ORDER BY i.rowid",
            )?;
            let rows = stmt
                .query_map([], read_identity_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        let identities = rows
            .into_iter()
            .map(|(summary, blob)| into_identity(summary, &blob))
            .collect::<Result<Vec<_>>>()?;
        let vectors: Vec<Embedding> = identities.iter().map(|i| i.embedding.clone()).collect();
        let gallery = Gallery::from_rows(&vectors)?;

        Ok(gallery
            .nearest(&query, k)?
            .into_iter()
            .map(|(idx, distance)| SimilarIdentity {
                identity: identities[idx].clone(),
                distance,
                similarity: similarity_from_distance(distance),
            })
            .collect())
    }
}

fn read_identity_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(IdentitySummary, Vec<u8>)> {
    Ok((
        IdentitySummary {
            identity_id: row.get(0)?,
            display_name: row.get(1)?,
            reference_image_path: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        },
        row.get(3)?,
    ))
}

fn into_identity(summary: IdentitySummary, blob: &[u8]) -> Result<Identity> {
    let embedding = decode_vector(blob).map_err(|e| {
        FaceRollError::StoreUnavailable(format!(
            "Corrupt vector for identity {}: {}", summary.identity_id, e
        ))
    })?;
    Ok(Identity {
        identity_id: summary.identity_id,
        display_name: summary.display_name,
        reference_image_path: summary.reference_image_path,
        embedding,
    })
}

fn encode_vector(vector: &[f32]) -> Result<Vec<u8>> {
    bincode::serialize(vector)
        .map_err(|e| FaceRollError::StoreUnavailable(format!("Failed to serialize vector: {}", e)))
}

fn decode_vector(blob: &[u8]) -> std::result::Result<Embedding, String> {
    let vector: Embedding = bincode::deserialize(blob).map_err(|e| e.to_string())?;
    if vector.len() != EMBEDDING_DIM {
        return Err(format!("expected {} dimensions, found {}", EMBEDDING_DIM, vector.len()));
    }
    Ok(vector)
}
