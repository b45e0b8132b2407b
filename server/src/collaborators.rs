//! Trait-at-the-seam boundary for everything outside the core: account
//! authentication, character persistence, and domain event publishing.
//! The core never references a concrete collaborator type, only these
//! traits, so a real database or auth provider can be swapped in without
//! touching `commands`, `tick`, or `net`.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::CollaboratorError;

/// A character record as loaded from the (external) character repository.
#[derive(Debug, Clone)]
pub struct CharacterRecord {
    pub id: Uuid,
    pub account_id: Uuid,
    pub name: String,
    pub class: String,
    pub pos_x: f32,
    pub pos_y: f32,
}

/// Given a bearer token, returns the verified account id or an error.
/// Concrete shape: [`HttpAuthenticator`] delegates to the sibling
/// `auth-server` crate's `/verify` endpoint.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, token: &str) -> Result<Uuid, CollaboratorError>;
}

/// Loads a character owned by an account, and persists its last-known
/// position. Durable storage and its schema are out of scope for this
/// crate; [`InMemoryCharacterRepository`] is enough to run and test the
/// service end to end.
#[async_trait]
pub trait CharacterRepository: Send + Sync {
    async fn get_for_account(
        &self,
        account_id: Uuid,
        character_id: Uuid,
    ) -> Result<CharacterRecord, CollaboratorError>;

    async fn update_position(
        &self,
        account_id: Uuid,
        character_id: Uuid,
        x: f32,
        y: f32,
        zone_id: &str,
    ) -> Result<(), CollaboratorError>;
}

/// Fire-and-forget domain event sink.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, subject: &str, payload: &[u8]) -> Result<(), CollaboratorError>;
}

/// Calls the sibling `auth-server`'s `POST /verify` over `reqwest`, the
/// same HTTP client the collaborator crate itself uses.
pub struct HttpAuthenticator {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAuthenticator {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

#[derive(serde::Serialize)]
struct VerifyRequest<'a> {
    token: &'a str,
}

#[derive(serde::Deserialize)]
struct VerifyResponse {
    user_id: String,
}

#[async_trait]
impl Authenticator for HttpAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<Uuid, CollaboratorError> {
        let resp = self
            .client
            .post(format!("{}/verify", self.base_url))
            .json(&VerifyRequest { token })
            .send()
            .await
            .map_err(|e| CollaboratorError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(CollaboratorError::AuthFailed(format!(
                "auth-server responded {}",
                resp.status()
            )));
        }

        let body: VerifyResponse = resp
            .json()
            .await
            .map_err(|e| CollaboratorError::Transport(e.to_string()))?;

        Uuid::parse_str(&body.user_id)
            .map_err(|e| CollaboratorError::AuthFailed(format!("non-uuid user_id: {e}")))
    }
}

/// In-process stand-in for durable character storage, seeded with a
/// handful of demo characters so `join`/persist-on-disconnect can be
/// exercised without a real database.
pub struct InMemoryCharacterRepository {
    characters: RwLock<HashMap<Uuid, CharacterRecord>>,
}

impl InMemoryCharacterRepository {
    pub fn new() -> Self {
        Self {
            characters: RwLock::new(HashMap::new()),
        }
    }

    /// Seeds (or overwrites) a character record. Used at startup to seed
    /// demo accounts, and by tests.
    pub fn seed(&self, character: CharacterRecord) {
        self.characters.write().insert(character.id, character);
    }
}

impl Default for InMemoryCharacterRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CharacterRepository for InMemoryCharacterRepository {
    async fn get_for_account(
        &self,
        account_id: Uuid,
        character_id: Uuid,
    ) -> Result<CharacterRecord, CollaboratorError> {
        match self.characters.read().get(&character_id) {
            Some(c) if c.account_id == account_id => Ok(c.clone()),
            Some(_) => Err(CollaboratorError::Forbidden),
            None => Err(CollaboratorError::NotFound),
        }
    }

    async fn update_position(
        &self,
        account_id: Uuid,
        character_id: Uuid,
        x: f32,
        y: f32,
        _zone_id: &str,
    ) -> Result<(), CollaboratorError> {
        match self.characters.write().get_mut(&character_id) {
            Some(c) if c.account_id == account_id => {
                c.pos_x = x;
                c.pos_y = y;
                Ok(())
            }
            Some(_) => Err(CollaboratorError::Forbidden),
            None => Err(CollaboratorError::NotFound),
        }
    }
}

/// Logs the subject and payload size; fire-and-forget, never fails.
pub struct LoggingEventPublisher;

#[async_trait]
impl EventPublisher for LoggingEventPublisher {
    async fn publish(&self, subject: &str, payload: &[u8]) -> Result<(), CollaboratorError> {
        log::info!("event published: subject={} bytes={}", subject, payload.len());
        Ok(())
    }
}
