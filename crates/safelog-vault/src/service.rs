//! Custody service: approval-gated access to the vault for external
//! origins.
//!
//! External callers never touch the vault directly. They submit a request,
//! which parks in a pending table until the approval UI resolves it; on
//! approval the service runs the vault operation with the cached session
//! password and delivers the result through a oneshot channel. A request
//! the user never responds to stays pending forever; callers must not
//! assume it resolves. Dropping the service (or rejecting) closes the
//! channel and the waiting caller observes a rejection.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use safelog_core::keywrap::SessionKey;
use safelog_proto::{LegacyCiphertext, WrappedKey};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::error::ServiceError;
use crate::store::VaultStore;
use crate::vault::Vault;

/// How long a cached session password stays valid.
pub const SESSION_TTL: Duration = Duration::from_secs(60 * 60);

/// What an external origin is asking for.
#[derive(Debug)]
pub enum Request {
    /// Approve this origin for future requests.
    Connect,
    /// Sign a message with the active account.
    Sign(Vec<u8>),
    /// Decrypt a direct-encrypted payload.
    Decrypt(LegacyCiphertext),
    /// Unwrap one session key.
    UnwrapSessionKey(WrappedKey),
    /// Unwrap a batch of session keys with per-item isolation.
    UnwrapManySessionKeys(Vec<WrappedKey>),
}

/// The result delivered to an approved requester.
#[derive(Debug)]
pub enum Response {
    /// The origin is now connected.
    Connected,
    /// Signature bytes.
    Signature(Vec<u8>),
    /// Decrypted payload.
    Plaintext(Vec<u8>),
    /// One unwrapped session key.
    SessionKey(SessionKey),
    /// Batch results, `None` per failed item.
    SessionKeys(Vec<Option<SessionKey>>),
}

/// What the approval UI shows for one pending request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDescriptor {
    /// Request id.
    pub id: String,
    /// Requesting origin.
    pub origin: String,
    /// Short request kind label.
    pub kind: &'static str,
}

/// A parked request awaiting user approval.
///
/// Await [`Ticket::wait`] to receive the outcome. There is no timeout.
#[derive(Debug)]
pub struct Ticket {
    /// Request id, for correlating with the approval UI.
    pub request_id: String,
    receiver: oneshot::Receiver<Result<Response, ServiceError>>,
}

impl Ticket {
    /// Wait for the approval UI to resolve this request.
    ///
    /// A dropped service or an unresponsive rejection both surface as
    /// [`ServiceError::Rejected`].
    pub async fn wait(self) -> Result<Response, ServiceError> {
        self.receiver.await.map_err(|_| ServiceError::Rejected)?
    }
}

struct Pending {
    descriptor: PendingDescriptor,
    request: Request,
    responder: oneshot::Sender<Result<Response, ServiceError>>,
}

struct Session {
    password: Zeroizing<String>,
    last_active: Instant,
}

/// Approval-gated vault frontend.
///
/// Single-writer like everything else in this stack; the host event loop
/// serializes all calls.
pub struct CustodyService<S: VaultStore> {
    vault: Vault<S>,
    permissions: HashSet<String>,
    pending: HashMap<String, Pending>,
    session: Option<Session>,
}

impl<S: VaultStore> CustodyService<S> {
    /// Service over a vault with no connected origins.
    pub fn new(vault: Vault<S>) -> Self {
        Self { vault, permissions: HashSet::new(), pending: HashMap::new(), session: None }
    }

    /// The wrapped vault, for host-side (non-origin) operations.
    pub fn vault_mut(&mut self) -> &mut Vault<S> {
        &mut self.vault
    }

    /// Whether an origin has been approved.
    pub fn is_connected(&self, origin: &str) -> bool {
        self.permissions.contains(origin)
    }

    /// Unlock the vault and cache the password for [`SESSION_TTL`].
    pub fn unlock_with_session(&mut self, password: &str) -> Result<(), ServiceError> {
        self.vault.unlock(password)?;
        self.session = Some(Session {
            password: Zeroizing::new(password.to_string()),
            last_active: Instant::now(),
        });
        Ok(())
    }

    /// Lock the vault and purge the cached password.
    pub fn lock(&mut self) {
        self.vault.lock();
        self.session = None;
    }

    /// Check session validity after a service restart.
    ///
    /// An expired session purges the cached password and locks the vault;
    /// the user must re-enter it. Returns whether the session survived.
    pub fn resume(&mut self) -> Result<bool, ServiceError> {
        let Some(session) = self.session.as_ref() else {
            return Ok(false);
        };
        if session.last_active.elapsed() > SESSION_TTL {
            info!("session expired, vault locked");
            self.lock();
            return Ok(false);
        }
        let password = session.password.clone();
        self.vault.unlock(&password)?;
        Ok(true)
    }

    /// Refresh the session expiry clock on user activity.
    pub fn touch(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.last_active = Instant::now();
        }
    }

    /// Submit a request on behalf of an origin.
    ///
    /// Everything except [`Request::Connect`] requires the origin to be
    /// connected already. The returned [`Ticket`] resolves when the
    /// approval UI calls [`CustodyService::approve`] or
    /// [`CustodyService::reject`] and not before.
    pub fn submit(&mut self, origin: &str, request: Request) -> Result<Ticket, ServiceError> {
        if !matches!(request, Request::Connect) && !self.is_connected(origin) {
            return Err(ServiceError::PermissionDenied(origin.to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let (responder, receiver) = oneshot::channel();
        let kind = match &request {
            Request::Connect => "connect",
            Request::Sign(_) => "sign",
            Request::Decrypt(_) => "decrypt",
            Request::UnwrapSessionKey(_) => "unwrap",
            Request::UnwrapManySessionKeys(_) => "unwrap-many",
        };
        debug!(id, origin, kind, "request parked for approval");

        self.pending.insert(
            id.clone(),
            Pending {
                descriptor: PendingDescriptor {
                    id: id.clone(),
                    origin: origin.to_string(),
                    kind,
                },
                request,
                responder,
            },
        );
        Ok(Ticket { request_id: id, receiver })
    }

    /// Requests awaiting a user decision, for the approval UI.
    pub fn pending_requests(&self) -> Vec<PendingDescriptor> {
        self.pending.values().map(|p| p.descriptor.clone()).collect()
    }

    /// Approve a pending request and run its vault operation.
    pub fn approve(&mut self, request_id: &str) -> Result<(), ServiceError> {
        let pending = self
            .pending
            .remove(request_id)
            .ok_or_else(|| ServiceError::UnknownRequest(request_id.to_string()))?;

        let outcome = self.execute(&pending.descriptor.origin, pending.request);
        if pending.responder.send(outcome).is_err() {
            // Requester gave up waiting; nothing to deliver to.
            warn!(request_id, "approved request had no waiting caller");
        }
        self.touch();
        Ok(())
    }

    /// Reject a pending request.
    pub fn reject(&mut self, request_id: &str) -> Result<(), ServiceError> {
        let pending = self
            .pending
            .remove(request_id)
            .ok_or_else(|| ServiceError::UnknownRequest(request_id.to_string()))?;
        let _ = pending.responder.send(Err(ServiceError::Rejected));
        Ok(())
    }

    fn execute(&mut self, origin: &str, request: Request) -> Result<Response, ServiceError> {
        if let Request::Connect = request {
            self.permissions.insert(origin.to_string());
            info!(origin, "origin connected");
            return Ok(Response::Connected);
        }

        let password = self
            .session
            .as_ref()
            .map(|s| s.password.clone())
            .ok_or(ServiceError::NoSession)?;

        let response = match request {
            Request::Connect => unreachable!("handled above"),
            Request::Sign(message) => {
                Response::Signature(self.vault.sign(&message, &password)?)
            }
            Request::Decrypt(ciphertext) => {
                Response::Plaintext(self.vault.decrypt(&ciphertext, &password)?)
            }
            Request::UnwrapSessionKey(wrapped) => {
                Response::SessionKey(self.vault.unwrap_session_key(&wrapped, &password)?)
            }
            Request::UnwrapManySessionKeys(wrapped) => Response::SessionKeys(
                self.vault.unwrap_many_session_keys(&wrapped, &password)?,
            ),
        };
        Ok(response)
    }
}

/// Expiry override used by restart tests.
#[cfg(test)]
impl<S: VaultStore> CustodyService<S> {
    fn backdate_session(&mut self, age: Duration) {
        if let Some(session) = self.session.as_mut() {
            session.last_active = Instant::now() - age;
        }
    }
}
