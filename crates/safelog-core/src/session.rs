//! Session-key cache and envelope protocol.
//!
//! One [`Messenger`] instance holds the per-process session state: raw
//! session keys by session id and the active session for each conversation
//! partner or group channel. Keys live in memory only; a restart starts
//! cold and repopulates from the key-establishment payloads carried in
//! history.

use std::collections::HashMap;

use rand::{CryptoRng, RngCore};
use safelog_crypto::KeyEncapsulation;
use safelog_proto::{
    Address, DirectoryEntry, Envelope, KeyPayload, Payload, VERSION_DIRECT, VERSION_GROUP,
    WrappedKey,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::SessionError;
use crate::keywrap::{self, SessionKey};

/// The far side of a conversation: a 1:1 partner or a group channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PeerId {
    /// A 1:1 conversation partner.
    Peer(Address),
    /// A group channel.
    Channel(String),
}

/// A message pulled from the transport, with the addressing the envelope
/// itself does not carry.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// The opaque `content` string.
    pub content: String,
    /// Who sent it.
    pub sender: Address,
    /// Which conversation it belongs to.
    pub peer: PeerId,
}

/// Outcome of decrypting one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decrypted {
    /// Decrypted plaintext.
    Plain(Vec<u8>),
    /// No key material for this party yet; may resolve once the
    /// establishment message arrives or on manual retry.
    Pending,
    /// Undecodable or failed authentication; this message is lost.
    Failed,
}

/// Session-key cache plus the send and receive paths of the envelope
/// protocol.
///
/// Single-writer by design: one logical caller drives it, so interior
/// mutability is unnecessary. Generic over the KEM so wallet-bound and
/// post-quantum identities share one protocol implementation.
pub struct Messenger<K: KeyEncapsulation> {
    kem: K,
    session_keys: HashMap<String, SessionKey>,
    active_sessions: HashMap<PeerId, String>,
}

impl<K: KeyEncapsulation> Messenger<K> {
    /// Empty cache over the given KEM.
    pub fn new(kem: K) -> Self {
        Self { kem, session_keys: HashMap::new(), active_sessions: HashMap::new() }
    }

    /// Number of cached session keys.
    pub fn cached_sessions(&self) -> usize {
        self.session_keys.len()
    }

    /// The active session id for a peer, if one is established.
    pub fn active_session(&self, peer: &PeerId) -> Option<&str> {
        self.active_sessions.get(peer).map(String::as_str)
    }

    /// Drop the active session for a peer so the next send establishes a
    /// fresh key.
    ///
    /// The old key stays cached for decrypting history. Call this when a
    /// channel's membership changes or a previously keyless member gains a
    /// key; the protocol never re-wraps an old session retroactively.
    pub fn rotate_session(&mut self, peer: &PeerId) {
        if let Some(sid) = self.active_sessions.remove(peer) {
            debug!(?peer, sid, "session rotated");
        }
    }

    /// Encrypt a 1:1 message, establishing a session on first send.
    ///
    /// `own_kem_public` lets the sender wrap the key for themselves so they
    /// can decrypt their own sent history; when absent only the recipient
    /// entry is attached. Returns the transport `content` string.
    pub fn send_direct<R: RngCore + CryptoRng>(
        &mut self,
        plaintext: &[u8],
        peer: &DirectoryEntry,
        own_kem_public: Option<&str>,
        rng: &mut R,
    ) -> Result<String, SessionError> {
        let recipient_public = peer
            .kem_public_key
            .as_deref()
            .ok_or_else(|| SessionError::MissingPublicKey(peer.address.clone()))?;

        let peer_id = PeerId::Peer(peer.address.clone());
        let (sid, keys) = match self.lookup_active(&peer_id) {
            Some(sid) => (sid, None),
            None => {
                let sid = Uuid::new_v4().to_string();
                let key = SessionKey::generate(rng);
                let recip = keywrap::wrap(&self.kem, &key, recipient_public, rng)?;
                let sender = match own_kem_public {
                    Some(own) => Some(keywrap::wrap(&self.kem, &key, own, rng)?),
                    None => None,
                };
                debug!(sid, peer = %peer.address, "direct session established");
                self.cache(sid.clone(), key, Some(&peer_id));
                (sid, Some(KeyPayload::Direct { recip, sender }))
            }
        };

        self.emit(VERSION_DIRECT, sid, keys, plaintext, rng)
    }

    /// Encrypt a group message, establishing a channel session on first
    /// send.
    ///
    /// On establishment the session key is wrapped once per member that has
    /// a KEM public key; members without one are skipped with a warning and
    /// cannot decrypt this session (rotate when they gain a key). The
    /// sender should appear in `members` to be able to read their own
    /// history.
    pub fn send_group<R: RngCore + CryptoRng>(
        &mut self,
        plaintext: &[u8],
        channel: &str,
        members: &[DirectoryEntry],
        rng: &mut R,
    ) -> Result<String, SessionError> {
        let peer_id = PeerId::Channel(channel.to_string());
        let (sid, keys) = match self.lookup_active(&peer_id) {
            Some(sid) => (sid, None),
            None => {
                let sid = Uuid::new_v4().to_string();
                let key = SessionKey::generate(rng);

                let mut wrapped = std::collections::BTreeMap::new();
                for member in members {
                    let Some(public) = member.kem_public_key.as_deref() else {
                        warn!(channel, member = %member.address, "member has no KEM key, skipped");
                        continue;
                    };
                    let blob = keywrap::wrap(&self.kem, &key, public, rng)?;
                    wrapped.insert(member.address.clone(), blob);
                }
                debug!(sid, channel, members = wrapped.len(), "group session established");
                self.cache(sid.clone(), key, Some(&peer_id));
                (sid, Some(KeyPayload::Group(wrapped)))
            }
        };

        self.emit(VERSION_GROUP, sid, keys, plaintext, rng)
    }

    /// Decrypt one incoming message.
    ///
    /// Cached session first; otherwise the key-establishment payload is
    /// consulted for the entry addressed to this party (by role for 1:1, by
    /// address for groups), unwrapped with `own_kem_private`, and cached.
    /// No applicable entry is [`SessionError::KeyNotFound`]: recoverable,
    /// the key may arrive in a later message. Legacy sessionless messages
    /// decrypt directly, nothing is cached for them.
    pub fn receive(
        &mut self,
        content: &str,
        own_address: &Address,
        sender_address: &Address,
        own_kem_private: &[u8],
    ) -> Result<Vec<u8>, SessionError> {
        let envelope = match Envelope::decode(content)? {
            Payload::Session(envelope) => envelope,
            Payload::Legacy(legacy) => {
                return keywrap::open_direct(&self.kem, &legacy, own_kem_private);
            }
        };

        if let Some(key) = self.session_keys.get(&envelope.sid) {
            return keywrap::open_with_session_key(&envelope.ct, key);
        }

        let blob = select_own_entry(&envelope, own_address, sender_address)
            .ok_or(SessionError::KeyNotFound)?;
        let key = keywrap::unwrap(&self.kem, blob, own_kem_private)?;
        let plaintext = keywrap::open_with_session_key(&envelope.ct, &key)?;

        // Only a direct envelope establishes the active 1:1 session for its
        // sender; a group session key is shared by the whole channel and
        // must never key a private conversation. The envelope does not
        // carry its channel id, so group promotion happens in batch_load
        // where the caller supplies the PeerId.
        let peer = (envelope.v == VERSION_DIRECT && own_address != sender_address)
            .then(|| PeerId::Peer(sender_address.clone()));
        self.cache(envelope.sid, key, peer.as_ref());
        Ok(plaintext)
    }

    /// [`Messenger::receive`] with `KeyNotFound` surfaced as
    /// [`Decrypted::Pending`] instead of an error.
    pub fn receive_lossy(
        &mut self,
        content: &str,
        own_address: &Address,
        sender_address: &Address,
        own_kem_private: &[u8],
    ) -> Decrypted {
        match self.receive(content, own_address, sender_address, own_kem_private) {
            Ok(plaintext) => Decrypted::Plain(plaintext),
            Err(SessionError::KeyNotFound) => Decrypted::Pending,
            Err(_) => Decrypted::Failed,
        }
    }

    /// Decrypt a batch of conversation history.
    ///
    /// Asymmetric work is bounded by the number of distinct sessions, not
    /// messages: one representative wrapped blob is collected per uncached
    /// session id and unwrapped in a single batch, then every message whose
    /// session resolved is decrypted symmetrically. The most recent
    /// resolved session becomes the active one for its peer, so the next
    /// send reuses it.
    pub fn batch_load(
        &mut self,
        messages: &[IncomingMessage],
        own_address: &Address,
        own_kem_private: &[u8],
    ) -> Vec<Decrypted> {
        let decoded: Vec<Option<Payload>> =
            messages.iter().map(|m| Envelope::decode(&m.content).ok()).collect();

        // One representative blob per distinct uncached sid, first found wins.
        let mut sids: Vec<String> = Vec::new();
        let mut blobs: Vec<WrappedKey> = Vec::new();
        for (message, payload) in messages.iter().zip(&decoded) {
            let Some(Payload::Session(envelope)) = payload else { continue };
            if self.session_keys.contains_key(&envelope.sid)
                || sids.contains(&envelope.sid)
            {
                continue;
            }
            if let Some(blob) = select_own_entry(envelope, own_address, &message.sender) {
                sids.push(envelope.sid.clone());
                blobs.push(blob.clone());
            }
        }

        if !sids.is_empty() {
            debug!(sessions = sids.len(), "batch unwrap");
            let results = keywrap::unwrap_many(&self.kem, &blobs, own_kem_private);
            for (sid, result) in sids.iter().zip(results) {
                if let Some(key) = result {
                    self.session_keys.insert(sid.clone(), key);
                } else {
                    warn!(sid, "session key unwrap failed");
                }
            }
        }

        // Promote the most recent resolved session for its peer.
        for (message, payload) in messages.iter().zip(&decoded).rev() {
            let Some(Payload::Session(envelope)) = payload else { continue };
            if self.session_keys.contains_key(&envelope.sid) {
                self.active_sessions.insert(message.peer.clone(), envelope.sid.clone());
                break;
            }
        }

        decoded
            .iter()
            .map(|payload| match payload {
                None => Decrypted::Failed,
                Some(Payload::Legacy(legacy)) => {
                    match keywrap::open_direct(&self.kem, legacy, own_kem_private) {
                        Ok(plaintext) => Decrypted::Plain(plaintext),
                        Err(_) => Decrypted::Failed,
                    }
                }
                Some(Payload::Session(envelope)) => {
                    match self.session_keys.get(&envelope.sid) {
                        None => Decrypted::Pending,
                        Some(key) => match keywrap::open_with_session_key(&envelope.ct, key) {
                            Ok(plaintext) => Decrypted::Plain(plaintext),
                            Err(_) => Decrypted::Failed,
                        },
                    }
                }
            })
            .collect()
    }

    fn lookup_active(&self, peer: &PeerId) -> Option<String> {
        let sid = self.active_sessions.get(peer)?;
        // An active mapping without a cached key is stale (cleared cache);
        // treat it as absent so send re-establishes.
        self.session_keys.contains_key(sid).then(|| sid.clone())
    }

    fn cache(&mut self, sid: String, key: SessionKey, peer: Option<&PeerId>) {
        if let Some(peer) = peer {
            self.active_sessions.insert(peer.clone(), sid.clone());
        }
        self.session_keys.insert(sid, key);
    }

    fn emit<R: RngCore + CryptoRng>(
        &self,
        version: u8,
        sid: String,
        keys: Option<KeyPayload>,
        plaintext: &[u8],
        rng: &mut R,
    ) -> Result<String, SessionError> {
        let key = self.session_keys.get(&sid).ok_or(SessionError::KeyNotFound)?;
        let ct = safelog_crypto::seal(plaintext, key.as_bytes(), rng);
        Ok(Envelope { v: version, sid, keys, ct }.encode()?)
    }
}

/// Pick the wrapped-key entry addressed to this party, if any.
fn select_own_entry<'a>(
    envelope: &'a Envelope,
    own_address: &Address,
    sender_address: &Address,
) -> Option<&'a WrappedKey> {
    match envelope.keys.as_ref()? {
        KeyPayload::Direct { recip, sender } => {
            if own_address == sender_address { sender.as_ref() } else { Some(recip) }
        }
        KeyPayload::Group(members) => members.get(own_address),
    }
}
