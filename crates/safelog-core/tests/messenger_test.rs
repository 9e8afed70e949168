//! End-to-end messenger scenarios over real ML-KEM keypairs.

use rand::SeedableRng;
use rand::rngs::StdRng;
use safelog_core::{Decrypted, IncomingMessage, Messenger, PeerId};
use safelog_crypto::{EciesKem, KeyPair, PqKem};
use safelog_proto::{Address, DirectoryEntry, Envelope, KeyPayload, Payload};

fn entry(address: &str, keys: &KeyPair) -> DirectoryEntry {
    DirectoryEntry::new(address, hex::encode(&keys.public))
}

#[test]
fn alice_and_bob_fresh_session() {
    let mut rng = StdRng::seed_from_u64(100);
    let alice_keys = PqKem::generate_keypair(&mut rng);
    let bob_keys = PqKem::generate_keypair(&mut rng);
    let alice_addr = Address::new("alice");
    let bob_addr = Address::new("bob");

    let mut alice = Messenger::new(PqKem);
    let mut bob = Messenger::new(PqKem);

    // First message creates a session and attaches {recip, sender}
    let alice_pub = hex::encode(&alice_keys.public);
    let first = alice
        .send_direct(b"hi", &entry("bob", &bob_keys), Some(alice_pub.as_str()), &mut rng)
        .unwrap();
    let Payload::Session(e1) = Envelope::decode(&first).unwrap() else {
        unreachable!()
    };
    assert!(matches!(e1.keys, Some(KeyPayload::Direct { sender: Some(_), .. })));

    // Bob unwraps via the recip entry and caches the session
    let plain = bob.receive(&first, &bob_addr, &alice_addr, &bob_keys.private).unwrap();
    assert_eq!(plain, b"hi");
    assert_eq!(bob.cached_sessions(), 1);

    // Second message carries no keys; Bob decrypts straight from cache
    let second = alice
        .send_direct(b"there", &entry("bob", &bob_keys), None, &mut rng)
        .unwrap();
    let Payload::Session(e2) = Envelope::decode(&second).unwrap() else {
        unreachable!()
    };
    assert_eq!(e2.sid, e1.sid);
    assert!(e2.keys.is_none());
    let plain = bob.receive(&second, &bob_addr, &alice_addr, &bob_keys.private).unwrap();
    assert_eq!(plain, b"there");

    // Alice can decrypt her own sent history through the sender entry
    let mut alice_cold = Messenger::new(PqKem);
    let plain = alice_cold
        .receive(&first, &alice_addr, &alice_addr, &alice_keys.private)
        .unwrap();
    assert_eq!(plain, b"hi");
}

#[test]
fn classical_suite_runs_the_same_protocol() {
    let mut rng = StdRng::seed_from_u64(101);
    let bob_keys = EciesKem::generate_keypair(&mut rng);
    let mut alice = Messenger::new(EciesKem);
    let mut bob = Messenger::new(EciesKem);

    let content = alice
        .send_direct(b"wallet hello", &entry("0xBob", &bob_keys), None, &mut rng)
        .unwrap();
    let plain = bob
        .receive(&content, &Address::new("0xbob"), &Address::new("0xalice"), &bob_keys.private)
        .unwrap();
    assert_eq!(plain, b"wallet hello");
}

#[test]
fn group_history_batch_load_bounds_unwraps_to_sessions() {
    let mut rng = StdRng::seed_from_u64(102);
    let alice_keys = PqKem::generate_keypair(&mut rng);
    let bob_keys = PqKem::generate_keypair(&mut rng);
    let members = vec![entry("alice", &alice_keys), entry("bob", &bob_keys)];
    let channel = PeerId::Channel("ch-1".to_string());

    let mut alice = Messenger::new(PqKem);
    let mut history = Vec::new();
    for text in [&b"one"[..], b"two", b"three"] {
        let content = alice.send_group(text, "ch-1", &members, &mut rng).unwrap();
        history.push(IncomingMessage {
            content,
            sender: Address::new("alice"),
            peer: channel.clone(),
        });
    }

    // Bob loads the whole history cold: one session, three messages
    let mut bob = Messenger::new(PqKem);
    let results = bob.batch_load(&history, &Address::new("bob"), &bob_keys.private);

    assert_eq!(
        results,
        vec![
            Decrypted::Plain(b"one".to_vec()),
            Decrypted::Plain(b"two".to_vec()),
            Decrypted::Plain(b"three".to_vec()),
        ]
    );
    assert_eq!(bob.cached_sessions(), 1);
    // The loaded session becomes active, so Bob's reply reuses it
    assert!(bob.active_session(&channel).is_some());
}

#[test]
fn batch_load_isolates_undecryptable_messages() {
    let mut rng = StdRng::seed_from_u64(103);
    let bob_keys = PqKem::generate_keypair(&mut rng);
    let bob_addr = Address::new("bob");

    let mut alice = Messenger::new(PqKem);
    let peer = PeerId::Peer(bob_addr.clone());
    let ok1 = alice
        .send_direct(b"first", &entry("bob", &bob_keys), None, &mut rng)
        .unwrap();
    let ok2 = alice
        .send_direct(b"second", &entry("bob", &bob_keys), None, &mut rng)
        .unwrap();

    // A session Bob has no entry for: keys-stripped establishment
    let mut other = Messenger::new(PqKem);
    other
        .send_direct(b"x", &entry("bob", &bob_keys), None, &mut rng)
        .unwrap();
    let orphan = other
        .send_direct(b"unreadable", &entry("bob", &bob_keys), None, &mut rng)
        .unwrap();

    let messages: Vec<IncomingMessage> = [ok1, orphan, "garbage".to_string(), ok2]
        .into_iter()
        .map(|content| IncomingMessage {
            content,
            sender: Address::new("alice"),
            peer: peer.clone(),
        })
        .collect();

    let mut bob = Messenger::new(PqKem);
    let results = bob.batch_load(&messages, &bob_addr, &bob_keys.private);

    assert_eq!(results.len(), 4);
    assert_eq!(results[0], Decrypted::Plain(b"first".to_vec()));
    assert_eq!(results[1], Decrypted::Pending);
    assert_eq!(results[2], Decrypted::Failed);
    assert_eq!(results[3], Decrypted::Plain(b"second".to_vec()));
}

#[test]
fn legacy_sessionless_messages_decrypt_in_history() {
    let mut rng = StdRng::seed_from_u64(104);
    let bob_keys = PqKem::generate_keypair(&mut rng);
    let bob_addr = Address::new("bob");

    let legacy = safelog_core::keywrap::seal_direct(
        &PqKem,
        b"old format",
        &hex::encode(&bob_keys.public),
        &mut rng,
    )
    .unwrap();
    let content = serde_json::to_string(&legacy).unwrap();

    let mut bob = Messenger::new(PqKem);
    let plain = bob
        .receive(&content, &bob_addr, &Address::new("alice"), &bob_keys.private)
        .unwrap();
    assert_eq!(plain, b"old format");
    // Nothing cached for sessionless messages
    assert_eq!(bob.cached_sessions(), 0);
}

#[test]
fn out_of_order_establishment_resolves_in_batch() {
    let mut rng = StdRng::seed_from_u64(105);
    let bob_keys = PqKem::generate_keypair(&mut rng);
    let bob_addr = Address::new("bob");

    let mut alice = Messenger::new(PqKem);
    let first = alice
        .send_direct(b"keys here", &entry("bob", &bob_keys), None, &mut rng)
        .unwrap();
    let second = alice
        .send_direct(b"later", &entry("bob", &bob_keys), None, &mut rng)
        .unwrap();

    // Delivered newest-first: the keyless message precedes the establishment
    let messages: Vec<IncomingMessage> = [second, first]
        .into_iter()
        .map(|content| IncomingMessage {
            content,
            sender: Address::new("alice"),
            peer: PeerId::Peer(bob_addr.clone()),
        })
        .collect();

    let mut bob = Messenger::new(PqKem);
    let results = bob.batch_load(&messages, &bob_addr, &bob_keys.private);
    assert_eq!(
        results,
        vec![
            Decrypted::Plain(b"later".to_vec()),
            Decrypted::Plain(b"keys here".to_vec()),
        ]
    );
}
