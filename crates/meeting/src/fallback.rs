//! Lokaler Ersatz-Raum wenn der Provider ausfaellt
//!
//! Der Slug ist pseudo-zufaellig, aber aus der Raum-ID abgeleitet: derselbe
//! Raum ergibt immer dieselbe URL.

use callroom_core::types::RoomId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SLUG_LAENGE: usize = 12;
const ALPHABET: &[u8] = b"abcdefghijkmnpqrstuvwxyz23456789";

/// Deterministischer Slug fuer eine Raum-ID
pub fn slug(raum_id: RoomId) -> String {
    let (hoch, tief) = raum_id.inner().as_u64_pair();
    let mut rng = StdRng::seed_from_u64(hoch ^ tief.rotate_left(17));
    (0..SLUG_LAENGE)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Teilnehmer-URL des Ersatz-Raums: `{basis_url}/{slug}`
pub fn teilnehmer_url(basis_url: &str, raum_id: RoomId) -> String {
    format!("{}/{}", basis_url.trim_end_matches('/'), slug(raum_id))
}
