//! Identifier helpers

use bech32::Bech32m;
use uuid7::uuid7;

use super::workflow::Track;

// construct a unique id then encode using bech32m
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// Format the n-th shipment id of a track, e.g. `EXP-001`.
pub fn shipment_id(track: Track, sequence: u64) -> String {
    format!("{}-{:03}", track.id_prefix(), sequence)
}
