//! Save-state framing: an unversioned concatenation of per-component blobs,
//! prefixed by a 20-byte SHA-1 digest computed over a hand-written schema
//! descriptor (not compile-time reflection over struct fields).

use crate::error::SaveStateError;
use sha1::{Digest, Sha1};

/// A single field of a serialized component, used only to build the schema
/// digest. `type_tag` is a short human-readable type name ("u8", "u16",
/// "[u8;8192]", ...); it never needs to match a Rust type exactly, only to
/// be stable across versions of this crate.
pub struct SchemaField {
    pub component: &'static str,
    pub field: &'static str,
    pub type_tag: &'static str,
}

macro_rules! f {
    ($c:expr, $n:expr, $t:expr) => {
        SchemaField {
            component: $c,
            field: $n,
            type_tag: $t,
        }
    };
}

/// The fixed field order that both the digest and the blob writer/reader
/// walk. Adding, removing, or reordering a field here changes the digest,
/// which is the point: old saves fail closed instead of partially loading.
pub const SCHEMA: &[SchemaField] = &[
    f!("wram", "banks", "[u8;32768]"),
    f!("wram", "hram", "[u8;127]"),
    f!("wram", "bank_index", "u8"),
    f!("cartridge", "rom", "bytes"),
    f!("cartridge", "ram", "bytes"),
    f!("cartridge", "rom_bank", "u16"),
    f!("cartridge", "ram_bank", "u8"),
    f!("cartridge", "ram_enabled", "bool"),
    f!("cpu", "a", "u8"),
    f!("cpu", "f", "u8"),
    f!("cpu", "b", "u8"),
    f!("cpu", "c", "u8"),
    f!("cpu", "d", "u8"),
    f!("cpu", "e", "u8"),
    f!("cpu", "h", "u8"),
    f!("cpu", "l", "u8"),
    f!("cpu", "w", "u8"),
    f!("cpu", "z", "u8"),
    f!("cpu", "sp", "u16"),
    f!("cpu", "pc", "u16"),
    f!("cpu", "ir", "u16"),
    f!("cpu", "mupc", "u8"),
    f!("cpu", "ime", "bool"),
    f!("cpu", "halted", "bool"),
    f!("io", "if_reg", "u8"),
    f!("io", "ie_reg", "u8"),
    f!("timer", "internal_counter", "u16"),
    f!("timer", "tima", "u8"),
    f!("timer", "tma", "u8"),
    f!("timer", "tac", "u8"),
    f!("ppu", "mode_clock", "u16"),
    f!("ppu", "vram", "[u8;8192]"),
    f!("ppu", "oam", "[u8;160]"),
    f!("ppu", "framebuffer", "[u8;5760]"),
    f!("ppu", "lcdc", "u8"),
    f!("ppu", "stat", "u8"),
    f!("ppu", "scy", "u8"),
    f!("ppu", "scx", "u8"),
    f!("ppu", "ly", "u8"),
    f!("ppu", "lyc", "u8"),
    f!("ppu", "bgp", "u8"),
    f!("ppu", "obp0", "u8"),
    f!("ppu", "obp1", "u8"),
    f!("ppu", "wy", "u8"),
    f!("ppu", "wx", "u8"),
    f!("io", "joypad_register", "u8"),
    f!("io", "joypad_status", "u8"),
];

pub fn schema_digest() -> [u8; 20] {
    let mut hasher = Sha1::new();
    for field in SCHEMA {
        hasher.update(field.component.as_bytes());
        hasher.update(field.field.as_bytes());
        hasher.update(field.type_tag.as_bytes());
    }
    hasher.finalize().into()
}

/// Prepends the schema digest to a component blob produced by the caller
/// (typically `Gameboy::serialize_state`).
pub fn frame(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(20 + body.len());
    out.extend_from_slice(&schema_digest());
    out.extend_from_slice(body);
    out
}

/// Strips and validates the digest prefix, returning the component body.
pub fn unframe(data: &[u8]) -> Result<&[u8], SaveStateError> {
    if data.len() < 20 {
        return Err(SaveStateError::WrongSize {
            expected: 20,
            actual: data.len(),
        });
    }
    let (digest, body) = data.split_at(20);
    if digest != schema_digest() {
        return Err(SaveStateError::DigestMismatch);
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_frame_and_unframe() {
        let body = vec![1, 2, 3, 4];
        let framed = frame(&body);
        let recovered = unframe(&framed).unwrap();
        assert_eq!(recovered, &body[..]);
    }

    #[test]
    fn rejects_a_corrupted_digest() {
        let mut framed = frame(&[1, 2, 3]);
        framed[0] ^= 0xFF;
        assert!(matches!(unframe(&framed), Err(SaveStateError::DigestMismatch)));
    }
}
