use sha2::{Digest, Sha256};

use crate::{Field, TypeGraph, TypeId, types::TypeFingerprint};

/// Number of leading digest bytes shown by [`StructFingerprint::short_hex`].
const SHORT_DIGEST_LEN: usize = 8;

/// Schema fingerprint of a structured type.
///
/// Two compiler runs that produce the same fingerprint for a structure agree on its
/// wire layout: same keys, same optional markers, same member types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructFingerprint {
    material: String,
    digest: [u8; 32],
}

impl StructFingerprint {
    /// Fingerprints the structure `id`. Returns `None` when `id` is not a structured type.
    pub fn compute(graph: &TypeGraph, id: TypeId) -> Option<Self> {
        graph.struct_def(id)?;
        Some(Self::from_material(graph.fingerprint_material(id)))
    }

    pub fn from_material(material: String) -> Self {
        let digest = Sha256::digest(material.as_bytes()).into();
        Self { material, digest }
    }

    pub fn material(&self) -> &str {
        &self.material
    }

    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }

    pub fn hex(&self) -> String {
        hex::encode(self.digest)
    }

    pub fn short_hex(&self) -> String {
        hex::encode(&self.digest[..SHORT_DIGEST_LEN])
    }
}

impl std::fmt::Display for StructFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.short_hex())
    }
}

/// Concatenated fingerprint material of `fields`, taken in ascending key order
/// regardless of the order they are passed in.
pub fn fields_fingerprint_material<'a>(types: &impl TypeFingerprint, fields: impl IntoIterator<Item = &'a Field>) -> String {
    let mut sorted: Vec<&Field> = fields.into_iter().collect();
    sorted.sort_by(|a, b| Field::key_compare(a, b));
    sorted.iter().map(|field| field.fingerprint_material(types)).collect()
}
