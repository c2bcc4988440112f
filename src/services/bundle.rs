//! Bundle file naming.
//!
//! The SDK names bundles by a 64-bit MurmurHash64A of the resource name,
//! printed as 16 lowercase hex digits. Streamed parts keep the base name and
//! add a suffix (`<hash>.stream`).

use regex::Regex;
use std::sync::LazyLock;

static BUNDLE_FILE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9a-f]{16})((?:\.[0-9a-z_]+)*)$").expect("Invalid bundle regex"));

/// MurmurHash64A with a zero seed, as used by the Stingray engine for resource ids.
pub fn murmur64(key: &[u8]) -> u64 {
    const M: u64 = 0xc6a4_a793_5bd1_e995;
    const R: u32 = 47;

    let mut h: u64 = (key.len() as u64).wrapping_mul(M);

    let chunks = key.chunks_exact(8);
    let tail = chunks.remainder();

    for chunk in chunks {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(chunk);
        let mut k = u64::from_le_bytes(bytes);

        k = k.wrapping_mul(M);
        k ^= k >> R;
        k = k.wrapping_mul(M);

        h ^= k;
        h = h.wrapping_mul(M);
    }

    if !tail.is_empty() {
        for (i, byte) in tail.iter().enumerate() {
            h ^= u64::from(*byte) << (8 * i);
        }
        h = h.wrapping_mul(M);
    }

    h ^= h >> R;
    h = h.wrapping_mul(M);
    h ^= h >> R;
    h
}

/// Bundle base name for a mod: the hash of its lower-cased name.
pub fn mod_bundle_hash(mod_name: &str) -> String {
    format!("{:016x}", murmur64(mod_name.to_lowercase().as_bytes()))
}

/// A compiled bundle part file, split into hash and suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundlePart {
    pub hash: String,
    pub suffix: String,
}

impl BundlePart {
    /// Recognise a compiler output file name. Returns `None` for anything
    /// that isn't a bundle part.
    pub fn parse(file_name: &str) -> Option<Self> {
        let caps = BUNDLE_FILE_PATTERN.captures(file_name)?;
        Some(Self {
            hash: caps.get(1)?.as_str().to_string(),
            suffix: caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_default(),
        })
    }

    /// Name in the legacy layout: the mod's own hash replaces the part hash.
    pub fn legacy_name(&self, mod_hash: &str) -> String {
        format!("{}{}", mod_hash, self.suffix)
    }

    /// Name in the new layout: original name plus the variant's extension.
    pub fn new_format_name(&self, extension: &str) -> String {
        format!("{}{}{}", self.hash, self.suffix, extension)
    }
}

/// Whether a file in a destination folder is a previously copied bundle or
/// mod descriptor that must be removed before copying fresh output.
pub fn is_stale_output(file_name: &str, extension: &str) -> bool {
    if file_name.ends_with(".mod") {
        return true;
    }

    let base = if !extension.is_empty() {
        match file_name.strip_suffix(extension) {
            Some(base) => base,
            None => file_name,
        }
    } else {
        file_name
    };

    BUNDLE_FILE_PATTERN.is_match(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_murmur64_empty_is_zero() {
        assert_eq!(murmur64(b""), 0);
    }

    #[test]
    fn test_murmur64_is_deterministic_and_spreads() {
        assert_eq!(murmur64(b"my_mod"), murmur64(b"my_mod"));
        assert_ne!(murmur64(b"my_mod"), murmur64(b"my_mod2"));
        // Tail handling: inputs differing only past the last full block
        assert_ne!(murmur64(b"abcdefgh1"), murmur64(b"abcdefgh2"));
    }

    #[test]
    fn test_mod_bundle_hash_lowercases() {
        let hash = mod_bundle_hash("My_Mod");
        assert_eq!(hash, mod_bundle_hash("my_mod"));
        assert_eq!(hash.len(), 16);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_bundle_part_parse() {
        let part = BundlePart::parse("0123456789abcdef").unwrap();
        assert_eq!(part.hash, "0123456789abcdef");
        assert_eq!(part.suffix, "");

        let stream = BundlePart::parse("0123456789abcdef.stream").unwrap();
        assert_eq!(stream.suffix, ".stream");

        assert!(BundlePart::parse("processed_bundles.csv").is_none());
        assert!(BundlePart::parse("0123456789ABCDEF").is_none());
        assert!(BundlePart::parse("0123456789abcde").is_none());
    }

    #[test]
    fn test_bundle_part_names() {
        let part = BundlePart::parse("0123456789abcdef.stream").unwrap();
        assert_eq!(part.legacy_name("fedcba9876543210"), "fedcba9876543210.stream");
        assert_eq!(part.new_format_name(".mod_bundle"), "0123456789abcdef.stream.mod_bundle");
    }

    #[test]
    fn test_is_stale_output() {
        assert!(is_stale_output("0123456789abcdef", ""));
        assert!(is_stale_output("0123456789abcdef.mod_bundle", ".mod_bundle"));
        assert!(is_stale_output("my_mod.mod", ".mod_bundle"));
        assert!(!is_stale_output("item_preview.jpg", ".mod_bundle"));
        assert!(!is_stale_output("notes.txt", ""));
    }
}
