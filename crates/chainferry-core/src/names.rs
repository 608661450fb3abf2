//! Identifier classification and workload name derivation.
//!
//! The lifecycle API receives a single opaque identifier per call. Two kinds
//! of identifier flow through it:
//!
//! - an *engine handle*: the 64-char lowercase-hex token assigned by the
//!   container engine to a short-lived build/utility container
//! - a *workload reference*: a dot-delimited human-assigned name for a
//!   long-running managed deployment (e.g. `dev.peer0.org1.mycc.v1.0`)
//!
//! Classification is structural; nothing is persisted. The workload name is
//! re-derived from the reference on every call, so derivation must be a pure
//! function of its input — `create`, `upload`, `start` and `remove` all have
//! to land on the same orchestrator objects.

/// Reserved prefix for digest-derived workload names.
///
/// The sweeper uses this prefix to find deployments it owns.
pub const WORKLOAD_NAME_PREFIX: &str = "chaincode-";

/// Hard ceiling the orchestrator places on object names.
pub const WORKLOAD_NAME_MAX_LEN: usize = 63;

/// References at or below this length map to their dash-normalized form
/// directly, leaving headroom for orchestrator-added suffixes.
const PASSTHROUGH_MAX_LEN: usize = 53;

/// Number of digest bytes kept in derived names. 16 bytes hex-encode to 32
/// chars, keeping the derived name at exactly 53 chars.
const DIGEST_LEN: usize = 16;

/// The kind of backend an identifier addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    /// An engine-assigned container id; lifecycle verbs go to the local engine.
    EngineHandle,
    /// A caller-assigned workload reference; verbs go to the orchestrator.
    WorkloadRef,
}

/// Classify an identifier as an engine handle or a workload reference.
///
/// An identifier is an engine handle iff it *starts with* 64 lowercase hex
/// characters. This is deliberately a prefix match, not a full match: a
/// longer string whose first 64 chars are hex still classifies as an engine
/// handle, matching the legacy wire behavior.
#[must_use]
pub fn classify(id: &str) -> IdentifierKind {
    let bytes = id.as_bytes();
    if bytes.len() >= 64
        && bytes[..64]
            .iter()
            .all(|b| b.is_ascii_digit() || matches!(b, b'a'..=b'f'))
    {
        IdentifierKind::EngineHandle
    } else {
        IdentifierKind::WorkloadRef
    }
}

/// Derive the orchestrator object name for a workload reference.
///
/// Dots are replaced with dashes. Short references (≤ 53 chars) pass through
/// unchanged after normalization. Longer references are compressed to
/// `chaincode-<first10>-<hex digest>`, exactly 53 chars, so the name stays
/// under the orchestrator's 63-char ceiling while remaining a pure function
/// of the reference. Digest collisions are an accepted risk.
#[must_use]
pub fn derive_workload_name(reference: &str) -> String {
    let normalized = reference.replace('.', "-");
    if reference.len() <= PASSTHROUGH_MAX_LEN {
        return normalized;
    }

    let digest = blake3::hash(normalized.as_bytes());
    // Prefix by chars, not bytes: byte-slicing panics mid-codepoint on
    // multi-byte references.
    let head: String = normalized.chars().take(10).collect();
    format!(
        "{WORKLOAD_NAME_PREFIX}{head}-{}",
        hex::encode(&digest.as_bytes()[..DIGEST_LEN])
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_engine_handle() {
        let id = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";
        assert_eq!(id.len(), 64);
        assert_eq!(classify(id), IdentifierKind::EngineHandle);
    }

    #[test]
    fn classify_workload_ref() {
        assert_eq!(
            classify("dev.peer0.org1.mycc.v1.0"),
            IdentifierKind::WorkloadRef
        );
        assert_eq!(classify(""), IdentifierKind::WorkloadRef);
        assert_eq!(classify("abc"), IdentifierKind::WorkloadRef);
    }

    #[test]
    fn classify_is_a_prefix_match() {
        // 64 hex chars followed by an arbitrary suffix still classifies as an
        // engine handle. Encoded on purpose; do not "fix" to a full match.
        let id = format!("{}.extra.suffix", "a".repeat(64));
        assert_eq!(classify(&id), IdentifierKind::EngineHandle);
    }

    #[test]
    fn classify_rejects_uppercase_and_short_hex() {
        let upper = "A".repeat(64);
        assert_eq!(classify(&upper), IdentifierKind::WorkloadRef);
        let short = "a".repeat(63);
        assert_eq!(classify(&short), IdentifierKind::WorkloadRef);
    }

    #[test]
    fn short_reference_passes_through_normalized() {
        assert_eq!(derive_workload_name("dev.peer0.org1"), "dev-peer0-org1");
        assert_eq!(derive_workload_name("plain"), "plain");
    }

    #[test]
    fn long_reference_is_digest_compressed() {
        let reference = format!("dev.peer0.org1.{}.v1.0", "x".repeat(80));
        assert!(reference.len() > 53);

        let name = derive_workload_name(&reference);
        assert_eq!(name.len(), 53);
        assert!(name.starts_with(WORKLOAD_NAME_PREFIX));
        assert!(name.len() <= WORKLOAD_NAME_MAX_LEN);
        assert!(!name.contains('.'));
    }

    #[test]
    fn derivation_is_deterministic() {
        let reference = format!("org1.department1.{}.mycc.v2", "y".repeat(70));
        assert_eq!(
            derive_workload_name(&reference),
            derive_workload_name(&reference)
        );
    }

    #[test]
    fn distinct_references_get_distinct_names() {
        let a = format!("{}.v1", "a".repeat(60));
        let b = format!("{}.v2", "a".repeat(60));
        assert_ne!(derive_workload_name(&a), derive_workload_name(&b));
    }

    #[test]
    fn multibyte_reference_never_panics() {
        // 20 three-byte chars: 60 bytes, so the digest path runs and byte
        // index 10 falls inside a codepoint.
        let reference = "链".repeat(20);
        assert!(reference.len() > 53);

        let name = derive_workload_name(&reference);
        assert!(name.starts_with(WORKLOAD_NAME_PREFIX));
        assert_eq!(name.chars().count(), 53);
        assert_eq!(name, derive_workload_name(&reference));
    }

    #[test]
    fn boundary_length_passes_through() {
        // 53 chars of dotted reference stays verbatim (normalized).
        let reference = format!("a.{}", "b".repeat(51));
        assert_eq!(reference.len(), 53);
        let name = derive_workload_name(&reference);
        assert_eq!(name, reference.replace('.', "-"));

        let longer = format!("a.{}", "b".repeat(52));
        assert_eq!(longer.len(), 54);
        assert!(derive_workload_name(&longer).starts_with(WORKLOAD_NAME_PREFIX));
    }
}
