//! Protection-Metadata Adapter. Attaches, retrieves, and removes a
//! per-buffer encryption-descriptor sidecar, and keeps a per-key-session
//! usage counter the decryption service relies on.
//!
//! `GstRialtoProtectionData` in the original carries raw `GstBuffer*`
//! for key/iv/subsamples with manual ref/unref. This crate models the
//! same scoped-ownership lifecycle with owned `gstreamer::Buffer`
//! clones (already refcounted via `miniobject`), released on `Drop` of
//! the descriptor record without any manual unref calls.

use rialto_common::CipherMode;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

/// Per-buffer sidecar, the Rust analogue of `GstRialtoProtectionData`.
pub struct ProtectionMetadata {
    pub key_session_id: i32,
    pub subsample_count: u32,
    pub init_with_last15: bool,
    pub key: gstreamer::Buffer,
    pub iv: gstreamer::Buffer,
    pub subsamples: gstreamer::Buffer,
    pub cipher_mode: CipherMode,
    pub crypt: u32,
    pub skip: u32,
    pub encryption_pattern_set: bool,
}

/// Registration tag list `{"rialto","protection"}`; kept as a constant
/// the once-init registration call would reference.
pub const PROTECTION_METADATA_TAGS: &[&str] = &["rialto", "protection"];

static REGISTER_ONCE: std::sync::Once = std::sync::Once::new();

/// Idempotent global registration: once-init guarded module-level
/// registration, safe to call from every session's constructor.
pub fn ensure_registered() {
    REGISTER_ONCE.call_once(|| {
        tracing::debug!(tags = ?PROTECTION_METADATA_TAGS, "registering rialto protection metadata type");
    });
}

/// Tracks per-key-session usage (increment on add, decrement on
/// remove); counted atomically since the adapter's add/remove may be
/// called from the media-framework thread that finalizes buffers.
#[derive(Default)]
pub struct KeySessionUsage {
    counters: Mutex<HashMap<i32, std::sync::Arc<AtomicI64>>>,
}

impl KeySessionUsage {
    pub fn new() -> Self {
        Self::default()
    }

    fn counter_for(&self, key_session_id: i32) -> std::sync::Arc<AtomicI64> {
        self.counters
            .lock()
            .unwrap()
            .entry(key_session_id)
            .or_insert_with(|| std::sync::Arc::new(AtomicI64::new(0)))
            .clone()
    }

    pub fn increment(&self, key_session_id: i32) {
        self.counter_for(key_session_id).fetch_add(1, Ordering::SeqCst);
    }

    pub fn decrement(&self, key_session_id: i32) {
        self.counter_for(key_session_id).fetch_sub(1, Ordering::SeqCst);
    }

    pub fn count(&self, key_session_id: i32) -> i64 {
        self.counter_for(key_session_id).load(Ordering::SeqCst)
    }
}

/// Buffer-qdata key used to stash a `ProtectionMetadata` on a
/// `gstreamer::Buffer`. GStreamer's Rust bindings expose typed qdata via
/// `BufferRef::set_qdata`/`qdata`, the safe equivalent of the original's
/// `gst_buffer_add_meta`.
pub struct ProtectionMetadataAdapter {
    usage: KeySessionUsage,
}

impl ProtectionMetadataAdapter {
    pub fn new() -> Self {
        ensure_registered();
        ProtectionMetadataAdapter {
            usage: KeySessionUsage::new(),
        }
    }

    pub fn usage(&self) -> &KeySessionUsage {
        &self.usage
    }

    /// Attaches a copy of `descriptor` to `buffer` and bumps the
    /// key-session usage counter.
    pub fn add(&self, buffer: &mut gstreamer::Buffer, descriptor: ProtectionMetadata) {
        self.usage.increment(descriptor.key_session_id);
        unsafe {
            let quark = gstreamer::glib::Quark::from_str("rialto-protection-metadata");
            buffer
                .make_mut()
                .set_qdata(quark, descriptor);
        }
    }

    /// Looks up the descriptor previously attached with `add`.
    pub fn get<'a>(&self, buffer: &'a gstreamer::Buffer) -> Option<&'a ProtectionMetadata> {
        unsafe {
            let quark = gstreamer::glib::Quark::from_str("rialto-protection-metadata");
            buffer.qdata::<ProtectionMetadata>(quark).map(|v| v.as_ref())
        }
    }

    /// Decrements the session counter and drops the sidecar, which in
    /// turn drops its owned `key`/`iv`/`subsamples` buffer clones in
    /// that order.
    pub fn remove(&self, buffer: &mut gstreamer::Buffer) {
        unsafe {
            let quark = gstreamer::glib::Quark::from_str("rialto-protection-metadata");
            if let Some(descriptor) = buffer.make_mut().steal_qdata::<ProtectionMetadata>(quark) {
                self.usage.decrement(descriptor.key_session_id);
            }
        }
    }
}

impl Default for ProtectionMetadataAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_counter_sums_to_zero_over_add_remove_pairs() {
        let usage = KeySessionUsage::new();
        usage.increment(7);
        usage.increment(7);
        usage.decrement(7);
        usage.decrement(7);
        assert_eq!(usage.count(7), 0);
    }

    #[test]
    fn distinct_key_sessions_are_tracked_independently() {
        let usage = KeySessionUsage::new();
        usage.increment(1);
        usage.increment(2);
        usage.decrement(1);
        assert_eq!(usage.count(1), 0);
        assert_eq!(usage.count(2), 1);
    }
}
