//! Response Frame Assembly
//!
//! The adapter streams bytes with no relation between notification chunks
//! and response boundaries: a chunk may carry a fragment of a response,
//! exactly one, or several batched together. Frames are delimited only by
//! the `>` prompt the adapter prints when it is ready for the next command.

use crate::PROMPT;
use tracing::warn;

/// Pending-buffer cap; past this without a prompt the buffer is discarded
pub const DEFAULT_MAX_PENDING: usize = 4096;

/// Reassembles prompt-terminated response frames from raw chunks.
pub struct FrameAssembler {
    pending: String,
    max_pending: usize,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::with_max_pending(DEFAULT_MAX_PENDING)
    }

    pub fn with_max_pending(max_pending: usize) -> Self {
        Self {
            pending: String::new(),
            max_pending,
        }
    }

    /// Feed one raw chunk; returns every frame it closed out, in arrival
    /// order.
    ///
    /// A prompt always closes out everything received so far: the buffer is
    /// split at each occurrence and every non-empty trimmed segment becomes
    /// one frame. Without a prompt the chunk is buffered, up to the cap —
    /// a misbehaving adapter that never sends one cannot grow the buffer
    /// unboundedly; the content is dropped and assembly resynchronizes on
    /// the next prompt.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.push_str(&String::from_utf8_lossy(chunk));

        if !self.pending.contains(PROMPT) {
            if self.pending.len() > self.max_pending {
                warn!(
                    "pending buffer exceeded {} bytes without a prompt, resynchronizing",
                    self.max_pending
                );
                self.pending.clear();
            }
            return Vec::new();
        }

        let frames = self
            .pending
            .split(PROMPT)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        self.pending.clear();
        frames
    }

    /// Bytes currently buffered awaiting a prompt.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Discard anything buffered.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}
