//! Incremental delivery - decides which streamed bytes are safe to show
//!
//! Narration is released as it arrives, except for a tail of
//! `MARKER.len() - 1` bytes that could still be the start of an action
//! object. Once the marker shows up, everything from it onward is withheld
//! so partial action JSON never reaches the caller.

use crate::agent::action::MARKER;

/// Look-ahead kept back while the marker has not been seen
pub const LOOKAHEAD: usize = MARKER.len() - 1;

/// Per-response delivery state
#[derive(Debug, Default)]
pub struct DeliveryBuffer {
    /// Unreleased narration tail, or the withheld payload once the marker is found
    pending: String,
    /// Every content byte received for this response
    full_content: String,
    marker_found: bool,
    debug: bool,
}

impl DeliveryBuffer {
    /// In debug mode every delta is forwarded verbatim
    pub fn new(debug: bool) -> Self {
        Self {
            debug,
            ..Default::default()
        }
    }

    /// Feed one content delta, returning the text that may be forwarded now
    pub fn push(&mut self, delta: &str) -> Option<String> {
        if delta.is_empty() {
            return None;
        }
        self.full_content.push_str(delta);

        if self.debug {
            return Some(delta.to_string());
        }

        self.pending.push_str(delta);
        if self.marker_found {
            return None;
        }

        if let Some(idx) = self.pending.find(MARKER) {
            self.marker_found = true;
            let payload = self.pending.split_off(idx);
            let narration = std::mem::replace(&mut self.pending, payload);
            return non_empty(narration);
        }

        if self.pending.len() <= LOOKAHEAD {
            return None;
        }

        let mut cut = self.pending.len() - LOOKAHEAD;
        while !self.pending.is_char_boundary(cut) {
            cut -= 1;
        }
        let tail = self.pending.split_off(cut);
        non_empty(std::mem::replace(&mut self.pending, tail))
    }

    /// End of stream: release the held-back tail if it was plain narration
    pub fn finish(&mut self) -> Option<String> {
        if self.debug || self.marker_found {
            return None;
        }
        non_empty(std::mem::take(&mut self.pending))
    }

    pub fn marker_found(&self) -> bool {
        self.marker_found
    }

    /// Action payload kept from the caller (empty unless the marker was found)
    pub fn withheld(&self) -> &str {
        if self.marker_found {
            &self.pending
        } else {
            ""
        }
    }

    /// The complete response text
    pub fn full_content(&self) -> &str {
        &self.full_content
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }
}

fn non_empty(text: String) -> Option<String> {
    (!text.is_empty()).then_some(text)
}
