// MockTtsEngineAdapter: deterministic silent synthesis for tests and desktop builds

use std::any::TypeId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::{AudioFormat, TtsEngineAdapter};
use crate::capability::{InterfaceView, QueryInterface};
use crate::error::ApiError;
use crate::interface_map;

pub const MOCK_TTS_CLASS: &str = "MockTtsEngineAdapter";

const MILLIS_PER_CHAR: u64 = 10;

const MOCK_FORMAT: AudioFormat = AudioFormat {
    sample_rate: 16_000,
    bits_per_sample: 16,
    channels: 1,
};

/// Produces 16 kHz 16-bit mono silence, 10 ms per input character.
#[derive(Debug, Default)]
pub struct MockTtsEngineAdapter {
    requests: AtomicU64,
}

impl MockTtsEngineAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `synthesize` calls.
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }
}

impl TtsEngineAdapter for MockTtsEngineAdapter {
    fn output_format(&self) -> AudioFormat {
        MOCK_FORMAT
    }

    fn synthesize(&self, text: &str) -> Result<Vec<u8>, ApiError> {
        if text.is_empty() {
            return Err(ApiError::InvalidArgument { name: "text" });
        }

        let chars = text.chars().count() as u64;
        let bytes = MOCK_FORMAT.bytes_for_millis(chars * MILLIS_PER_CHAR);
        self.requests.fetch_add(1, Ordering::Relaxed);
        log::debug!(
            "[MockTts] synthesized {} char(s) into {} byte(s)",
            chars,
            bytes
        );
        Ok(vec![0u8; bytes])
    }
}

impl QueryInterface for MockTtsEngineAdapter {
    fn query_interface(self: Arc<Self>, interface: TypeId) -> Option<InterfaceView> {
        interface_map!(self, interface; dyn TtsEngineAdapter)
    }
}
