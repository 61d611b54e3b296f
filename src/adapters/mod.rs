//! Engine adapters constructed through the module factory.

use serde::{Deserialize, Serialize};

use crate::capability::{Capability, QueryInterface};
use crate::error::ApiError;

mod mock_tts;

pub use mock_tts::{MockTtsEngineAdapter, MOCK_TTS_CLASS};

/// PCM layout of synthesized audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub channels: u16,
}

impl AudioFormat {
    pub fn bytes_per_frame(&self) -> usize {
        usize::from(self.bits_per_sample / 8) * usize::from(self.channels)
    }

    /// Bytes needed for `millis` of audio.
    pub fn bytes_for_millis(&self, millis: u64) -> usize {
        let frames = u64::from(self.sample_rate) * millis / 1000;
        frames as usize * self.bytes_per_frame()
    }
}

/// Text-to-speech engine.
pub trait TtsEngineAdapter: QueryInterface {
    fn output_format(&self) -> AudioFormat;

    /// Render `text` to PCM in [`TtsEngineAdapter::output_format`].
    fn synthesize(&self, text: &str) -> Result<Vec<u8>, ApiError>;
}

impl Capability for dyn TtsEngineAdapter {
    const NAME: &'static str = "text-to-speech engine";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_for_millis() {
        let format = AudioFormat {
            sample_rate: 16_000,
            bits_per_sample: 16,
            channels: 1,
        };
        assert_eq!(format.bytes_per_frame(), 2);
        assert_eq!(format.bytes_for_millis(10), 320);
        assert_eq!(format.bytes_for_millis(0), 0);
    }
}
