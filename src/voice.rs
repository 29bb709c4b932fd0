//! Voice assistant plumbing
//!
//! The deterministic pieces around a Gemini Live audio session: PCM framing
//! between float samples and base64 16-bit little-endian audio, the session
//! setup message, server message parsing, and gapless playback scheduling.

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::Result;

pub const LIVE_MODEL: &str = "gemini-2.5-flash-native-audio-preview-09-2025";
pub const VOICE_NAME: &str = "Aoede";
pub const INPUT_SAMPLE_RATE: u32 = 16_000;
pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;

pub const SYSTEM_INSTRUCTION: &str = "You are a helpful real estate investment assistant. \
Help the user analyze the cash flow and potential of the property they are viewing. \
Be concise and professional.";

const PCM_SCALE: f32 = 32768.0;

/// One chunk of microphone audio ready to send
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PcmBlob {
    pub data: String,
    pub mime_type: String,
}

/// Float samples in [-1, 1] to base64 little-endian i16 PCM at 16 kHz
pub fn encode_pcm(samples: &[f32]) -> PcmBlob {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        // `as` saturates out-of-range floats and maps NaN to 0
        let value = (sample * PCM_SCALE) as i16;
        bytes.extend_from_slice(&value.to_le_bytes());
    }

    PcmBlob {
        data: base64::engine::general_purpose::STANDARD.encode(&bytes),
        mime_type: format!("audio/pcm;rate={}", INPUT_SAMPLE_RATE),
    }
}

/// Base64 little-endian i16 PCM to float samples. A trailing odd byte is dropped.
pub fn decode_pcm(data: &str) -> Result<Vec<f32>> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(data)?;

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / PCM_SCALE)
        .collect())
}

/// First message sent after the Live websocket opens
pub fn setup_message() -> Value {
    json!({
        "setup": {
            "model": format!("models/{}", LIVE_MODEL),
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": VOICE_NAME } }
                }
            },
            "systemInstruction": { "parts": [{ "text": SYSTEM_INSTRUCTION }] }
        }
    })
}

/// Wrap a microphone chunk as a realtime input message
pub fn realtime_input_message(blob: &PcmBlob) -> Value {
    json!({
        "realtimeInput": {
            "mediaChunks": [{ "mimeType": blob.mime_type, "data": blob.data }]
        }
    })
}

/// What the assistant sent back in a single server message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerEvent {
    pub audio: Option<String>,
    pub interrupted: bool,
    pub turn_complete: bool,
}

pub fn parse_server_message(message: &Value) -> ServerEvent {
    let content = &message["serverContent"];

    let audio = content["modelTurn"]["parts"]
        .as_array()
        .and_then(|parts| {
            parts
                .iter()
                .find_map(|p| p["inlineData"]["data"].as_str())
        })
        .map(str::to_string);

    ServerEvent {
        audio,
        interrupted: content["interrupted"].as_bool().unwrap_or(false),
        turn_complete: content["turnComplete"].as_bool().unwrap_or(false),
    }
}

/// Queues output chunks back to back on the playback clock
#[derive(Debug, Clone, Default)]
pub struct PlaybackScheduler {
    next_start: f64,
}

impl PlaybackScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the start time (seconds) for a chunk arriving at `now`
    pub fn schedule(&mut self, now: f64, sample_count: usize) -> f64 {
        let duration = sample_count as f64 / f64::from(OUTPUT_SAMPLE_RATE);
        let start = now.max(self.next_start);
        self.next_start = start + duration;
        start
    }

    pub fn is_playing(&self, now: f64) -> bool {
        now < self.next_start
    }

    /// Drop queued audio when the user talks over the assistant
    pub fn interrupt(&mut self) {
        self.next_start = 0.0;
    }

    pub fn next_start(&self) -> f64 {
        self.next_start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_pcm_layout() {
        let blob = encode_pcm(&[0.0, 0.5, -0.5]);
        assert_eq!(blob.mime_type, "audio/pcm;rate=16000");

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&blob.data)
            .unwrap();
        assert_eq!(bytes, vec![0x00, 0x00, 0x00, 0x40, 0x00, 0xC0]);
    }

    #[test]
    fn test_encode_pcm_saturates() {
        let blob = encode_pcm(&[1.0, -1.5, f32::NAN]);
        let samples = decode_pcm(&blob.data).unwrap();

        assert_eq!(samples[0], f32::from(i16::MAX) / 32768.0);
        assert_eq!(samples[1], -1.0);
        assert_eq!(samples[2], 0.0);
    }

    #[test]
    fn test_pcm_round_trip_within_quantization() {
        let input: Vec<f32> = (0..64).map(|i| ((i as f32) / 10.0).sin() * 0.9).collect();
        let output = decode_pcm(&encode_pcm(&input).data).unwrap();

        assert_eq!(output.len(), input.len());
        for (a, b) in input.iter().zip(&output) {
            assert!((a - b).abs() <= 1.0 / 32768.0);
        }
    }

    #[test]
    fn test_decode_rejects_bad_base64() {
        assert!(decode_pcm("not base64!!").is_err());
    }

    #[test]
    fn test_setup_message() {
        let setup = setup_message();
        assert_eq!(setup["setup"]["model"], format!("models/{}", LIVE_MODEL));
        assert_eq!(
            setup["setup"]["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]
                ["voiceName"],
            "Aoede"
        );
    }

    #[test]
    fn test_parse_server_message() {
        let event = parse_server_message(&json!({
            "serverContent": {
                "modelTurn": { "parts": [{ "inlineData": { "mimeType": "audio/pcm", "data": "AAA=" } }] }
            }
        }));
        assert_eq!(event.audio.as_deref(), Some("AAA="));
        assert!(!event.interrupted);

        let event = parse_server_message(&json!({ "serverContent": { "interrupted": true } }));
        assert_eq!(event.audio, None);
        assert!(event.interrupted);

        assert_eq!(parse_server_message(&json!({ "setupComplete": {} })), ServerEvent::default());
    }

    #[test]
    fn test_playback_is_gapless() {
        let mut scheduler = PlaybackScheduler::new();

        // 0.5 s chunks arriving faster than they play
        assert_eq!(scheduler.schedule(1.0, 12_000), 1.0);
        assert_eq!(scheduler.schedule(1.1, 12_000), 1.5);
        assert_eq!(scheduler.next_start(), 2.0);
        assert!(scheduler.is_playing(1.9));
        assert!(!scheduler.is_playing(2.0));

        // Late chunk starts immediately
        assert_eq!(scheduler.schedule(3.0, 12_000), 3.0);
    }

    #[test]
    fn test_interrupt_resets_queue() {
        let mut scheduler = PlaybackScheduler::new();
        scheduler.schedule(0.0, 240_000);
        assert!(scheduler.is_playing(5.0));

        scheduler.interrupt();
        assert!(!scheduler.is_playing(5.0));
        assert_eq!(scheduler.schedule(5.0, 24_000), 5.0);
    }
}
