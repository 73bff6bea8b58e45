use crate::macros::open_enum;

open_enum! {
    /// Container/codec of the audio carried in binary frames. Negotiated once in
    /// the initiating control message and fixed for the session's lifetime.
    pub enum AudioFormat {
        Pcm => "pcm",
        Wav => "wav",
        Mp3 => "mp3",
        Opus => "opus",
        _ => Custom,
    }
}

pub const SAMPLE_RATE_8K: u32 = 8000;
pub const SAMPLE_RATE_16K: u32 = 16000;
pub const SAMPLE_RATE_22K: u32 = 22050;
pub const SAMPLE_RATE_24K: u32 = 24000;
pub const SAMPLE_RATE_48K: u32 = 48000;

/// Bytes per sample of the 16-bit little-endian mono PCM the service streams.
pub const PCM16_SAMPLE_WIDTH: usize = 2;

#[cfg(test)]
mod test {
    use super::AudioFormat;

    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    struct AudioConsts {
        #[serde(skip_serializing_if = "Option::is_none")]
        format: Option<AudioFormat>,
    }

    #[test]
    fn test_serialize() {
        let consts = AudioConsts {
            format: Some(AudioFormat::Pcm),
        };
        let json = serde_json::to_string(&consts).unwrap();
        assert_eq!(json, r#"{"format":"pcm"}"#);

        let consts = AudioConsts {
            format: Some(AudioFormat::Custom("amr".to_string())),
        };
        let json = serde_json::to_string(&consts).unwrap();
        assert_eq!(json, r#"{"format":"amr"}"#);

        let consts = AudioConsts { format: None };
        let json = serde_json::to_string(&consts).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn test_deserialize() {
        let consts: AudioConsts = serde_json::from_str(r#"{"format":"mp3"}"#).unwrap();
        assert_eq!(consts.format, Some(AudioFormat::Mp3));

        let consts: AudioConsts = serde_json::from_str(r#"{"format":"speex"}"#).unwrap();
        assert_eq!(consts.format, Some(AudioFormat::Custom("speex".to_string())));
    }
}
