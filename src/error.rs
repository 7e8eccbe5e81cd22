use thiserror::Error;

// Everything except `Output` and `Config` means the asset could not be decoded.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("decode error: {0}")]
    Decode(#[from] symphonia::core::errors::Error),

    #[error("no supported audio tracks found")]
    NoAudioTrack,

    #[error("audio asset contains no samples")]
    EmptyAudio,

    #[error("audio output error: {0}")]
    Output(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl EngineError {
    pub fn is_decode_failure(&self) -> bool {
        matches!(
            self,
            EngineError::Io(_)
                | EngineError::Decode(_)
                | EngineError::NoAudioTrack
                | EngineError::EmptyAudio
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
