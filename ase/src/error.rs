#[derive(Debug, thiserror::Error)]
pub enum AseError {
    #[error("unsupported file extension: `{extension}`")]
    UnsupportedFormat { extension: String },
    #[error("bad file magic: {found:#06x}")]
    InvalidFileMagic { found: u16 },
    #[error("bad frame magic in frame {frame}")]
    BadFrameMagic { frame: u32 },
    #[error("unknown color depth: {bits} bits per pixel")]
    UnknownColorDepth { bits: u16 },
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("invalid data: {detail}")]
    InvalidData { detail: String },
    #[error("IOError: {source}")]
    IOError {
        #[from]
        source: std::io::Error,
    },
}
