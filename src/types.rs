use crate::image::ImageState;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {field} = {value:#x}")]
    Config { field: &'static str, value: u64 },
    #[error("invalid element: {field} = {value:#x}")]
    Element { field: &'static str, value: u64 },
    #[error("{operation} is not legal in state {state:?}")]
    Sequence {
        operation: &'static str,
        state: ImageState,
    },
    #[error("cannot read element payload {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("cannot write image {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

pub type Result<Q> = core::result::Result<Q, Error>;
