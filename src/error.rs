use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Landmark file error: {0}")]
    LandmarkFile(#[from] serde_json::Error),

    #[error("Landmark set has {actual} points, expected {expected}")]
    LandmarkCount { expected: usize, actual: usize },

    #[error("Landmark ({x}, {y}) out of bounds for {width}x{height} destination image")]
    LandmarkOutOfBounds {
        x: f32,
        y: f32,
        width: u32,
        height: u32,
    },

    #[error("Source face produced no usable triangles")]
    EmptyTopology,

    #[error("Triangle references landmark index {index}, but only {count} landmarks exist")]
    TriangleIndexOutOfRange { index: usize, count: usize },

    #[error("Triangle ({a}, {b}, {c}) repeats a landmark index")]
    RepeatedTriangleIndex { a: usize, b: usize, c: usize },

    #[error("A swap task is already running")]
    Busy,

    #[error("Background task stopped responding")]
    TaskAborted,
}

pub type Result<T> = std::result::Result<T, Error>;
