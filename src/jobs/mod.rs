pub mod thumbnail;

pub use thumbnail::{
    PassthroughRenderer, ThumbnailJob, ThumbnailQueueHandle, ThumbnailRenderer, ThumbnailWorker,
    THUMBNAIL_WIDTHS,
};
