pub mod config;
pub mod error;
pub mod events;
pub mod frames;
pub mod progress;
pub mod session;
pub mod timeline;
pub mod render {
    pub mod canvas;
    pub mod playhead;
}
pub mod tasks {
    pub mod loader;
    pub mod progress;
    pub mod scroll;
}
