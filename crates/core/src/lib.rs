pub mod detection;
pub mod memory;
pub mod overlay;
pub mod playback;
pub mod shared;
pub mod video;
