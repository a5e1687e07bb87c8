pub mod jellyfin;

pub use jellyfin::JellyfinClient;
