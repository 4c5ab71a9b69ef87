pub mod config;
pub mod detector;
pub mod error;
pub mod feature;
pub mod frame;
pub mod image;
pub mod my_types;
pub mod optical_flow;
pub mod pyramid;
pub mod sink;
pub mod source;
pub mod tracker;
pub mod velocity;
#[cfg(feature = "opencv")]
pub mod video;
pub mod visualization;
