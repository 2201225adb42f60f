pub mod qml;
pub mod tiff;
pub mod warp;
