pub mod compositor;
pub mod error;
pub mod geometry;
pub mod gesture;
pub mod imu;
pub mod menu;
pub mod raster;
pub mod redraw;
pub mod schedule;
pub mod settings;
pub mod source;
pub mod store;
pub mod style;
pub mod text;
pub mod watchface;
