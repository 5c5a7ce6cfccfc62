pub mod camera;
pub mod counts;
pub mod detection;
pub mod errors;
pub mod frame;
pub mod geometry;
pub mod model;
pub mod session;
pub mod settings;
pub mod stream;
pub mod tracker;
pub mod upload;
