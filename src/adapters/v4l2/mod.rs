pub mod camera_repo;
pub mod capture;
pub mod frame_source;
