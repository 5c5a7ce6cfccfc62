pub mod dataset;
pub mod detection_loop;
pub mod dto;
pub mod ports;
pub mod services;
pub mod upload_service;
pub mod worker;
