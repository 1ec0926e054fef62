//! Types shared by the offloader binary: configuration, the camera
//! registry and the device wire protocol.

pub mod camera;
pub mod config;
pub mod protocol;
