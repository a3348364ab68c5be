pub mod device_catalogue;
pub mod image_folder_camera;
pub mod scripted_permission;
pub mod synthetic_camera;
