pub mod camera;
pub mod detection;
pub mod errors;
pub mod model;
pub mod sampling;
pub mod stream;
