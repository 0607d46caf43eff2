pub mod http;
pub mod onnx;
pub mod v4l2;
pub mod video;
