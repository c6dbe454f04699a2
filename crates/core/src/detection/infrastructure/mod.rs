pub mod bytetrack_tracker;
pub mod coco_labels;
pub mod math;
pub mod model_store;
pub mod onnx_detector;
