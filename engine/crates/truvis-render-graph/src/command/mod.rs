pub mod barrier;
pub mod recorder;
pub mod rendering;
pub mod vk_recorder;
