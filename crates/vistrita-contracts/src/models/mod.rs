mod registry;
mod selectors;

pub use registry::{ModelCatalog, ModelSpec, TEXT_CAPABILITY, VISION_CAPABILITY};
pub use selectors::{ModelSelection, ModelSelector};
