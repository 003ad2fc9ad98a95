pub mod features;
pub mod model;
pub mod store;

pub use features::{FeatureVector, TOKENIZER_VERSION};
pub use model::{classify, train, ClassPair, Model, TrainingError};
pub use store::{load_labeled_examples, ModelStore, ModelStoreError};
