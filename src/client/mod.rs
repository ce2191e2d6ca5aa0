//! Fine-tuning service client module.

mod finetune;

pub use finetune::*;
