//! 参与者层：控制器（recall → generate → memorize）与情绪档位

pub mod controller;
pub mod emotion;

pub use controller::{memory_entry, AgentController, Recall, WorldView};
pub use emotion::EmotionalState;
