//! sheetgrade-strategies — Extraction strategy implementations.
//!
//! Implements the `ExtractionStrategy` trait for pattern recognition,
//! visual-structural reading, and remote OCR, allowing sheetgrade to read
//! the same sheet several independent ways.

pub mod config;
pub mod error;
pub mod grid;
pub mod mock;
pub mod ocr;
pub mod pattern;
pub mod visual;

pub use config::{create_strategy, load_config, SheetgradeConfig, StrategyConfig};
pub use error::StrategyError;
pub use mock::MockStrategy;
pub use ocr::OcrStrategy;
pub use pattern::PatternStrategy;
pub use visual::VisualStrategy;
