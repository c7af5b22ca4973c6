//! # Glyph Crop Sanitizer
//!
//! Detects neighbouring glyphs that intrude into a tightly cropped character
//! image and produces a mask (or rectangular boundaries) covering them, so
//! the crop can be cleaned before it is used as a training sample.
//!
//! ## Strategies
//!
//! - **Column density / column valley / row valley**: find low-ink gaps in
//!   the column or row projection and mask everything beyond them.
//! - **Connected components**: score every blob of ink and mask the ones
//!   that hang off an edge and do not look like the target glyph. This is the
//!   only pixel-accurate strategy.
//! - **Flood fill**: grow the background from the corners and mask edge
//!   blobs that never reach the centre.
//! - **Gradient edge**: cut at the strongest vertical edges near each side.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sanitize::{io::load_rgb, sanitize_image, IntruderDetector, Strategy};
//!
//! let image = load_rgb("glyph.png")?;
//! let strategy: Strategy = "connected_components".parse()?;
//! let detection = strategy.detect(&image)?;
//! let cleaned = sanitize_image(&image, &detection);
//! cleaned.save("glyph_clean.png")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Several strategies at once
//!
//! ```rust,no_run
//! use sanitize::{algorithms::*, io::load_rgb, Pipeline};
//!
//! let pipeline = Pipeline::builder()
//!     .add_strategy(ComponentDetector::default().with_sensitivity(Sensitivity::High))
//!     .add_strategy(CombinedValleyDetector::default())
//!     .build();
//! for outcome in pipeline.process(&load_rgb("glyph.png")?) {
//!     println!("{}: {:?}", outcome.strategy, outcome.detection().map(|d| d.boundaries()));
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod binary;
pub mod types;
pub mod traits;
pub mod algorithms;
pub mod strategy;
pub mod pipeline;
pub mod cleanup;
pub mod io;

pub use error::{Result, SanitizeError};
pub use binary::BinaryMask;
pub use types::{Detection, DiagnosticData, Diagnostics, IntruderRegion, MaskBoundaries};
pub use traits::IntruderDetector;
pub use strategy::Strategy;
pub use pipeline::{builder::PipelineBuilder, Pipeline, StrategyOutcome};
pub use cleanup::{background_color, sanitize_image};
pub use io::DetectionReport;
