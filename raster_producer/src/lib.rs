//! The producer driver, dataset/catalog descriptors, the recognized
//! configuration keys, and a couple of built-in reader/writer pairs
//! sufficient to exercise the pipeline end-to-end.

pub mod config;
pub mod descriptor;
pub mod driver;
pub mod formats;

pub use config::{ProducerConfig, RasterConfig};
pub use descriptor::{CatalogSource, DatasetDescriptor, RasterServerCatalog};
pub use driver::{Producer, ProductionReport, SourceRejection};
pub use formats::default_registry;
