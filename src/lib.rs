pub mod browser;
pub mod config;
pub mod element;
pub mod error;
pub mod extractor;
pub mod feedback;
pub mod generate;
pub mod infer;
pub mod page;
pub mod runner;
pub mod schema;
pub mod surface;

pub use browser::Browser;
pub use config::{Assertions, BrowserConfig, RunConfig, RunOptions};
pub use error::{Error, Result};
pub use infer::LogicalType;
pub use page::Page;
pub use runner::{run, FillOutcome, FillRunner, RunState};
pub use schema::{Constraint, FieldSchema, FillLog, FormSchema};
pub use surface::{BrowserSurface, ElementHandle};
