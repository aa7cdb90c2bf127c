pub mod cli;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod emit;
pub mod error;
pub mod key;
pub mod lock;
pub mod logging;
pub mod pbxproj;
pub mod project;
pub mod resolve;
pub mod runtime;
pub mod sections;
pub mod substitute;

// Convenience re-exports
pub use dispatch::{Engine, Prepared, Report, Selection, Settings, Sink};
pub use error::{Error, Warning};
pub use key::{ResolvedKey, ResolvedMap};
pub use resolve::Resolver;
pub use sections::{SectionId, SectionTable};
pub use substitute::{Substitution, TargetOverlay, Variables};
