pub mod app;
pub mod autofix;
pub mod commands;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod output;
pub mod proofs;
pub mod refresh;
pub mod resolve;
pub mod runtime;
pub mod serve;
pub mod sync;
pub mod validate;
pub mod watch;

pub use app::run;
pub use env::CliArgs;
pub use output::OutputFormat;
