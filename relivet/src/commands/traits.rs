//! Command trait shared by all relivet subcommands.

use std::time::Instant;

use crate::error::Result;

/// A relivet subcommand.
pub trait Command: Sized {
    /// The arguments type for this command.
    type Args;

    /// The output type returned by this command.
    type Output;

    fn new(args: Self::Args) -> Self;

    fn execute(&self) -> Result<Self::Output>;

    /// The command name, as typed on the command line.
    fn name() -> &'static str;
}

/// Build and execute `C`, tracing its duration.
pub fn execute<C: Command>(args: C::Args) -> Result<C::Output> {
    let start = Instant::now();
    tracing::debug!("running `{}`", C::name());
    let result = C::new(args).execute();
    tracing::debug!(
        "`{}` finished in {:.2}s (ok: {})",
        C::name(),
        start.elapsed().as_secs_f64(),
        result.is_ok()
    );
    result
}
