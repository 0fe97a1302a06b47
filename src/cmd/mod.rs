//! Subcommand dispatch and execution.
//!
//! The [`dispatch`] function routes the parsed CLI to the appropriate
//! subcommand handler: [`run`], [`init`] or [`validate`]. Each handler
//! lives in its own submodule.

pub mod init;
pub mod run;
pub mod validate;

use crate::cli::{Cli, Commands};
use crate::error::FrontdoorError;

pub async fn dispatch(cli: Cli) -> Result<(), FrontdoorError> {
    match cli.command {
        Some(Commands::Run(args)) => run::execute(*args).await,
        Some(Commands::Init(ref args)) => init::execute(args),
        Some(Commands::Validate(ref args)) => validate::execute(args),
        None => {
            print_welcome();
            Ok(())
        }
    }
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        "\n  frontdoor v{version}: host and path routed HTTP front door\n\n  \
         No command provided. To get started:\n\n    \
         frontdoor init                  Generate a starter route file\n    \
         frontdoor run                   Serve (auto-detects ./frontdoor.yaml)\n    \
         frontdoor run -c routes.yaml    Serve with a specific route file\n    \
         frontdoor --help                See all commands and options\n"
    );
}
