use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = frontdoor::cli::Cli::parse();
    if let Err(e) = frontdoor::cmd::dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
