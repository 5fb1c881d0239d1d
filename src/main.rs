use clap::Parser;
use css_purge::{handle_pipe_command, purge, Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    let verbose = matches!(&cli.command, Commands::Purge(args) if args.verbose);
    init_tracing(verbose);

    // Handle commands
    match cli.command {
        Commands::Purge(args) => {
            let dry_run = args.dry_run;
            match purge(args).await {
                Ok(result) => {
                    println!("Purge successful!");
                    println!("  - Scanned {} markup files", result.total_files_processed);
                    println!("  - Removed {} selectors", result.total_rejected);
                    for (path, output) in &result.outputs {
                        let before = output.report.statistics.as_ref().map_or(0, |s| s.input_size_bytes);
                        println!("  - {}: {} -> {} bytes", path.display(), before, output.css.len());
                    }
                    if dry_run {
                        println!("  - Dry run, nothing written");
                    }
                    for path in &result.written {
                        println!("  - Wrote {}", path.display());
                    }
                    Ok(())
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Pipe(args) => {
            // Handle pipe mode
            handle_pipe_command(args).await?;
            Ok(())
        }
    }
}

/// Diagnostics go to stderr; RUST_LOG overrides the default level
fn init_tracing(verbose: bool) {
    let default = if verbose { "css_purge=debug" } else { "css_purge=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
