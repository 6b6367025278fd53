use clap::Parser;
use miette::Result;
use ferp::cli::{Cli, Commands};

fn main() -> Result<()> {
    // Install miette's fancy error handler for readable diagnostics
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    ferp::logging::init(cli.global.verbose);

    let global = cli.global;
    match cli.command {
        Commands::Init(args) => ferp::cli::commands::init::run(args),
        Commands::Mat(cmd) => ferp::cli::commands::mat::run(cmd, &global),
        Commands::Bom(cmd) => ferp::cli::commands::bom::run(cmd, &global),
        Commands::Mo(cmd) => ferp::cli::commands::mo::run(cmd, &global),
        Commands::Completions(args) => ferp::cli::commands::completions::run(args),
    }
}
