use clap::Parser;
use miette::Result;
use lotguard::cli::{Cli, Commands};
use lotguard::core::logging::{self, Verbosity};
use lotguard::core::{Config, Project};

fn main() -> Result<()> {
    // Reset SIGPIPE to default behavior (terminate silently) for proper Unix piping.
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
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
    let global = cli.global;

    let config = match global.project {
        Some(ref path) => Config::load_for(Project::discover_from(path).ok().as_ref()),
        None => Config::load(),
    };
    logging::init(
        Verbosity::from_flags(global.quiet, global.verbose),
        config.log.as_deref(),
    )?;

    match cli.command {
        Commands::Init(args) => lotguard::cli::commands::init::run(args),
        Commands::Eqp(cmd) => lotguard::cli::commands::eqp::run(cmd, &global),
        Commands::Derive(args) => lotguard::cli::commands::derive::run(args, &global),
        Commands::Validate(args) => lotguard::cli::commands::validate::run(args, &global),
        Commands::Completions(args) => lotguard::cli::commands::completions::run(args),
    }
}
