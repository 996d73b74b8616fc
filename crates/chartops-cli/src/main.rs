//! chartops CLI - package reference charts and publish them to GitOps repositories

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod exit_codes;
mod util;

use commands::publish::PublishArgs;
use error::Result;

#[derive(Parser)]
#[command(name = "chartops")]
#[command(author = "chartops Contributors")]
#[command(version)]
#[command(about = "Package reference charts and publish them to GitOps repositories", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Configuration file (default: ~/.config/chartops/config.yaml)
    #[arg(long, global = true, env = "CHARTOPS_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the version declared in a chart's Chart.yaml
    Version {
        /// Chart directory
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Show default values and override files of a reference chart
    Values {
        /// Reference chart directory
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Chart name (default: from Chart.yaml)
        #[arg(long)]
        name: Option<String>,

        /// Chart version (default: from Chart.yaml)
        #[arg(long = "chart-version")]
        chart_version: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Stamp Chart.yaml and package a reference chart into a .tgz archive
    Package {
        /// Reference chart directory
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Chart name (default: from Chart.yaml)
        #[arg(long)]
        name: Option<String>,

        /// Chart version (default: from Chart.yaml)
        #[arg(long = "chart-version")]
        chart_version: Option<String>,

        /// apiVersion written into Chart.yaml
        #[arg(long, default_value = chartops_core::API_VERSION_V1)]
        api_version: String,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Package a reference chart and push it to a GitOps repository
    Publish {
        /// Reference chart directory
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Chart name (default: from Chart.yaml)
        #[arg(long)]
        name: Option<String>,

        /// Chart version (default: from Chart.yaml)
        #[arg(long = "chart-version")]
        chart_version: Option<String>,

        /// Publish as a shared chart under <base-template>/<version>
        #[arg(long, conflicts_with_all = ["app", "env"])]
        base_template: Option<String>,

        /// Publish as the proxy chart of this app under <app>-<env>
        #[arg(long, requires = "env")]
        app: Option<String>,

        /// Environment of the proxy chart
        #[arg(long, requires = "app")]
        env: Option<String>,

        /// Target repository (default: derived from the template or app name)
        #[arg(long)]
        repo: Option<String>,

        /// Directory holding the bare GitOps repositories
        #[arg(long, env = "CHARTOPS_HOSTING_ROOT")]
        hosting_root: Option<PathBuf>,

        /// Commit author email
        #[arg(long)]
        author: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(debug)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Version { path } => commands::version::run(&path),

        Commands::Values {
            path,
            name,
            chart_version,
            json,
        } => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::values::run(&config, &path, name.as_deref(), chart_version.as_deref(), json)
        }

        Commands::Package {
            path,
            name,
            chart_version,
            api_version,
            output,
        } => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::package::run(
                &config,
                &path,
                name.as_deref(),
                chart_version.as_deref(),
                &api_version,
                &output,
            )
        }

        Commands::Publish {
            path,
            name,
            chart_version,
            base_template,
            app,
            env,
            repo,
            hosting_root,
            author,
            json,
        } => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::publish::run(
                &config,
                PublishArgs {
                    path: &path,
                    name: name.as_deref(),
                    version: chart_version.as_deref(),
                    base_template: base_template.as_deref(),
                    app: app.as_deref(),
                    env: env.as_deref(),
                    repo: repo.as_deref(),
                    hosting_root: hosting_root.as_deref(),
                    author: author.as_deref(),
                    json,
                },
            )
            .await
        }
    }
}

#[tokio::main]
async fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.debug);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}
