//! classdrive CLI - Google Drive provisioning for course rosters.
//!
//! Creates one shared document, spreadsheet or folder per student or team
//! inside a course folder, keeps its sharing list in sync with the roster,
//! and converts course-management CSV exports into roster JSON.

mod config;
mod session;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

use classdrive_common::{ArtifactKind, Error, Role};
use classdrive_provision::{
    lock_folder, resolve_folder, share_folder, ProvisionJob, ProvisionOptions,
};
use classdrive_roster::{
    import_students, import_teams, instructor_emails, load_instructors, NameOrder, NamingScheme,
    Roster, RosterFile, RosterSink,
};

use crate::config::AppConfig;

/// Exit code for configuration errors (missing or ambiguous folder, bad settings).
const EXIT_CONFIG: u8 = 2;

#[derive(Parser)]
#[command(name = "classdrive")]
#[command(about = "classdrive - Google Drive files and sharing for course rosters")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file (default: <config dir>/classdrive/config.json).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Google OAuth client-secret JSON.
    #[arg(long, global = true)]
    credentials: Option<PathBuf>,

    /// Where OAuth tokens are cached between runs.
    #[arg(long, global = true)]
    token_cache: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or reuse one artifact per roster entry and share it.
    Provision {
        /// Roster JSON file; updated with the artifact ids.
        #[arg(short, long)]
        roster: PathBuf,

        /// Name of the course folder that holds the artifacts.
        #[arg(short, long)]
        folder: String,

        /// Artifact kind: document, spreadsheet or folder.
        #[arg(short, long)]
        kind: ArtifactKind,

        /// Naming token prefixed to every artifact, e.g. "hw1".
        #[arg(short, long)]
        affix: String,

        /// Instructor JSON file; every instructor is added to every artifact.
        #[arg(short, long)]
        instructors: Option<PathBuf>,

        /// The roster lists teams instead of individual students.
        #[arg(long)]
        team: bool,

        /// Role granted to students (default from settings).
        #[arg(long)]
        role: Option<Role>,

        /// Order of names in individual artifact names.
        #[arg(long, default_value_t = NameOrder::SurnameFirst)]
        name_order: NameOrder,

        /// Append member surnames to team artifact names.
        #[arg(long)]
        team_surnames: bool,

        /// Domain appended to team member ccids.
        #[arg(long)]
        domain: Option<String>,

        /// Rewrite the roster after every entry that gains an id.
        #[arg(long)]
        checkpoint: bool,

        /// Only look up artifacts; create and share nothing.
        #[arg(long)]
        dry_run: bool,

        /// Also write the run report as JSON.
        #[arg(long)]
        report_json: Option<PathBuf>,
    },

    /// Share the course folder itself with the whole roster.
    ShareFolder {
        /// Roster JSON file.
        #[arg(short, long)]
        roster: PathBuf,

        /// Name of the course folder.
        #[arg(short, long)]
        folder: String,

        /// Role granted on the folder.
        #[arg(long)]
        role: Role,

        /// Instructor JSON file.
        #[arg(short, long)]
        instructors: Option<PathBuf>,

        /// Domain appended to team member ccids.
        #[arg(long)]
        domain: Option<String>,
    },

    /// Downgrade every grant on the files of a folder, e.g. after a deadline.
    Lock {
        /// Name of the course folder.
        #[arg(short, long)]
        folder: String,

        /// Only lock files whose name contains this.
        #[arg(short, long)]
        affix: Option<String>,

        /// Role every non-owner grant is set to.
        #[arg(long, default_value_t = Role::Reader)]
        role: Role,
    },

    /// Convert a student CSV export to roster JSON.
    ImportStudents {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Convert a team CSV export to roster JSON.
    ImportTeams {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Authorize classdrive with Google and cache the token.
    Auth,

    /// Print shell completions.
    Completions {
        shell: clap_complete::Shell,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

/// Map a fatal error to the process exit code.
fn exit_code(err: &anyhow::Error) -> u8 {
    let config_error = err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<Error>(),
            Some(Error::Config(_) | Error::NotFound(_) | Error::Ambiguous(_))
        )
    });
    if config_error {
        EXIT_CONFIG
    } else {
        1
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = AppConfig::load(cli.config.as_deref())?
        .with_overrides(cli.credentials, cli.token_cache);

    match cli.command {
        Commands::Provision {
            roster,
            folder,
            kind,
            affix,
            instructors,
            team,
            role,
            name_order,
            team_surnames,
            domain,
            checkpoint,
            dry_run,
            report_json,
        } => {
            let naming = NamingScheme::new(affix)
                .map_err(|e| Error::Config(e.to_string()))?
                .with_order(name_order)
                .with_team_surnames(team_surnames);

            let mut options = ProvisionOptions::new(naming, kind);
            options.role = role.unwrap_or(settings.default_role);
            options.email_domain = settings.email_domain(domain.as_deref()).to_string();
            options.instructors = read_instructors(instructors.as_deref())?;
            options.expect_teams = Some(team);
            options.dry_run = dry_run;

            cmd_provision(&settings, options, &roster, &folder, checkpoint, report_json.as_deref())
                .await
        }

        Commands::ShareFolder {
            roster,
            folder,
            role,
            instructors,
            domain,
        } => {
            let instructors = read_instructors(instructors.as_deref())?;
            let domain = settings.email_domain(domain.as_deref()).to_string();
            cmd_share_folder(&settings, &roster, &folder, role, &instructors, &domain).await
        }

        Commands::Lock { folder, affix, role } => {
            cmd_lock(&settings, &folder, affix.as_deref(), role).await
        }

        Commands::ImportStudents { input, output } => {
            cmd_import(&input, &output, |file| Ok(import_students(file)?))
        }

        Commands::ImportTeams { input, output } => {
            cmd_import(&input, &output, |file| Ok(import_teams(file)?))
        }

        Commands::Auth => session::login(&settings).await,

        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "classdrive", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn read_instructors(path: Option<&Path>) -> Result<Vec<String>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let instructors = load_instructors(path)
        .with_context(|| format!("Failed to load instructors from {}", path.display()))?;
    Ok(instructor_emails(&instructors))
}

/// Provision one artifact per roster entry.
async fn cmd_provision(
    settings: &AppConfig,
    options: ProvisionOptions,
    roster_path: &Path,
    folder_name: &str,
    checkpoint: bool,
    report_json: Option<&Path>,
) -> Result<()> {
    let roster_file = RosterFile::new(roster_path);
    let mut roster = roster_file.load().context("Failed to load roster")?;
    let dry_run = options.dry_run;

    let job = ProvisionJob::new(options)?;
    job.validate_roster(&roster)?;

    let client = session::connect(settings).await?;
    let folder = resolve_folder(&client, folder_name).await?;

    let sink: Option<&dyn RosterSink> = if checkpoint && !dry_run {
        Some(&roster_file)
    } else {
        None
    };
    let report = job.run(&client, &folder, &mut roster, sink).await?;

    if !dry_run {
        roster_file
            .save(&roster)
            .with_context(|| format!("Failed to write roster {}", roster_path.display()))?;
        info!("Wrote {}", roster_path.display());
    }

    print!("{}", report);

    if let Some(path) = report_json {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
    }

    Ok(())
}

/// Share the course folder itself with the class.
async fn cmd_share_folder(
    settings: &AppConfig,
    roster_path: &Path,
    folder_name: &str,
    role: Role,
    instructors: &[String],
    domain: &str,
) -> Result<()> {
    let roster = RosterFile::new(roster_path)
        .load()
        .context("Failed to load roster")?;

    let client = session::connect(settings).await?;
    let folder = resolve_folder(&client, folder_name).await?;

    let report = share_folder(&client, &folder, &roster, domain, instructors, role).await?;

    println!(
        "Folder {}: {} grants removed, {} people granted {}, {} failed",
        folder_name,
        report.removed.len(),
        report.added.len(),
        role,
        report.failures.len()
    );
    for failure in &report.failures {
        println!("  {}", failure);
    }

    Ok(())
}

/// Downgrade the grants of every matching file in a folder.
async fn cmd_lock(settings: &AppConfig, folder_name: &str, affix: Option<&str>, role: Role) -> Result<()> {
    let client = session::connect(settings).await?;
    let folder = resolve_folder(&client, folder_name).await?;

    let report = lock_folder(&client, &folder, affix, role).await?;
    print!("{}", report);

    Ok(())
}

/// Convert a CSV export into a roster file.
fn cmd_import(
    input: &Path,
    output: &Path,
    convert: impl FnOnce(std::fs::File) -> Result<Roster>,
) -> Result<()> {
    let file = std::fs::File::open(input)
        .with_context(|| format!("Failed to open {}", input.display()))?;
    let roster = convert(file).with_context(|| format!("Failed to import {}", input.display()))?;

    RosterFile::new(output)
        .save(&roster)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "Wrote {} entries ({} teams, {} students) to {}",
        roster.len(),
        roster.team_count(),
        roster.individual_count(),
        output.display()
    );

    Ok(())
}
