//! Kafka Reaper
//!
//! Removes Aiven Kafka ACLs that reference deleted topics and service users
//! that nothing uses any more.
//!
//! # Usage
//! ```bash
//! # Delete ACLs for missing topics, then users without ACLs
//! kafka-reaper acls nav-dev --dry-run
//!
//! # Delete users with no deployed credential in nav-dev-fss/nav-dev-gcp
//! kafka-reaper users dev --team aura
//!
//! # Inspect one application
//! kafka-reaper investigate aura my-app --context nav-dev-gcp
//!
//! # Find where a service user is deployed
//! kafka-reaper find dev 'aura_my-app_.*'
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use kafka_reaper::aiven::DEFAULT_API_URL;
use kafka_reaper::credentials::{DeployedCredential, PROTECTED_ANNOTATION};
use kafka_reaper::investigate::{default_pool, find_credentials, investigate};
use kafka_reaper::{
    AclRunOptions, AivenClient, AivenConfig, CleanupReport, KubeCredentialSource, Reaper,
};

// ============================================================
// CLI Definition
// ============================================================

#[derive(Parser)]
#[command(name = "kafka-reaper")]
#[command(about = "Cleans up unused Aiven Kafka ACLs and service users", long_about = None)]
#[command(version)]
struct Cli {
    /// Aiven API token
    #[arg(long, env = "AIVEN_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// Aiven API base URL
    #[arg(long, env = "AIVEN_API_URL", default_value = DEFAULT_API_URL, global = true)]
    api_url: String,

    /// Request timeout in seconds
    #[arg(long, default_value = "30", global = true)]
    timeout: u64,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, ValueEnum)]
enum LogFormat {
    /// Human-readable text
    Text,
    /// JSON lines
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Delete ACLs for non-existing topics, then users without ACLs
    Acls {
        /// Aiven project to process
        project: String,

        /// Make no actual changes
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Kafka service name (default: <project>-kafka)
        #[arg(long)]
        service: Option<String>,

        /// Keep ACLs issued to dotted (old convention) usernames
        #[arg(long)]
        keep_old_convention: bool,
    },

    /// Delete users that have no deployed credential in any cluster
    Users {
        /// Environment to process (project nav-<env>)
        env: String,

        /// Make no actual changes
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Only operate on users/secrets belonging to team
        #[arg(short = 't', long)]
        team: Option<String>,

        /// Cluster contexts to search (default: nav-<env>-fss and nav-<env>-gcp)
        #[arg(long = "context")]
        contexts: Vec<String>,

        /// Kafka service name (default: <project>-kafka)
        #[arg(long)]
        service: Option<String>,
    },

    /// Show the users and ACLs Aiven holds for an application
    Investigate {
        /// Team to investigate
        team: String,

        /// Application to investigate
        app: String,

        /// Kubernetes context to use (default: current context)
        #[arg(long)]
        context: Option<String>,

        /// Aiven project to use (default: derived from the context)
        #[arg(long)]
        pool: Option<String>,
    },

    /// Find deployed credentials for a username
    Find {
        /// Environment to search
        env: String,

        /// Username to search for (regex, matched from the start)
        username: String,

        /// Cluster contexts to search (default: nav-<env>-fss and nav-<env>-gcp)
        #[arg(long = "context")]
        contexts: Vec<String>,
    },
}

// ============================================================
// Main Entry Point
// ============================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, &cli.log_format)?;

    match &cli.command {
        Commands::Acls {
            project,
            dry_run,
            service,
            keep_old_convention,
        } => {
            let aiven = aiven_client(&cli, project, service.as_deref())?;
            info!(project = %project, dry_run = *dry_run, "Cleaning up ACLs and users");

            let report = Reaper::new(&aiven)
                .reap_acls(AclRunOptions {
                    dry_run: *dry_run,
                    keep_old_convention: *keep_old_convention,
                })
                .await?;

            print_report(project, &report, &cli.log_format)?;
        }

        Commands::Users {
            env,
            dry_run,
            team,
            contexts,
            service,
        } => {
            let project = format!("nav-{}", env);
            let contexts = contexts_or_default(contexts, env);
            let aiven = aiven_client(&cli, &project, service.as_deref())?;
            info!(
                project = %project,
                contexts = ?contexts,
                team = team.as_deref().unwrap_or("<all>"),
                dry_run = *dry_run,
                "Cleaning up users without credentials"
            );

            let report = Reaper::new(&aiven)
                .reap_users(
                    &KubeCredentialSource::new(),
                    &contexts,
                    team.as_deref(),
                    *dry_run,
                )
                .await?;

            print_report(&project, &report, &cli.log_format)?;
        }

        Commands::Investigate {
            team,
            app,
            context,
            pool,
        } => {
            let context = match context {
                Some(c) => c.clone(),
                None => KubeCredentialSource::current_context()?,
            };
            let pool = pool.clone().unwrap_or_else(|| default_pool(&context));
            let aiven = aiven_client(&cli, &pool, None)?;

            let found = investigate(&aiven, &KubeCredentialSource::new(), &context, team, app)
                .await?;

            println!(
                "Found {} users in {} with app={}",
                found.usernames.len(),
                context,
                app
            );
            for username in &found.usernames {
                println!(" * {}", username);
            }

            if found.users.is_empty() {
                println!("No matching users found in Aiven for {}", team);
            }
            for user in &found.users {
                println!("Found matching user in Aiven: {}", user);
            }

            if found.acls.is_empty() {
                println!("No matching ACLs found in Aiven for {}", team);
            }
            for acl in &found.acls {
                println!("Found matching ACL in Aiven: {}", acl);
            }
        }

        Commands::Find {
            env,
            username,
            contexts,
        } => {
            let contexts = contexts_or_default(contexts, env);
            let found = find_credentials(&KubeCredentialSource::new(), &contexts, username).await?;

            println!("Found {} secrets for {}", found.len(), username);
            for credential in &found {
                print_credential(credential);
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, format: &LogFormat) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
    }

    Ok(())
}

fn aiven_client(cli: &Cli, project: &str, service: Option<&str>) -> Result<AivenClient> {
    let token = cli
        .token
        .clone()
        .context("AIVEN_TOKEN must be set (or pass --token)")?;

    let mut config = AivenConfig::new(project, token)
        .with_api_url(cli.api_url.clone())
        .with_timeout(Duration::from_secs(cli.timeout));
    if let Some(service) = service {
        config = config.with_service(service);
    }

    AivenClient::new(config).context("Failed to build Aiven client")
}

fn contexts_or_default(contexts: &[String], env: &str) -> Vec<String> {
    if contexts.is_empty() {
        ["fss", "gcp"]
            .iter()
            .map(|kind| format!("nav-{}-{}", env, kind))
            .collect()
    } else {
        contexts.to_vec()
    }
}

fn print_report(project: &str, report: &CleanupReport, format: &LogFormat) -> Result<()> {
    match format {
        LogFormat::Text => println!("✅ {}: {}", project, report),
        LogFormat::Json => println!("{}", serde_json::to_string(report)?),
    }
    Ok(())
}

fn print_credential(credential: &DeployedCredential) {
    let payload = &credential.payload;
    let created_at = payload.created_at.map(|t| t.to_rfc3339());

    let rows = [
        ("secretname", Some(credential.name.as_str())),
        ("username", Some(credential.username.as_str())),
        ("context", Some(credential.context.as_str())),
        ("updated_at", payload.updated_at()),
        ("secret_created_at", created_at.as_deref()),
        ("team", payload.label("team")),
        ("namespace", Some(credential.namespace.as_str())),
        ("app", payload.label("app")),
        ("protected", payload.annotation(PROTECTED_ANNOTATION)),
    ];

    println!("{}", "-".repeat(60));
    for (key, value) in rows {
        println!("{:<20} {}", key, value.unwrap_or("-"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_contexts() {
        let contexts = contexts_or_default(&[], "dev");
        assert_eq!(contexts, vec!["nav-dev-fss", "nav-dev-gcp"]);
        assert!(contexts.iter().all(|c| default_pool(c) == "nav-dev"));
        assert_eq!(
            contexts_or_default(&["nav-prod-gcp".to_string()], "dev"),
            vec!["nav-prod-gcp"]
        );
    }

    #[test]
    fn test_cli_acls_keeps_old_convention_only_on_request() {
        let cli = Cli::try_parse_from(["kafka-reaper", "acls", "nav-dev"]).unwrap();
        match cli.command {
            Commands::Acls {
                keep_old_convention,
                ..
            } => assert!(!keep_old_convention),
            _ => panic!("expected acls command"),
        }

        let cli = Cli::try_parse_from(["kafka-reaper", "acls", "nav-dev", "--keep-old-convention"])
            .unwrap();
        match cli.command {
            Commands::Acls {
                keep_old_convention,
                ..
            } => assert!(keep_old_convention),
            _ => panic!("expected acls command"),
        }
    }

    #[test]
    fn test_report_json() {
        let report = CleanupReport {
            dry_run: true,
            acls_deleted: 1,
            users_deleted: 2,
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["dry_run"], true);
        assert_eq!(value["acls_deleted"], 1);
        assert_eq!(value["users_deleted"], 2);
    }

    #[test]
    fn test_cli_parses_users_flags() {
        let cli = Cli::try_parse_from([
            "kafka-reaper",
            "users",
            "dev",
            "-n",
            "-t",
            "aura",
            "--context",
            "nav-dev-gcp",
        ])
        .unwrap();

        match cli.command {
            Commands::Users {
                env,
                dry_run,
                team,
                contexts,
                ..
            } => {
                assert_eq!(env, "dev");
                assert!(dry_run);
                assert_eq!(team.as_deref(), Some("aura"));
                assert_eq!(contexts, vec!["nav-dev-gcp"]);
            }
            _ => panic!("expected users command"),
        }
    }
}
