use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indexmap::IndexMap;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;

use crate::auth::Token;
use crate::config::{Config, OutputFormat, ServiceConfig};
use crate::error::BuildLensError;
use crate::output::{print_summary, PhaseProgress};
use crate::providers::azure::types::{Build, BuildDefinition, Project, Release};
use crate::providers::AzureProvider;
use crate::report::BuildReport;

#[derive(Parser)]
#[command(name = "buildlens")]
#[command(author, version, about = "Azure DevOps build diagnostics", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./buildlens.{toml,json,yaml})
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(short, long, global = true, value_enum)]
    format: Option<OutputFormat>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,

    #[command(flatten)]
    service: ServiceArgs,
}

#[derive(Args)]
struct ServiceArgs {
    #[arg(long, global = true, env = "AZURE_DEVOPS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[arg(long, global = true, env = "AZURE_DEVOPS_URL")]
    url: Option<String>,

    #[arg(long, global = true, env = "AZURE_DEVOPS_RELEASE_URL")]
    release_url: Option<String>,

    #[arg(long, global = true, env = "AZURE_DEVOPS_COLLECTION")]
    collection: Option<String>,

    #[arg(short = 'P', long, global = true, env = "AZURE_DEVOPS_PROJECT")]
    project: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Latest completed build of one or more definitions, with its timeline
    Latest {
        #[arg(short, long = "definition", required = true, num_args = 1..)]
        definitions: Vec<i64>,

        #[arg(short, long)]
        branch: Option<String>,

        /// Also resolve the release created from the build
        #[arg(long, default_value_t = false)]
        release: bool,

        /// Fetch the log of every timeline record with this name
        #[arg(long = "log")]
        logs: Vec<String>,
    },

    /// A specific build by id, with its timeline
    Build {
        #[arg(short, long)]
        definition: i64,

        #[arg(long)]
        build_id: i64,

        #[arg(long = "log")]
        logs: Vec<String>,
    },

    /// The release created from the latest completed build
    Release {
        #[arg(short, long)]
        definition: i64,

        #[arg(short, long)]
        branch: Option<String>,
    },
}

impl ServiceArgs {
    fn apply(&self, service: &mut ServiceConfig) {
        if self.token.is_some() {
            service.token.clone_from(&self.token);
        }
        if self.project.is_some() {
            service.project_id.clone_from(&self.project);
        }
        if let Some(url) = &self.url {
            service.build_url.clone_from(url);
        }
        if let Some(release_url) = &self.release_url {
            service.release_url.clone_from(release_url);
        }
        if let Some(collection) = &self.collection {
            service.collection.clone_from(collection);
        }
        if let Some(timeout) = self.timeout {
            service.timeout_secs = timeout;
        }
    }
}

/// Runs the resolved build through the timeline (and, optionally, release) phase.
async fn resolve_details(
    provider: &AzureProvider,
    build: Build,
    with_release: bool,
) -> Result<(Build, Option<Release>)> {
    let build = Arc::new(build);

    // Timeline and release only depend on the build, so fetch them together
    let (records, release) = tokio::join!(
        provider.get_build_timeline_records(&build),
        async {
            if with_release {
                provider.get_release(&build).await.map(Some)
            } else {
                Ok(None)
            }
        }
    );

    let release = match release {
        Ok(release) => release,
        Err(BuildLensError::NotFound(e)) => {
            warn!("{e}");
            None
        }
        Err(e) => return Err(e.into()),
    };

    let build = Build::clone(&build).with_timeline(records?);

    Ok((build, release))
}

/// Fetches the logs of all records named in `names`, concurrently.
async fn fetch_logs(
    provider: &AzureProvider,
    build: &Build,
    names: &[String],
) -> IndexMap<String, String> {
    let requests: Vec<_> = names
        .iter()
        .flat_map(|name| build.records_named(name))
        .filter_map(|record| record.log.as_ref().map(|log| (record, log)))
        .map(|(record, log)| async move {
            let content = provider.fetch_log_content(log).await;
            (record.name.clone(), content)
        })
        .collect();

    let mut logs = IndexMap::new();
    for (name, content) in futures::future::join_all(requests).await {
        match content {
            Ok(content) => {
                logs.entry(name).or_insert_with(String::new).push_str(&content);
            }
            Err(e) => warn!("Skipping log for {name}: {e}"),
        }
    }

    logs
}

impl Cli {
    fn emit(&self, reports: &[BuildReport], format: OutputFormat, pretty: bool) -> Result<()> {
        match format {
            OutputFormat::Json => {
                let json_output = if pretty {
                    serde_json::to_string_pretty(reports)?
                } else {
                    serde_json::to_string(reports)?
                };

                if let Some(output_path) = &self.output {
                    std::fs::write(output_path, json_output)?;
                    info!("Report written to: {}", output_path.display());
                } else {
                    println!("{}", json_output);
                }
            }
            OutputFormat::Summary => reports.iter().for_each(print_summary),
        }

        Ok(())
    }

    async fn execute_latest(
        provider: &AzureProvider,
        project: &Arc<Project>,
        definitions: &[i64],
        branch: Option<&str>,
        with_release: bool,
        logs: &[String],
    ) -> Result<Vec<BuildReport>> {
        let mut reports = Vec::with_capacity(definitions.len());

        for &definition_id in definitions {
            // Each definition is an independent reporting run
            provider.reset_branch_cache();

            let progress = PhaseProgress::start(
                &format!("Definition {definition_id}"),
                4,
                "Resolving build definition",
            );
            let definition = provider
                .get_build_definition(project, definition_id)
                .await
                .with_context(|| format!("Failed to resolve build definition {definition_id}"))?;

            let progress = progress.next("Fetching latest completed build");
            let build = Self::latest_build(provider, &definition, branch).await?;

            let progress = progress.next("Fetching timeline");
            let (build, release) = resolve_details(provider, build, with_release).await?;

            let progress = progress.next("Fetching logs");
            let logs = fetch_logs(provider, &build, logs).await;
            progress.finish();

            info!(
                "Resolved build {} ({} timeline records) for {}",
                build.build_number,
                build.timeline_records.len(),
                definition.name
            );

            reports.push(BuildReport::new(&definition, build, release, logs));
        }

        Ok(reports)
    }

    async fn latest_build(
        provider: &AzureProvider,
        definition: &Arc<BuildDefinition>,
        branch: Option<&str>,
    ) -> Result<Build> {
        let build = match branch {
            Some(branch) => provider.get_latest_build_for_branch(definition, branch).await,
            None => provider.get_latest_build(definition).await,
        };

        build.with_context(|| format!("Failed to find latest build of {}", definition.name))
    }

    async fn execute_build(
        provider: &AzureProvider,
        project: &Arc<Project>,
        definition_id: i64,
        build_id: i64,
        logs: &[String],
    ) -> Result<Vec<BuildReport>> {
        let progress = PhaseProgress::start(&format!("Build {build_id}"), 3, "Fetching build");
        let definition = provider.get_build_definition(project, definition_id).await?;
        let build = provider
            .get_build(&definition, build_id)
            .await
            .with_context(|| format!("Failed to fetch build {build_id}"))?;

        let progress = progress.next("Fetching timeline");
        let build = provider.populate_timeline(build).await?;

        let progress = progress.next("Fetching logs");
        let logs = fetch_logs(provider, &build, logs).await;
        progress.finish();

        Ok(vec![BuildReport::new(&definition, build, None, logs)])
    }

    async fn execute_release(
        provider: &AzureProvider,
        project: &Arc<Project>,
        definition_id: i64,
        branch: Option<&str>,
    ) -> Result<Vec<BuildReport>> {
        let progress = PhaseProgress::start(
            &format!("Definition {definition_id}"),
            2,
            "Fetching latest completed build",
        );
        let definition = provider.get_build_definition(project, definition_id).await?;
        let build = Arc::new(Self::latest_build(provider, &definition, branch).await?);

        let progress = progress.next("Fetching release");
        let release = provider
            .get_release(&build)
            .await
            .with_context(|| format!("Failed to find release for build {}", build.build_number))?;
        progress.finish();

        let build = Build::clone(&build);
        Ok(vec![BuildReport::new(
            &definition,
            build,
            Some(release),
            IndexMap::new(),
        )])
    }

    pub async fn execute(&self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;

        let mut service = config.service;
        self.service.apply(&mut service);

        let token = service
            .token
            .as_deref()
            .context("Missing personal access token (--token, AZURE_DEVOPS_TOKEN or service.token)")?;
        let project_id = service
            .project_id
            .clone()
            .context("Missing project (--project, AZURE_DEVOPS_PROJECT or service.project-id)")?;

        let project = Arc::new(Project {
            name: service.project_name.clone().unwrap_or_else(|| project_id.clone()),
            id: project_id,
        });

        info!("Resolving builds for project: {}", project.name);

        let provider = AzureProvider::new(&service.endpoints(), Token::from(token))?;

        let reports = match &self.command {
            Commands::Latest {
                definitions,
                branch,
                release,
                logs,
            } => {
                Self::execute_latest(
                    &provider,
                    &project,
                    definitions,
                    branch.as_deref(),
                    *release,
                    logs,
                )
                .await?
            }
            Commands::Build {
                definition,
                build_id,
                logs,
            } => Self::execute_build(&provider, &project, *definition, *build_id, logs).await?,
            Commands::Release { definition, branch } => {
                Self::execute_release(&provider, &project, *definition, branch.as_deref()).await?
            }
        };

        let format = self.format.unwrap_or(config.output.format);
        self.emit(&reports, format, self.pretty || config.output.pretty)
    }
}
