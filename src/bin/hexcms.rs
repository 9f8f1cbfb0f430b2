// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use hexcms::{
    asset::{CustomCode, WebFont},
    build::{RunConclusion, RunStatus, SuccessTracker, WorkflowRun, IDLE_INTERVAL, RECENT_RUNS},
    config::{RepoCoordinates, SiteDefinition},
    path::default_state_dir,
    post::{Post, PostInput, PostStatus, PostUpdate},
    session::Session,
    snapshot::ConfigSnapshot,
    vault::{Credential, Vault},
    version::VersionChecker,
};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Confirm, Password};
use std::{fs::read_to_string, path::PathBuf, process::exit, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "hexcms [options] <hexcms-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    async fn run(self) -> Result<()> {
        match self.command {
            Command::Login(opts) => run_login(opts).await,
            Command::Logout => run_logout().await,
            Command::Whoami => run_whoami().await,
            Command::List(opts) => run_list(opts).await,
            Command::Show(opts) => run_show(opts).await,
            Command::New(opts) => run_new(opts).await,
            Command::Edit(opts) => run_edit(opts).await,
            Command::Publish(opts) => run_publish(opts, true).await,
            Command::Unpublish(opts) => run_publish(opts, false).await,
            Command::Delete(opts) => run_delete(opts).await,
            Command::Builds(opts) => run_builds(opts).await,
            Command::Config(opts) => run_config(opts).await,
            Command::Upload(opts) => run_upload(opts).await,
            Command::Favicon(opts) => run_favicon(opts).await,
            Command::Custom(opts) => run_custom(opts).await,
            Command::Font(command) => run_font(command).await,
            Command::CheckUpdate(opts) => run_check_update(opts).await,
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Log in to repository with personal access token.
    #[command(override_usage = "hexcms login [options] <owner>/<repo>")]
    Login(LoginOptions),

    /// Log out, wiping stored credential.
    Logout,

    /// Show account and repository of current session.
    Whoami,

    /// List posts, newest first.
    #[command(override_usage = "hexcms list [options]")]
    List(ListOptions),

    /// Show single post.
    #[command(override_usage = "hexcms show <path>")]
    Show(PathOptions),

    /// Create new post.
    #[command(override_usage = "hexcms new [options] <title>")]
    New(NewOptions),

    /// Edit existing post.
    #[command(override_usage = "hexcms edit [options] <path>")]
    Edit(EditOptions),

    /// Publish draft.
    #[command(override_usage = "hexcms publish [options] <path>")]
    Publish(RevisionOptions),

    /// Turn published post back into draft.
    #[command(override_usage = "hexcms unpublish [options] <path>")]
    Unpublish(RevisionOptions),

    /// Delete post.
    #[command(override_usage = "hexcms delete [options] <path>")]
    Delete(DeleteOptions),

    /// Show recent site builds.
    #[command(override_usage = "hexcms builds [options]")]
    Builds(BuildsOptions),

    /// Show, edit, or restore site and theme configuration.
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Upload image into site assets.
    #[command(override_usage = "hexcms upload [options] <file>")]
    Upload(UploadOptions),

    /// Upload favicon and point theme configuration at it.
    #[command(override_usage = "hexcms favicon <file>")]
    Favicon(AssetFileOptions),

    /// Show or replace custom.css or custom.js of site.
    #[command(override_usage = "hexcms custom [options] <css|js>")]
    Custom(CustomOptions),

    /// Upload, list, apply, or remove web fonts.
    #[command(subcommand)]
    Font(FontCommand),

    /// Check for newer hexcms release.
    CheckUpdate(CheckUpdateOptions),
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print site and theme configuration.
    Show,

    /// Replace site configuration with content of file.
    SaveSite(ConfigFileOptions),

    /// Replace theme configuration with content of file.
    SaveTheme(ConfigFileOptions),

    /// Restore configuration of last successful build.
    Restore(ConfirmOptions),
}

#[derive(Debug, Clone, Subcommand)]
enum FontCommand {
    /// Upload font files into fonts directory.
    Upload(FontUploadOptions),

    /// List uploaded fonts.
    List,

    /// Apply font to site through custom.css.
    Apply(FontNameOptions),

    /// Remove uploaded font.
    Remove(FontRemoveOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct LoginOptions {
    /// Repository that holds Hexo site.
    #[arg(value_name = "owner/repo")]
    pub repository: String,

    /// Branch to read from and commit to.
    #[arg(short, long, value_name = "branch", default_value = "main")]
    pub branch: String,

    /// Personal access token, prompted for if absent.
    #[arg(short, long, value_name = "token")]
    pub token: Option<String>,

    /// GitHub Enterprise API location.
    #[arg(long, value_name = "url")]
    pub api_base: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ListOptions {
    /// Which posts to list: published, draft, or all.
    #[arg(short, long, value_name = "status", default_value = "all")]
    pub status: PostStatus,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct PathOptions {
    /// Path of post in repository.
    #[arg(value_name = "path")]
    pub path: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct NewOptions {
    /// Title of post.
    #[arg(value_name = "title")]
    pub title: String,

    /// File to read Markdown body from.
    #[arg(short = 'f', long, value_name = "file")]
    pub body_file: Option<PathBuf>,

    /// Tag of post, may be repeated.
    #[arg(short, long = "tag", value_name = "tag")]
    pub tags: Vec<String>,

    /// Category of post, may be repeated.
    #[arg(short, long = "category", value_name = "category")]
    pub categories: Vec<String>,

    /// Create post as draft.
    #[arg(short, long)]
    pub draft: bool,

    /// Short description of post.
    #[arg(long, value_name = "text")]
    pub description: Option<String>,

    /// Cover image URL.
    #[arg(long, value_name = "url")]
    pub cover: Option<String>,

    /// Explicit slug instead of one derived from title.
    #[arg(long, value_name = "slug")]
    pub slug: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct EditOptions {
    /// Path of post in repository.
    #[arg(value_name = "path")]
    pub path: String,

    /// Revision the edit is based on, defaults to current one.
    #[arg(long, value_name = "sha")]
    pub sha: Option<String>,

    /// New title.
    #[arg(long, value_name = "title")]
    pub title: Option<String>,

    /// File to read new Markdown body from.
    #[arg(short = 'f', long, value_name = "file")]
    pub body_file: Option<PathBuf>,

    /// Replace tags, may be repeated.
    #[arg(short, long = "tag", value_name = "tag")]
    pub tags: Option<Vec<String>>,

    /// Replace categories, may be repeated.
    #[arg(short, long = "category", value_name = "category")]
    pub categories: Option<Vec<String>>,

    /// New description, empty to remove.
    #[arg(long, value_name = "text")]
    pub description: Option<String>,

    /// New cover image URL, empty to remove.
    #[arg(long, value_name = "url")]
    pub cover: Option<String>,

    /// New slug, empty to remove.
    #[arg(long, value_name = "slug")]
    pub slug: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct RevisionOptions {
    /// Path of post in repository.
    #[arg(value_name = "path")]
    pub path: String,

    /// Revision the change is based on, defaults to current one.
    #[arg(long, value_name = "sha")]
    pub sha: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct DeleteOptions {
    #[command(flatten)]
    pub revision: RevisionOptions,

    #[command(flatten)]
    pub confirm: ConfirmOptions,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ConfirmOptions {
    /// Do not ask for confirmation.
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct BuildsOptions {
    /// Keep polling until interrupted.
    #[arg(short, long)]
    pub watch: bool,

    /// Seconds between polls while no build is running.
    #[arg(short, long, value_name = "seconds", default_value_t = IDLE_INTERVAL.as_secs())]
    pub interval: u64,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ConfigFileOptions {
    /// File holding new YAML content.
    #[arg(value_name = "file")]
    pub file: PathBuf,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct UploadOptions {
    /// Image file to upload.
    #[arg(value_name = "file")]
    pub file: PathBuf,

    /// Alternative text for Markdown snippet.
    #[arg(short, long, value_name = "text", default_value = "")]
    pub alt: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct AssetFileOptions {
    /// File to upload.
    #[arg(value_name = "file")]
    pub file: PathBuf,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct CustomOptions {
    /// Which custom code file: css or js.
    #[arg(value_name = "css|js")]
    pub kind: CustomCode,

    /// File holding new content, prints current content if absent.
    #[arg(short = 'f', long, value_name = "file")]
    pub file: Option<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct FontUploadOptions {
    /// Font files to upload.
    #[arg(value_name = "file", required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct FontNameOptions {
    /// File name or family of uploaded font.
    #[arg(value_name = "font")]
    pub name: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct FontRemoveOptions {
    #[command(flatten)]
    pub font: FontNameOptions,

    #[command(flatten)]
    pub confirm: ConfirmOptions,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct CheckUpdateOptions {
    /// Ignore cached result.
    #[arg(short, long)]
    pub force: bool,
}

#[tokio::main]
async fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run() -> Result<()> {
    Cli::parse().run().await
}

async fn run_login(opts: LoginOptions) -> Result<()> {
    let (owner, repo) = opts
        .repository
        .split_once('/')
        .filter(|(owner, repo)| !owner.is_empty() && !repo.is_empty())
        .ok_or_else(|| anyhow!("repository must look like <owner>/<repo>"))?;

    let mut site = SiteDefinition::new(RepoCoordinates::new(owner, repo, opts.branch));
    site.api_base = opts.api_base;
    let token = match opts.token {
        Some(token) => token,
        None => Password::new("personal access token")
            .without_confirmation()
            .prompt()?,
    };

    let vault = Vault::open(default_state_dir()?)?;
    let session = Session::login(vault, site, Credential::new(token)).await?;
    info!(
        "logged in as {} to {}",
        session.user().login,
        session.site().repository
    );

    Ok(())
}

async fn run_logout() -> Result<()> {
    let vault = Vault::open(default_state_dir()?)?;
    match Session::restore(vault.clone()).await {
        Ok(Some(session)) => session.logout()?,
        Ok(None) => info!("not logged in"),
        Err(error) => {
            warn!("cannot reach store, wiping local credential anyway: {error}");
            vault.wipe()?;
        }
    }

    Ok(())
}

async fn run_whoami() -> Result<()> {
    let session = open_session().await?;
    let user = session.user();
    let repo = session.store().repository().await?;

    println!("{} ({})", user.login, user.name.as_deref().unwrap_or("no name"));
    println!("{}", user.html_url);
    println!("{} on {}", repo.html_url, session.site().repository.branch);
    if let Some(description) = repo.description {
        println!("{description}");
    }

    Ok(())
}

async fn run_list(opts: ListOptions) -> Result<()> {
    let session = open_session().await?;
    let spinner = spinner("listing posts")?;
    let entries = session.posts().list(opts.status).await;
    spinner.finish_and_clear();

    for entry in entries? {
        let state = if entry.is_draft { "draft" } else { "post " };
        println!(
            "{}  {state}  {:<40}  {}",
            entry.date.format("%Y-%m-%d"),
            entry.title,
            entry.path
        );
    }

    Ok(())
}

async fn run_show(opts: PathOptions) -> Result<()> {
    let session = open_session().await?;
    let post = session.posts().get(&opts.path).await?;
    print!("{}", post.raw);
    info!("revision {}", post.sha);

    Ok(())
}

async fn run_new(opts: NewOptions) -> Result<()> {
    let session = open_session().await?;
    let body = match &opts.body_file {
        Some(path) => read_body(path)?,
        None => String::new(),
    };

    let input = PostInput {
        title: opts.title,
        body,
        tags: opts.tags,
        categories: opts.categories,
        draft: opts.draft,
        description: opts.description,
        cover: opts.cover,
        slug: opts.slug,
    };
    let post = session.posts().create(input).await?;
    report(&post);

    Ok(())
}

async fn run_edit(opts: EditOptions) -> Result<()> {
    let session = open_session().await?;
    let posts = session.posts();
    let sha = match opts.sha {
        Some(sha) => sha,
        None => posts.get(&opts.path).await?.sha,
    };

    let changes = PostUpdate {
        title: opts.title,
        body: opts.body_file.as_deref().map(read_body).transpose()?,
        tags: opts.tags,
        categories: opts.categories,
        draft: None,
        description: opts.description,
        cover: opts.cover,
        slug: opts.slug,
    };
    let post = posts.update(&opts.path, changes, &sha).await?;
    report(&post);

    Ok(())
}

async fn run_publish(opts: RevisionOptions, publish: bool) -> Result<()> {
    let session = open_session().await?;
    let posts = session.posts();
    let sha = match opts.sha {
        Some(sha) => sha,
        None => posts.get(&opts.path).await?.sha,
    };

    let post = if publish {
        posts.publish(&opts.path, &sha).await?
    } else {
        posts.unpublish(&opts.path, &sha).await?
    };
    if post.path != opts.path {
        info!("post moved from {} to {}", opts.path, post.path);
    }
    report(&post);

    Ok(())
}

async fn run_delete(opts: DeleteOptions) -> Result<()> {
    let session = open_session().await?;
    let posts = session.posts();
    let post = posts.get(&opts.revision.path).await?;
    let sha = opts.revision.sha.unwrap_or_else(|| post.sha.clone());

    if !opts.confirm.yes
        && !Confirm::new(&format!("delete \"{}\" for good?", post.title()))
            .with_default(false)
            .prompt()?
    {
        info!("nothing deleted");
        return Ok(());
    }

    posts.delete(&post.path, &sha).await?;

    Ok(())
}

async fn run_builds(opts: BuildsOptions) -> Result<()> {
    let session = open_session().await?;
    let monitor = session.builds();
    let mut tracker = session.success_tracker()?;

    if !opts.watch {
        let page = monitor.recent_runs(RECENT_RUNS, 1).await;
        observe(&mut tracker, &page.runs);
        print_runs(&page.runs);
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let spinner = spinner("watching builds, press ctrl-c to stop")?;
    monitor
        .watch(Duration::from_secs(opts.interval), cancel, |runs| {
            spinner.suspend(|| {
                observe(&mut tracker, runs);
                print_runs(runs);
            })
        })
        .await;
    spinner.finish_and_clear();

    Ok(())
}

async fn run_config(command: ConfigCommand) -> Result<()> {
    let session = open_session().await?;
    let editor = session.config_editor()?;

    match command {
        ConfigCommand::Show => {
            let files = editor.load().await?;
            println!("# {}", session.site().layout.site_config);
            print!("{}", files.site.content);
            match (&files.theme_name, &files.theme) {
                (_, Some(theme)) => {
                    println!("\n# {}", theme.path);
                    print!("{}", theme.file.content);
                }
                (Some(name), None) => warn!("no configuration found for theme {name:?}"),
                (None, None) => info!("site configuration names no theme"),
            }
            if let Some(snapshot) = editor.shelf().last_good()? {
                info!("last good configuration from {}", snapshot.saved_at);
            }
        }
        ConfigCommand::SaveSite(opts) => {
            let yaml = read_body(&opts.file)?;
            let files = editor.load().await?;
            editor.save_site(&files, &yaml).await?;
        }
        ConfigCommand::SaveTheme(opts) => {
            let yaml = read_body(&opts.file)?;
            let files = editor.load().await?;
            editor.save_theme(&files, &yaml).await?;
        }
        ConfigCommand::Restore(opts) => {
            let snapshot = editor
                .shelf()
                .last_good()?
                .ok_or_else(|| anyhow!("no configuration of a successful build recorded yet"))?;
            if !opts.yes && !confirm_restore(&snapshot)? {
                info!("nothing restored");
                return Ok(());
            }
            editor.restore(&snapshot).await?;
        }
    }

    Ok(())
}

async fn run_upload(opts: UploadOptions) -> Result<()> {
    let session = open_session().await?;
    let (bytes, filename) = read_upload(&opts.file)?;

    let image = session.images().upload(&bytes, &filename).await?;
    println!("{}", image.url);
    println!("{}", image.markdown(&opts.alt));

    Ok(())
}

async fn run_favicon(opts: AssetFileOptions) -> Result<()> {
    let session = open_session().await?;
    let (bytes, filename) = read_upload(&opts.file)?;

    let favicon = session.assets()?.upload_favicon(&bytes, &filename).await?;
    info!("favicon served at {}", favicon.url);
    match favicon.synced_config {
        Some(path) => info!("{path} now points at it"),
        None => warn!("theme configuration not changed, point it at {} by hand", favicon.url),
    }

    Ok(())
}

async fn run_custom(opts: CustomOptions) -> Result<()> {
    let session = open_session().await?;
    let assets = session.assets()?;
    let current = assets.load_custom(opts.kind).await?;

    match opts.file {
        Some(path) => {
            let content = read_body(&path)?;
            assets
                .save_custom(opts.kind, &content, current.sha.as_deref())
                .await?;
        }
        None if current.sha.is_none() => info!("{} does not exist yet", current.path),
        None => print!("{}", current.content),
    }

    Ok(())
}

async fn run_font(command: FontCommand) -> Result<()> {
    let session = open_session().await?;
    let assets = session.assets()?;

    match command {
        FontCommand::Upload(opts) => {
            for path in &opts.files {
                let (bytes, filename) = read_upload(path)?;
                let font = assets.upload_font(&bytes, &filename).await?;
                info!("uploaded {} as family {:?}", font.path, font.family());
            }
        }
        FontCommand::List => {
            let fonts = assets.list_fonts().await?;
            if fonts.is_empty() {
                println!("no fonts uploaded");
            }
            for font in fonts {
                println!("{:<24}  {}", font.family(), font.path);
            }
        }
        FontCommand::Apply(opts) => {
            let font = find_font(assets.list_fonts().await?, &opts.name)?;
            assets.apply_font(&font).await?;
            info!("make sure the theme loads /custom.css");
        }
        FontCommand::Remove(opts) => {
            let font = find_font(assets.list_fonts().await?, &opts.font.name)?;
            if !opts.confirm.yes
                && !Confirm::new(&format!("remove font {}?", font.filename))
                    .with_default(false)
                    .prompt()?
            {
                info!("nothing removed");
                return Ok(());
            }
            assets.remove_font(&font).await?;
        }
    }

    Ok(())
}

async fn run_check_update(opts: CheckUpdateOptions) -> Result<()> {
    let checker = VersionChecker::new(default_state_dir()?)?;
    if opts.force {
        checker.invalidate();
    }

    let result = checker.check().await;
    if result.has_update {
        info!(
            "hexcms {} is available, you have {}",
            result.latest_version, result.current_version
        );
        if !result.release_url.is_empty() {
            info!("{}", result.release_url);
        }
    } else {
        info!("hexcms {} is up to date", result.current_version);
    }

    Ok(())
}

async fn open_session() -> Result<Session> {
    let vault = Vault::open(default_state_dir()?)?;
    Session::restore(vault)
        .await?
        .ok_or_else(|| anyhow!("not logged in, run `hexcms login <owner>/<repo>` first"))
}

fn spinner(message: &str) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));

    Ok(spinner)
}

fn read_upload(path: &std::path::Path) -> Result<(Vec<u8>, String)> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok((bytes, filename))
}

fn find_font(fonts: Vec<WebFont>, name: &str) -> Result<WebFont> {
    fonts
        .into_iter()
        .find(|font| font.filename == name || font.family() == name)
        .ok_or_else(|| anyhow!("no uploaded font named {name:?}, see `hexcms font list`"))
}

fn read_body(path: &std::path::Path) -> Result<String> {
    read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn report(post: &Post) {
    let state = if post.is_draft { "draft" } else { "published" };
    info!("{state} \"{}\" at {}", post.title(), post.path);
    info!("revision {}", post.sha);
}

fn observe(tracker: &mut SuccessTracker, runs: &[WorkflowRun]) {
    if let Err(error) = tracker.observe(runs) {
        warn!("cannot record successful build: {error}");
    }

    match tracker.needs_restore_prompt(runs.first()) {
        Ok(true) => warn!("latest build failed, `hexcms config restore` brings back the last good configuration"),
        Ok(false) => {}
        Err(error) => warn!("cannot read last good configuration: {error}"),
    }
}

fn print_runs(runs: &[WorkflowRun]) {
    if runs.is_empty() {
        println!("no builds found");
        return;
    }

    for run in runs {
        let outcome = match (run.status, run.conclusion) {
            (RunStatus::Queued, _) => "queued",
            (RunStatus::InProgress, _) => "in progress",
            (RunStatus::Pending, _) => "pending",
            (RunStatus::Completed, Some(RunConclusion::Success)) => "success",
            (RunStatus::Completed, Some(RunConclusion::Failure)) => "failure",
            (RunStatus::Completed, Some(RunConclusion::Cancelled)) => "cancelled",
            (RunStatus::Completed, Some(RunConclusion::Skipped)) => "skipped",
            (RunStatus::Completed, Some(RunConclusion::TimedOut)) => "timed out",
            (RunStatus::Completed, Some(RunConclusion::ActionRequired)) => "action required",
            (RunStatus::Completed, Some(RunConclusion::Other) | None) => "completed",
        };
        println!(
            "{}  {:<14}  {}  {}",
            run.created_at.format("%Y-%m-%d %H:%M"),
            outcome,
            run.head_commit_message.as_deref().unwrap_or("-"),
            run.html_url
        );
    }
}

fn confirm_restore(snapshot: &ConfigSnapshot) -> Result<bool> {
    let mut files = Vec::new();
    if snapshot.has_site() {
        files.push("site configuration");
    }
    if snapshot.has_theme() {
        files.push(snapshot.theme_file.as_str());
    }

    Ok(Confirm::new(&format!(
        "restore {} from {}?",
        files.join(" and "),
        snapshot.saved_at.format("%Y-%m-%d %H:%M")
    ))
    .with_default(false)
    .prompt()?)
}
