//! Sonedb CLI - inspect a content database populated from a seed file

use anyhow::Context;
use clap::{Parser, Subcommand};
use sonedb::config::{self, SonedbConfig};
use sonedb::seed::Seed;
use sonedb::ui::{self, Icons};
use sonedb::{ContentDatabase, KnownIds, PostId, SoneId};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "sonedb")]
#[command(version)]
#[command(about = "Content database for Sone identities, posts and replies")]
#[command(long_about = r#"
Sonedb loads a seed file into an in-memory content database and lets you
inspect it:
  • Database statistics
  • Post threads with ordered replies
  • Post feeds of a Sone and the Sones it follows
  • Index consistency audits

Example usage:
  sonedb init
  sonedb --seed content.json stats
  sonedb --seed content.json thread --post 3a1f...
  sonedb --seed content.json feed --sone nwa8lHa2... --follow 9Xk2...
  sonedb --seed content.json checkpoint --mark nwa8lHa2... --out known.json
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file (defaults to ./sonedb.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Seed file to load (overrides the config)
    #[arg(short, long, global = true)]
    seed: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Show statistics about the loaded content
    Stats,

    /// Show a post with its replies
    Thread {
        /// Post id
        #[arg(short, long)]
        post: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show the post feed of a Sone
    Feed {
        /// Sone id
        #[arg(long)]
        sone: String,

        /// Followed Sone ids
        #[arg(long)]
        follow: Vec<String>,

        /// Maximum number of posts
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show what a Sone owns and what it likes
    Sone {
        /// Sone id
        #[arg(long)]
        id: String,
    },

    /// Verify that all indices agree with the stored records
    Audit,

    /// Write the known-ids checkpoint as JSON
    Checkpoint {
        /// Mark all replies to posts of this Sone as known first
        #[arg(long)]
        mark: Vec<String>,

        /// Output file (defaults to `known` from the config)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    if let Commands::Init { force } = cli.command {
        let path = cli.config.unwrap_or_else(config::default_config_path);
        config::write_config(&path, &SonedbConfig::default(), force)?;
        ui::success(&format!("Wrote {}", path.display()));
        return Ok(());
    }

    let config = config::load_config(cli.config.as_deref())?.unwrap_or_default();
    let db = open_database(cli.seed.as_deref(), &config)?;

    match cli.command {
        Commands::Init { .. } => {}

        Commands::Stats => {
            let stats = db.stats();
            ui::header(&format!("{} Sonedb Statistics", Icons::STATS));
            println!("{}", ui::stats_table(&stats.rows()));
        }

        Commands::Thread { post, format } => {
            let post_id = PostId::parse(&post)?;
            let Some(thread) = db.thread(&post_id) else {
                anyhow::bail!("post not found: {}", post_id);
            };

            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&thread)?);
            } else {
                let posts = db.posts();
                let replies = db.replies();
                ui::post_line(&thread.post, posts.likers(&post_id).len(), posts.is_known(&post_id));
                if thread.replies.is_empty() {
                    println!("   {}", ui::muted("no replies"));
                }
                for reply in &thread.replies {
                    ui::reply_line(reply, replies.likers(&reply.id).len(), replies.is_known(&reply.id));
                }
            }
        }

        Commands::Feed { sone, follow, limit, format } => {
            let sone = SoneId::parse(&sone)?;
            let followed = follow
                .iter()
                .map(|id| SoneId::parse(id))
                .collect::<sonedb::Result<Vec<_>>>()?;
            let limit = limit.unwrap_or_else(|| config.feed_limit());

            let mut feed = db.post_feed(&sone, &followed);
            feed.truncate(limit);

            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&feed)?);
            } else if feed.is_empty() {
                println!("{} No posts visible to {}.", Icons::MAG, sone);
            } else {
                ui::header(&format!("Feed of {} ({} posts)", display_name(&db, &sone), feed.len()));
                for post in &feed {
                    ui::post_line(post, db.posts().likers(&post.id).len(), db.posts().is_known(&post.id));
                }
            }
        }

        Commands::Sone { id } => {
            let sone = SoneId::parse(&id)?;
            ui::header(&format!("{} {}", Icons::PERSON, display_name(&db, &sone)));
            if let Some(identity) = db.identity(&sone) {
                if !identity.request_uri.is_empty() {
                    ui::info("Request URI", &identity.request_uri);
                }
                let contexts: Vec<&str> = identity.contexts.iter().map(String::as_str).collect();
                ui::info("Contexts", &contexts.join(", "));
            } else {
                ui::warn("No identity stored for this Sone");
            }

            ui::section("Content");
            ui::summary_row("Posts:", &db.posts().posts_by_owner(&sone).len().to_string());
            ui::summary_row("Directed to:", &db.posts().posts_by_recipient(&sone).len().to_string());
            ui::summary_row("Replies:", &db.replies().replies_by_owner(&sone).len().to_string());
            ui::summary_row("Replies to its posts:", &db.replies_to_posts_of(&sone).len().to_string());
            ui::summary_row("Unknown replies:", &db.unknown_replies_to_posts_of(&sone).len().to_string());

            ui::section("Likes given");
            ui::summary_row("Posts:", &db.posts().liked_by(&sone).len().to_string());
            ui::summary_row("Replies:", &db.replies().liked_by(&sone).len().to_string());
        }

        Commands::Audit => {
            let report = db.audit();
            print!("{}", report);
            if !report.is_clean() {
                ui::error("Audit found inconsistencies");
                std::process::exit(1);
            }
            ui::success("All indices are consistent");
        }

        Commands::Checkpoint { mark, out } => {
            for id in &mark {
                let sone = SoneId::parse(id)?;
                let marked = db.mark_replies_known_for(&sone)?;
                ui::summary_row(&format!("Marked for {}:", display_name(&db, &sone)), &marked.to_string());
            }

            let path = out
                .or_else(|| config.known.as_ref().map(PathBuf::from))
                .context("no output file given (use --out or set `known` in sonedb.toml)")?;
            let known = db.known_ids();
            known
                .save(&path)
                .with_context(|| format!("failed to write {}", path.display()))?;
            ui::success(&format!(
                "Wrote {} known posts and {} known replies to {}",
                known.posts.len(),
                known.replies.len(),
                path.display()
            ));
        }
    }

    Ok(())
}

/// Build a database from the seed file and the known-ids checkpoint
fn open_database(seed: Option<&Path>, config: &SonedbConfig) -> anyhow::Result<ContentDatabase> {
    let seed_path = seed
        .map(Path::to_path_buf)
        .or_else(|| config.seed.as_ref().map(PathBuf::from))
        .context("no seed file given (use --seed or set `seed` in sonedb.toml)")?;

    let db = ContentDatabase::new();
    tracing::info!("Loading seed {}", seed_path.display());
    let seed = Seed::load(&seed_path).with_context(|| format!("failed to load {}", seed_path.display()))?;
    let summary = seed.apply(&db)?;
    tracing::debug!(?summary, "Seed applied");

    if let Some(known_path) = &config.known {
        let known = KnownIds::load(Path::new(known_path))
            .with_context(|| format!("failed to read known ids from {}", known_path))?;
        let restored = db.restore_known(&known);
        tracing::info!(restored, "Restored known ids from {}", known_path);
    }

    Ok(db)
}

fn display_name(db: &ContentDatabase, sone: &SoneId) -> String {
    db.identity(sone)
        .filter(|identity| !identity.nickname.is_empty())
        .map(|identity| format!("{} ({})", identity.nickname, sone))
        .unwrap_or_else(|| sone.to_string())
}
