//! branchtale-cli: operator frontend for the Branchtale HTTP API
//!
//! # Subcommands
//! - `trending [-n <limit>] [--offset <n>] [--range 24h|7d|30d|all] [--json]`
//! - `recommend [--user <uuid>] [-n <limit>] [--exclude <uuid>] [--json]`
//! - `node <story> [--path A,B]`
//! - `advance <story> <A|B> [--user <uuid>] [--session <key>]`
//! - `earnings <creator> [--json]`
//! - `status`

use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8766";
const DEFAULT_LIMIT: u32 = 10;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "branchtale-cli", version, about = "Branchtale story platform CLI")]
struct Cli {
    /// Branchtale HTTP server URL (overrides BRANCHTALE_HTTP_URL env var)
    #[arg(long, env = "BRANCHTALE_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List trending stories
    Trending {
        #[arg(short = 'n', long, default_value_t = DEFAULT_LIMIT)]
        limit: u32,

        #[arg(long, default_value_t = 0)]
        offset: u32,

        /// 24h, 7d, 30d or all
        #[arg(long)]
        range: Option<String>,

        /// Print the raw JSON page
        #[arg(long)]
        json: bool,
    },

    /// Recommend stories for a user (anonymous when --user is omitted)
    Recommend {
        #[arg(long)]
        user: Option<String>,

        #[arg(short = 'n', long, default_value_t = DEFAULT_LIMIT)]
        limit: u32,

        /// Story to leave out, usually the one being watched
        #[arg(long)]
        exclude: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Resolve the node a choice path points to
    Node {
        story: String,

        /// Comma-separated choices, e.g. A,B,A
        #[arg(long)]
        path: Option<String>,
    },

    /// Make one choice in a story
    Advance {
        story: String,

        choice: String,

        #[arg(long)]
        user: Option<String>,

        #[arg(long)]
        session: Option<String>,
    },

    /// Show a creator's estimated earnings
    Earnings {
        creator: String,

        #[arg(long)]
        json: bool,
    },

    /// Show Branchtale server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StorySummary {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub views_count: i64,
    #[serde(default)]
    pub likes_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct TrendingScore {
    pub score: f64,
    pub age_hours: f64,
}

#[derive(Debug, Deserialize)]
pub struct TrendingEntry {
    pub story: StorySummary,
    pub trending: TrendingScore,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    pub offset: u32,
    pub count: usize,
    pub has_more: bool,
}

#[derive(Debug, Deserialize)]
pub struct TrendingPage {
    pub stories: Vec<TrendingEntry>,
    pub pagination: Pagination,
    pub time_range: String,
}

#[derive(Debug, Deserialize)]
pub struct RecommendationEntry {
    pub story: StorySummary,
    pub reason: String,
    pub score: f64,
}

#[derive(Debug, Deserialize)]
pub struct RecommendationList {
    pub recommendations: Vec<RecommendationEntry>,
}

#[derive(Debug, Deserialize)]
pub struct Breakdown {
    pub views_earnings: f64,
    pub likes_earnings: f64,
    pub shares_earnings: f64,
    pub comments_earnings: f64,
    pub total: f64,
}

#[derive(Debug, Deserialize)]
pub struct StoryEarnings {
    pub title: String,
    pub earnings: Breakdown,
}

#[derive(Debug, Deserialize)]
pub struct CreatorEarnings {
    pub story_count: usize,
    pub stories: Vec<StoryEarnings>,
    pub portfolio: Breakdown,
}

// ============================================================================
// Request building
// ============================================================================

/// `server` with `segments` appended, each percent-encoded as one path segment.
pub fn endpoint(server: &str, segments: &[&str]) -> anyhow::Result<reqwest::Url> {
    let mut url = reqwest::Url::parse(server)?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("server URL cannot take a path: {}", server))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Query pairs with unset parameters dropped. Encoding is left to reqwest.
pub fn query_pairs<'a>(params: &[(&'a str, Option<String>)]) -> Vec<(&'a str, String)> {
    params
        .iter()
        .filter_map(|(k, v)| v.clone().map(|v| (*k, v)))
        .collect()
}

// ============================================================================
// Formatting
// ============================================================================

pub fn format_money(amount: f64) -> String {
    format!("${:.2}", amount)
}

/// One line per trending story: rank, score, age, title.
pub fn format_trending(page: &TrendingPage) -> Vec<String> {
    page.stories
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            format!(
                "{:>3}. {:>10.4}  {:>6.1}h  {}",
                page.pagination.offset as usize + i + 1,
                entry.trending.score,
                entry.trending.age_hours,
                entry.story.title
            )
        })
        .collect()
}

pub fn format_breakdown(b: &Breakdown) -> String {
    format!(
        "views {}  likes {}  shares {}  comments {}  = {}",
        format_money(b.views_earnings),
        format_money(b.likes_earnings),
        format_money(b.shares_earnings),
        format_money(b.comments_earnings),
        format_money(b.total)
    )
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client(timeout_secs: u64) -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()?)
}

/// Send and decode a JSON body; non-2xx responses become errors carrying the server's message.
fn fetch_json(request: reqwest::blocking::RequestBuilder) -> anyhow::Result<serde_json::Value> {
    let resp = request.send()?;
    let status = resp.status();
    let body: serde_json::Value = resp.json().unwrap_or_default();
    if !status.is_success() {
        let msg = body["error"].as_str().unwrap_or("no error message");
        anyhow::bail!("server returned {}: {}", status, msg);
    }
    Ok(body)
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn do_trending(server: &str, limit: u32, offset: u32, range: Option<String>, json: bool) -> anyhow::Result<()> {
    let query = query_pairs(&[
        ("limit", Some(limit.to_string())),
        ("offset", Some(offset.to_string())),
        ("time_range", range),
    ]);
    let body = fetch_json(client(30)?.get(endpoint(server, &["trending"])?).query(&query))?;
    if json {
        return print_json(&body);
    }

    let page: TrendingPage = serde_json::from_value(body)?;
    if page.stories.is_empty() {
        eprintln!("No trending stories for range {}", page.time_range);
        return Ok(());
    }
    for line in format_trending(&page) {
        println!("{}", line);
    }
    if page.pagination.has_more {
        println!("... more after offset {}", page.pagination.offset as usize + page.pagination.count);
    }
    Ok(())
}

fn do_recommend(
    server: &str,
    user: Option<String>,
    limit: u32,
    exclude: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let query = query_pairs(&[
        ("user_id", user),
        ("limit", Some(limit.to_string())),
        ("exclude_story_id", exclude),
    ]);
    let body = fetch_json(client(30)?.get(endpoint(server, &["recommendations"])?).query(&query))?;
    if json {
        return print_json(&body);
    }

    let list: RecommendationList = serde_json::from_value(body)?;
    for rec in &list.recommendations {
        println!("{:<26} {:>8.3}  {}  ({})", rec.reason, rec.score, rec.story.title, rec.story.id);
    }
    Ok(())
}

fn do_node(server: &str, story: &str, path: Option<String>) -> anyhow::Result<()> {
    let url = endpoint(server, &["stories", story, "node"])?;
    let body = fetch_json(client(10)?.get(url).query(&query_pairs(&[("path", path)])))?;
    print_json(&body)
}

fn do_advance(
    server: &str,
    story: &str,
    choice: &str,
    user: Option<String>,
    session: Option<String>,
) -> anyhow::Result<()> {
    let url = endpoint(server, &["stories", story, "advance"])?;
    let payload = serde_json::json!({
        "choice": choice,
        "user_id": user,
        "session": session,
    });
    let body = fetch_json(client(10)?.post(url).json(&payload))?;
    println!("Path:     {}", body["encoded_path"].as_str().unwrap_or(""));
    println!("Depth:    {}", body["depth"]);
    println!("Saved to: {}", body["source"].as_str().unwrap_or("?"));
    if body["terminal"] == true {
        println!("End of story reached");
    }
    Ok(())
}

fn do_earnings(server: &str, creator: &str, json: bool) -> anyhow::Result<()> {
    let url = endpoint(server, &["creators", creator, "earnings"])?;
    let body = fetch_json(client(30)?.get(url))?;
    if json {
        return print_json(&body);
    }

    let report: CreatorEarnings = serde_json::from_value(body)?;
    for story in &report.stories {
        println!("{:<40} {}", story.title, format_money(story.earnings.total));
    }
    println!("{} stories: {}", report.story_count, format_breakdown(&report.portfolio));
    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let url = endpoint(server, &["health"])?;
    match client(10)?.get(url.clone()).send() {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("Branchtale server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:           {}", body["version"].as_str().unwrap_or("?"));
            println!("Backend:           {}", body["backend"].as_str().unwrap_or("?"));
            println!("Socket:            {}", body["socket"].as_str().unwrap_or("?"));
        }
        Ok(r) => {
            eprintln!("branchtale-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("branchtale-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Trending { limit, offset, range, json } => do_trending(&server, limit, offset, range, json),
        Commands::Recommend { user, limit, exclude, json } => do_recommend(&server, user, limit, exclude, json),
        Commands::Node { story, path } => do_node(&server, &story, path),
        Commands::Advance { story, choice, user, session } => {
            do_advance(&server, &story, &choice, user, session)
        }
        Commands::Earnings { creator, json } => do_earnings(&server, &creator, json),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("branchtale-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
