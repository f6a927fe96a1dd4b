use anyhow::Result;
use clap::{Parser, Subcommand};
use reqwest::blocking::Client;
use reqwest::Url;
use rustyline::DefaultEditor;
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;
use tunegraph_core::{Recommendation, Recommender, Snapshot};
use tunegraph_server::{track_id_from_url, ServerConfig, TRACK_URL_PREFIX};

#[derive(Parser)]
#[command(name = "tunegraph", version, about = "Track similarity recommendations", long_about = None)]
struct Cli {
    /// Snapshot directory (graph.bin + catalog.bin)
    #[arg(short, long, env = "TUNEGRAPH_DATA", default_value = "data")]
    data_dir: PathBuf,

    /// Start HTTP server instead of running a command
    #[arg(long)]
    serve: bool,

    /// Query a running server instead of the local snapshot
    #[arg(long, env = "TUNEGRAPH_URL")]
    server_url: Option<String>,

    /// Address to bind when serving
    #[arg(long, env = "TUNEGRAPH_LISTEN", default_value = "0.0.0.0:8000")]
    listen: SocketAddr,

    /// Recommendations returned when no count is given
    #[arg(long, env = "TUNEGRAPH_DEFAULT_COUNT", default_value_t = 10)]
    default_count: usize,

    /// Upper bound on the count a client may request
    #[arg(long, env = "TUNEGRAPH_MAX_COUNT", default_value_t = 100)]
    max_count: usize,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a snapshot from JSON catalog and edge files
    Import {
        /// {"<track id>": [index, "name"], ...}
        #[arg(long)]
        catalog: PathBuf,
        /// [[u, v, weight], ...]
        #[arg(long)]
        edges: PathBuf,
    },
    /// Print the top recommendations for a track id or track URL
    Recommend {
        track: String,
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },
    /// Print snapshot size
    Stats,
    /// Start interactive shell
    Repl,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.serve {
        let config = ServerConfig {
            data_dir: cli.data_dir,
            listen: cli.listen,
            default_count: cli.default_count,
            max_count: cli.max_count,
        };
        let rt = Runtime::new()?;
        return rt.block_on(tunegraph_server::serve_with(config));
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    // network mode
    if let Some(base_url) = cli.server_url.as_deref() {
        let client = Client::builder().user_agent("tunegraph-cli").build()?;
        return match cli.command {
            Some(Commands::Recommend { track, count }) => {
                let recs = net_recommend(&client, base_url, &track_id(&track)?, count)?;
                print_recommendations(&recs);
                Ok(())
            }
            _ => {
                println!("In network mode (--server-url) only `recommend` is available.");
                Ok(())
            }
        };
    }

    match cli.command {
        Some(Commands::Import { catalog, edges }) => {
            let catalog = std::fs::read_to_string(&catalog)?;
            let edges = std::fs::read_to_string(&edges)?;
            let rec = Snapshot::import_json(&catalog, &edges)?;
            Snapshot::save(&cli.data_dir, &rec)?;
            println!(
                "wrote {} tracks, {} edges to {}",
                rec.catalog().len(),
                rec.graph().edge_count(),
                cli.data_dir.display()
            );
        }
        Some(Commands::Recommend { track, count }) => {
            let rec = Snapshot::load(&cli.data_dir)?;
            let count = count.unwrap_or(cli.default_count);
            let recs = rec.get_recommendations(&track_id(&track)?, count)?;
            print_recommendations(&recs);
        }
        Some(Commands::Stats) => {
            let rec = Snapshot::load(&cli.data_dir)?;
            println!("tracks {}", rec.catalog().len());
            println!("edges  {}", rec.graph().edge_count());
        }
        Some(Commands::Repl) => {
            let rec = Snapshot::load(&cli.data_dir)?;
            run_repl(&rec, cli.default_count)?;
        }
        None => {
            println!("No command given. Use --help for usage.");
        }
    }

    Ok(())
}

/// Accepts either a bare track id or a full track URL.
fn track_id(arg: &str) -> Result<String> {
    if arg.starts_with(TRACK_URL_PREFIX) {
        return track_id_from_url(arg)
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("invalid url: {arg}"));
    }
    Ok(arg.to_string())
}

fn print_recommendations(recs: &[Recommendation]) {
    if recs.is_empty() {
        println!("(no recommendations)");
    }
    for (rank, r) in recs.iter().enumerate() {
        println!(
            "{:>3}. {}\t{}\t{}",
            rank + 1,
            r.display_name,
            r.external_id,
            r.weight
        );
    }
}

fn net_recommend(
    client: &Client,
    base: &str,
    track: &str,
    count: Option<usize>,
) -> Result<Vec<Recommendation>> {
    #[derive(serde::Deserialize)]
    struct Item {
        name: String,
        track_id: String,
        index: u32,
        score: f64,
    }
    #[derive(serde::Deserialize)]
    struct Resp {
        ok: bool,
        data: Vec<Item>,
    }
    let mut req = client.get(recommendations_url(base, track)?);
    if let Some(n) = count {
        req = req.query(&[("count", n)]);
    }
    let resp = req.send()?;
    if resp.status() == reqwest::StatusCode::NOT_FOUND {
        anyhow::bail!("track not in database: {track}");
    }
    let parsed: Resp = resp.error_for_status()?.json()?;
    if !parsed.ok {
        anyhow::bail!("server returned ok=false");
    }
    Ok(parsed
        .data
        .into_iter()
        .map(|i| Recommendation {
            display_name: i.name,
            external_id: i.track_id,
            index: i.index,
            weight: i.score,
        })
        .collect())
}

/// `<base>/v1/recommendations/<track>`, with the track id percent-encoded as
/// a single path segment.
fn recommendations_url(base: &str, track: &str) -> Result<Url> {
    let mut url = Url::parse(base)?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("server url cannot take a path: {base}"))?
        .pop_if_empty()
        .extend(["v1", "recommendations", track]);
    Ok(url)
}

fn run_repl(rec: &Recommender, default_count: usize) -> Result<()> {
    let mut rl = DefaultEditor::new().ok();
    println!("tunegraph shell. Commands: <track id|url> [n], quit.");
    loop {
        let prompt = "tunegraph> ";
        let line = if let Some(ref mut editor) = rl {
            match editor.readline(prompt) {
                Ok(l) => {
                    let _ = editor.add_history_entry(l.as_str());
                    l
                }
                Err(_) => break,
            }
        } else {
            print!("{prompt}");
            io::stdout().flush()?;
            let mut buf = String::new();
            if io::stdin().read_line(&mut buf)? == 0 {
                break;
            }
            buf
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            break;
        }
        let mut parts = line.split_whitespace();
        let track = parts.next().unwrap_or("");
        let n: usize = parts
            .next()
            .and_then(|s| s.parse().ok())
            .unwrap_or(default_count);
        let start = Instant::now();
        let out = track_id(track)
            .and_then(|id| rec.get_recommendations(&id, n).map_err(anyhow::Error::from));
        match out {
            Ok(recs) => {
                print_recommendations(&recs);
                println!("({:.2?})", start.elapsed());
            }
            Err(e) => eprintln!("error: {e}"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_arg_accepts_id_or_url() {
        assert_eq!(track_id("trackA").unwrap(), "trackA");
        assert_eq!(
            track_id("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC").unwrap(),
            "4uLU6hMCjMI75M1A2tKUQC"
        );
        assert!(track_id("https://open.spotify.com/track/short").is_err());
    }

    #[test]
    fn recommendations_url_encodes_track_segment() {
        let url = recommendations_url("http://localhost:8000", "a b/c?d").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/v1/recommendations/a%20b%2Fc%3Fd"
        );
        let url = recommendations_url("http://host:1/api/", "trackA").unwrap();
        assert_eq!(url.as_str(), "http://host:1/api/v1/recommendations/trackA");
        assert!(recommendations_url("mailto:someone@example.com", "x").is_err());
    }

    #[test]
    fn cli_parses_recommend() {
        let cli = Cli::try_parse_from([
            "tunegraph",
            "--data-dir",
            "snap",
            "recommend",
            "trackA",
            "-n",
            "3",
        ])
        .unwrap();
        assert_eq!(cli.data_dir, PathBuf::from("snap"));
        match cli.command {
            Some(Commands::Recommend { track, count }) => {
                assert_eq!(track, "trackA");
                assert_eq!(count, Some(3));
            }
            _ => panic!("expected recommend"),
        }
    }
}
