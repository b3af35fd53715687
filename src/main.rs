//! cassette-guard CLI

use std::path::Path;
use std::process;

use anyhow::Context;
use cassette_guard::api::API_KEY_HEADER;
use cassette_guard::client::HttpClient;
use cassette_guard::matching::MatchKey;
use cassette_guard::{RequestSnapshot, SessionConfig, Settings};
use tracing_subscriber::EnvFilter;

/// Settings file read when `CASSETTE_GUARD_SETTINGS` is unset
const DEFAULT_SETTINGS_FILE: &str = "cassette-guard.toml";

fn print_usage() {
    eprintln!("cassette-guard v{}", env!("CARGO_PKG_VERSION"));
    eprintln!();
    eprintln!("Usage: cassette-guard <command> [options]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  config                   Show the resolved session configuration");
    eprintln!("  sanitize-url <url>       Show how a request URL is recorded");
    eprintln!("  match-key <method> <url> Show the replay match key for a request");
    eprintln!("  fetch <url> [api-key]    Make a live http:// call and print the sanitized interaction");
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    if let Err(e) = run(&args[1], &args[2..]) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(command: &str, args: &[String]) -> anyhow::Result<()> {
    let session = SessionConfig::from_env(load_settings()?);

    match (command, args) {
        ("config", []) => show_config(&session),
        ("sanitize-url", [url]) => {
            let request = RequestSnapshot::new("GET", url.as_str());
            let request = session.anonymizer().anonymize(request);
            println!("{}", request.url);
        }
        ("match-key", [method, url]) => {
            let key = MatchKey::from_request(&RequestSnapshot::new(method.as_str(), url.as_str()));
            for field in session.policy().fields() {
                println!("{field:<7} {}", key.field(*field));
            }
        }
        ("fetch", [url, rest @ ..]) if rest.len() <= 1 => {
            let mut request = RequestSnapshot::new("GET", url.as_str());
            if let Some(api_key) = rest.first() {
                let headers = request.headers.clone().with_appended(API_KEY_HEADER, api_key.as_str());
                request = request.with_headers(headers);
            }

            let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
            let interaction = runtime.block_on(async {
                HttpClient::new()
                    .record(&session.engine_config(), request)
                    .await
            })?;
            println!("{}", serde_json::to_string_pretty(&interaction)?);
        }
        _ => {
            print_usage();
            anyhow::bail!("unknown command or wrong arguments: {command}");
        }
    }

    Ok(())
}

fn load_settings() -> anyhow::Result<Settings> {
    match std::env::var("CASSETTE_GUARD_SETTINGS") {
        Ok(path) => Settings::from_file(Path::new(&path))
            .with_context(|| format!("loading settings from {path}")),
        Err(_) if Path::new(DEFAULT_SETTINGS_FILE).exists() => {
            Ok(Settings::from_file(Path::new(DEFAULT_SETTINGS_FILE))?)
        }
        Err(_) => Ok(Settings::default()),
    }
}

fn show_config(session: &SessionConfig) {
    let config = session.engine_config();

    println!("Base URL variable: {}", session.settings().base_url_env);
    match session.reference_netloc() {
        Some(netloc) => println!("Reference host:    {netloc}"),
        None => println!("Reference host:    <none> (anonymization disabled)"),
    }
    println!("Record mode:       {}", config.record_mode.as_str());
    println!("Filtered headers:  {}", config.filter_headers.join(", "));
    let match_on: Vec<&str> = config.match_on.iter().map(|f| f.as_str()).collect();
    println!("Match on:          {}", match_on.join(", "));
}
