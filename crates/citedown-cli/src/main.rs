use anyhow::{Context, Result};
use citedown_config::Config;
use citedown_engine::{ResolveContext, parse_document, resolve_tree, serialize_document};
use std::{env, fs, path::PathBuf, process};

enum Output {
    Markdown,
    Json,
    Text,
}

struct Args {
    file: PathBuf,
    output: Output,
    ticket: Option<String>,
    api_base: Option<String>,
}

fn print_usage() {
    eprintln!("Usage: citedown [OPTIONS] <FILE>");
    eprintln!();
    eprintln!("Parse a Markdown document and print it back out.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --json             print the document tree as JSON");
    eprintln!("  --text             print the plain-text projection");
    eprintln!("  --ticket <ID>      resolve relative image paths against this ticket");
    eprintln!("  --api-base <URL>   override the configured API base URL");
}

fn parse_args() -> Option<Args> {
    let mut file = None;
    let mut output = Output::Markdown;
    let mut ticket = None;
    let mut api_base = None;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--json" => output = Output::Json,
            "--text" => output = Output::Text,
            "--ticket" => ticket = Some(args.next()?),
            "--api-base" => api_base = Some(args.next()?),
            "--help" | "-h" => return None,
            _ if arg.starts_with('-') => return None,
            _ => {
                if file.is_some() {
                    return None;
                }
                file = Some(PathBuf::from(arg));
            }
        }
    }

    Some(Args {
        file: file?,
        output,
        ticket,
        api_base,
    })
}

fn main() -> Result<()> {
    let Some(args) = parse_args() else {
        print_usage();
        process::exit(2);
    };

    let input = fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let mut tree = parse_document(&input);

    if args.ticket.is_some() {
        let config = Config::load()?.unwrap_or_default();
        let ctx = ResolveContext {
            ticket_id: args.ticket,
            api_base_url: args.api_base.or(config.api_base_url),
            access_token: config.access_token,
        };
        tree = resolve_tree(&tree, &ctx);
    }

    match args.output {
        Output::Markdown => print!("{}", serialize_document(&tree)),
        Output::Json => println!("{}", serde_json::to_string_pretty(&tree.to_json())?),
        Output::Text => println!("{}", tree.text_content()),
    }

    Ok(())
}
