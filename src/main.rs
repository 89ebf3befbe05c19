mod cli;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Commands, ResolverArgs};
use lfcredir::catalog::MemoryCatalog;
use lfcredir::config::ResolverConfig;
use lfcredir::json_output::JsonOutput;
use lfcredir::locate::{LocateAdapter, StatOutcome};
use lfcredir::logging::{level_filter, ENV_DEBUG_LEVEL};
use lfcredir::rewrite;

fn main() -> Result<()> {
    let debug_level = std::env::var(ENV_DEBUG_LEVEL).ok();
    env_logger::Builder::from_default_env()
        .filter_level(level_filter(debug_level.as_deref()))
        .init();

    let cli = Cli::parse();
    let json = cli.json;

    let result = match cli.command {
        Commands::Rewrite { lfn } => cmd_rewrite(&lfn, json),
        Commands::Resolve { resolver, lfns } => cmd_resolve(&resolver, &lfns, json),
        Commands::Locate { resolver, lfns } => cmd_locate(&resolver, &lfns, json),
        Commands::Stat { resolver, lfns } => cmd_stat(&resolver, &lfns, json),
    };

    if let (Err(e), true) = (&result, json) {
        println!("{}", JsonOutput::error(&format!("{:#}", e), 1));
    }
    result
}

fn open_adapter(args: &ResolverArgs) -> Result<LocateAdapter> {
    log::info!("init resolver with params: {}", args.params);
    let config = ResolverConfig::from_env(&args.params).context("Error while parsing parameters")?;
    let catalog = MemoryCatalog::open_snapshot(&args.catalog)
        .context("Error while starting catalog session")?;
    Ok(LocateAdapter::with_session(config, Box::new(catalog)))
}

fn print_report(adapter: &LocateAdapter, args: &ResolverArgs, json: bool) {
    let resolver = adapter.resolver();
    if args.events_jsonl {
        let events = resolver.export_events();
        if !events.is_empty() {
            println!("{}", events);
        }
    }
    if !args.stats {
        return;
    }
    if json {
        println!("{}", JsonOutput::summary(&resolver.metrics(), &resolver.cache_stats()));
    } else {
        println!();
        print!("{}", resolver.metrics());
        let cache = resolver.cache_stats();
        println!(
            "  Cache entries: {} ({} inserted, {} expired, {} evicted)",
            cache.entry_count, cache.insertions, cache.ttl_evictions, cache.capacity_evictions
        );
        for event in resolver.recent_events(10) {
            println!("  {}", event.to_text());
        }
    }
}

fn cmd_rewrite(lfn: &str, json: bool) -> Result<()> {
    let candidates = rewrite::rewrite(lfn);
    if json {
        println!("{}", JsonOutput::candidates(lfn, &candidates));
    } else {
        println!("Candidates for {}:", lfn);
        for (i, candidate) in candidates.iter().enumerate() {
            println!("  {}) {}", i, candidate);
        }
    }
    Ok(())
}

fn cmd_resolve(args: &ResolverArgs, lfns: &[String], json: bool) -> Result<()> {
    let adapter = open_adapter(args)?;

    for lfn in lfns {
        let resolution = adapter.resolver().resolve_as(lfn, &args.client).ok();
        if json {
            println!("{}", JsonOutput::resolution(lfn, resolution.as_ref()));
        } else {
            match resolution {
                Some(r) => println!("{} -> {} ({:?})", lfn, r.pfn, r.source),
                None => println!("{} -> not found", lfn),
            }
        }
    }

    print_report(&adapter, args, json);
    Ok(())
}

fn cmd_locate(args: &ResolverArgs, lfns: &[String], json: bool) -> Result<()> {
    let adapter = open_adapter(args)?;

    for lfn in lfns {
        let target = adapter.locate(lfn, &args.client);
        if json {
            println!("{}", JsonOutput::redirect(lfn, &target));
        } else {
            println!("{} -> redirect {:?} {}", lfn, target.kind, target);
        }
    }

    print_report(&adapter, args, json);
    Ok(())
}

fn cmd_stat(args: &ResolverArgs, lfns: &[String], json: bool) -> Result<()> {
    let adapter = open_adapter(args)?;

    for lfn in lfns {
        let outcome = adapter.stat(lfn, &args.client);
        if json {
            println!("{}", JsonOutput::stat(lfn, &outcome));
        } else {
            match outcome {
                StatOutcome::NotFound => println!("{}: not found", lfn),
                StatOutcome::Exists(info) => {
                    println!("{}: ok (size={} mode={:o})", lfn, info.size, info.mode)
                }
            }
        }
    }

    print_report(&adapter, args, json);
    Ok(())
}
