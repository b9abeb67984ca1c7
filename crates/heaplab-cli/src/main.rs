//! CLI entrypoint for the heaplab sandbox.
//!
//! Thin adapter: tokenizes commands from stdin (or a script file), calls
//! the core façade, and formats results. All semantics live in
//! `heaplab-core`.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Parser;

use heaplab_core::{FitStrategy, MemorySandbox, SandboxConfig, WritePolicy};

/// Interactive memory-management sandbox.
#[derive(Debug, Parser)]
#[command(name = "heaplab")]
#[command(about = "Fixed-size heap allocator and cache simulator sandbox")]
struct Cli {
    /// Heap size in bytes.
    #[arg(long, default_value_t = heaplab_core::DEFAULT_HEAP_SIZE)]
    heap_size: usize,
    /// Default fit strategy (first, best, worst).
    #[arg(long, default_value = "first")]
    strategy: String,
    /// Write-poisoning policy (permissive or strict).
    #[arg(long)]
    write_policy: Option<String>,
    /// Run commands from a script file instead of stdin.
    #[arg(long)]
    script: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    if cli.heap_size <= heaplab_core::HEADER_SIZE {
        return Err(format!(
            "heap size must exceed one block header ({} bytes)",
            heaplab_core::HEADER_SIZE
        )
        .into());
    }

    let mut config = SandboxConfig {
        strategy: FitStrategy::parse(&cli.strategy),
        ..SandboxConfig::default()
    };
    if let Some(policy) = &cli.write_policy {
        config.write_policy = WritePolicy::from_str_loose(policy);
    }
    let mut sandbox = MemorySandbox::new(vec![0u8; cli.heap_size], config);

    let interactive = cli.script.is_none();
    let input: Box<dyn BufRead> = match &cli.script {
        Some(path) => Box::new(io::BufReader::new(fs::File::open(path)?)),
        None => Box::new(io::BufReader::new(io::stdin())),
    };

    if interactive {
        println!(
            "heaplab sandbox: {} byte heap, {} fit. Type 'help' for commands.",
            cli.heap_size,
            sandbox.strategy()
        );
    }

    let mut lines = input.lines();
    loop {
        if interactive {
            print!("allocator> ");
            io::stdout().flush()?;
        }
        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }
        match dispatch(&mut sandbox, &tokens) {
            Flow::Continue => {}
            Flow::Quit => break,
        }
    }
    Ok(())
}

enum Flow {
    Continue,
    Quit,
}

fn dispatch(sandbox: &mut MemorySandbox, tokens: &[&str]) -> Flow {
    match tokens[0] {
        "malloc" => cmd_malloc(sandbox, &tokens[1..]),
        "free" => cmd_free(sandbox, &tokens[1..]),
        "read" => cmd_read(sandbox, &tokens[1..]),
        "write" => cmd_write(sandbox, &tokens[1..]),
        "cacheable" => cmd_cacheable(sandbox, &tokens[1..]),
        "access" => cmd_access(sandbox, &tokens[1..]),
        "strategy" => cmd_strategy(sandbox, &tokens[1..]),
        "dump" => sandbox.dump(),
        "stats" => cmd_stats(sandbox, &tokens[1..]),
        "cache" => cmd_cache(sandbox, &tokens[1..]),
        "help" => print_help(),
        "exit" | "quit" => return Flow::Quit,
        other => println!("Unknown command '{other}'. Type 'help'."),
    }
    Flow::Continue
}

fn parse_or_warn<T: std::str::FromStr>(token: Option<&&str>, what: &str) -> Option<T> {
    match token {
        Some(raw) => match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                println!("Invalid {what}: '{raw}'");
                None
            }
        },
        None => {
            println!("Missing {what}");
            None
        }
    }
}

fn cmd_malloc(sandbox: &mut MemorySandbox, args: &[&str]) {
    let Some(size) = parse_or_warn::<usize>(args.first(), "size") else {
        return;
    };
    let id = match args.get(1) {
        Some(strategy) => sandbox.malloc_named(size, strategy),
        None => sandbox.malloc(size),
    };
    if id < 0 {
        println!("malloc failed (size={size})");
    } else {
        println!("Allocated block id={id}");
    }
}

fn cmd_free(sandbox: &mut MemorySandbox, args: &[&str]) {
    let Some(id) = parse_or_warn::<i64>(args.first(), "id") else {
        return;
    };
    sandbox.free(id);
    println!("Freed id={id}");
}

fn cmd_read(sandbox: &mut MemorySandbox, args: &[&str]) {
    let Some(id) = parse_or_warn::<i64>(args.first(), "id") else {
        return;
    };
    let Some(offset) = parse_or_warn::<usize>(args.get(1), "offset") else {
        return;
    };
    let Some(count) = parse_or_warn::<usize>(args.get(2), "byte count") else {
        return;
    };
    if count > sandbox.heap_size() {
        println!("byte count exceeds the heap");
        return;
    }
    let mut buf = vec![0u8; count];
    let clean = sandbox.read(id, offset, &mut buf);
    let rendered: Vec<String> = buf.iter().map(|b| format!("{b:02x}")).collect();
    println!(
        "read {}: [{}]",
        if clean { "ok" } else { "GARBAGE" },
        rendered.join(" ")
    );
}

fn cmd_write(sandbox: &mut MemorySandbox, args: &[&str]) {
    let Some(id) = parse_or_warn::<i64>(args.first(), "id") else {
        return;
    };
    let Some(offset) = parse_or_warn::<usize>(args.get(1), "offset") else {
        return;
    };
    if args.len() < 3 {
        println!("Missing data bytes");
        return;
    }
    let mut data = Vec::with_capacity(args.len() - 2);
    for raw in &args[2..] {
        match u8::from_str_radix(raw.trim_start_matches("0x"), 16) {
            Ok(byte) => data.push(byte),
            Err(_) => {
                println!("Invalid byte: '{raw}' (expected hex)");
                return;
            }
        }
    }
    if sandbox.write(id, offset, &data) {
        println!("write ok ({} bytes)", data.len());
    } else {
        println!("write failed");
    }
}

fn cmd_cacheable(sandbox: &mut MemorySandbox, args: &[&str]) {
    let Some(id) = parse_or_warn::<i64>(args.first(), "id") else {
        return;
    };
    let flag = match args.get(1) {
        Some(&"on") | Some(&"true") | Some(&"1") => true,
        Some(&"off") | Some(&"false") | Some(&"0") => false,
        _ => {
            println!("Expected on|off");
            return;
        }
    };
    sandbox.set_cacheable(id, flag);
}

fn cmd_access(sandbox: &mut MemorySandbox, args: &[&str]) {
    let Some(id) = parse_or_warn::<i64>(args.first(), "id") else {
        return;
    };
    let is_write = matches!(args.get(1), Some(&"w") | Some(&"write"));
    sandbox.access(id, is_write);
}

fn cmd_strategy(sandbox: &mut MemorySandbox, args: &[&str]) {
    match args.first() {
        Some(name) => {
            sandbox.set_strategy(FitStrategy::parse(name));
            println!("Default strategy: {}", sandbox.strategy());
        }
        None => println!("Current strategy: {}", sandbox.strategy()),
    }
}

fn cmd_stats(sandbox: &mut MemorySandbox, args: &[&str]) {
    if args.first() == Some(&"json") {
        let heap = sandbox.heap_report();
        let cache = sandbox.cache().report();
        match serde_json::to_string_pretty(&serde_json::json!({
            "heap": heap,
            "cache": cache,
        })) {
            Ok(payload) => println!("{payload}"),
            Err(err) => println!("stats serialization failed: {err}"),
        }
    } else {
        sandbox.stats();
    }
}

fn cmd_cache(sandbox: &mut MemorySandbox, args: &[&str]) {
    match args.first() {
        Some(&"init") => {
            sandbox.cache_mut().init_default();
            println!("Cache reset to default L1/L2 configuration");
        }
        Some(&"reset") => {
            sandbox.cache_mut().reset();
            println!("Cache cleared (no levels)");
        }
        Some(&"add") => {
            let Some(size) = parse_or_warn::<usize>(args.get(1), "size") else {
                return;
            };
            let Some(block) = parse_or_warn::<usize>(args.get(2), "block size") else {
                return;
            };
            let Some(assoc) = parse_or_warn::<usize>(args.get(3), "associativity") else {
                return;
            };
            let Some(latency) = parse_or_warn::<u64>(args.get(4), "latency") else {
                return;
            };
            sandbox.cache_mut().add_level(size, block, assoc, latency);
            println!("Added L{}", sandbox.cache().level_count());
        }
        Some(&"config") => {
            let Some(level) = parse_or_warn::<usize>(args.get(1), "level (1-based)") else {
                return;
            };
            if level == 0 || level > sandbox.cache().level_count() {
                println!("Invalid level");
                return;
            }
            let Some(size) = parse_or_warn::<usize>(args.get(2), "size") else {
                return;
            };
            let Some(block) = parse_or_warn::<usize>(args.get(3), "block size") else {
                return;
            };
            let Some(assoc) = parse_or_warn::<usize>(args.get(4), "associativity") else {
                return;
            };
            let Some(latency) = parse_or_warn::<u64>(args.get(5), "latency") else {
                return;
            };
            sandbox
                .cache_mut()
                .configure_level(level - 1, size, block, assoc, latency);
            println!("Configured L{level}");
        }
        Some(&"latency") => {
            let Some(cycles) = parse_or_warn::<u64>(args.get(1), "cycles") else {
                return;
            };
            sandbox.cache_mut().set_memory_latency(cycles);
        }
        Some(&"stats") => {
            let _ = sandbox.cache().dump_stats(&mut io::stdout());
        }
        _ => println!("cache subcommands: init | reset | add | config | latency | stats"),
    }
}

fn print_help() {
    println!(
        "\
Commands:
  malloc <size> [strategy]         allocate (strategy: first|best|worst)
  free <id>                        release a block
  read <id> <offset> <n>           read n bytes (hex rendered)
  write <id> <offset> <hex bytes>  write bytes, e.g. write 0 0 de ad be ef
  cacheable <id> <on|off>          toggle cache routing for a block
  access <id> [r|w]                simulate one cache access
  strategy [first|best|worst]      show or set the default fit strategy
  dump                             list blocks
  stats [json]                     allocator + cache statistics
  cache init|reset|add|config|latency|stats
                                   cache configuration submenu
  help                             this text
  exit | quit                      leave"
    );
}
