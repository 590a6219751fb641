// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Tether Probe CLI
//!
//! Drives a pair of endpoints over the in-process transport and prints their
//! counters.
//!
//! # Usage
//!
//! ```bash
//! # 10k frames of 64 bytes through push/pull
//! tether-probe push-pull --count 10000 --size 64
//!
//! # Sender settings from a file
//! tether-probe push-pull --config tether.toml
//!
//! # Sequential request/reply round trips
//! tether-probe req-rep --count 100
//!
//! # Write an example configuration
//! tether-probe gen-config --output tether.toml
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tether::{BufferInfo, Endpoint, EndpointConfig, InprocTransport, StatsSnapshot, Transport};
use tracing_subscriber::EnvFilter;

/// Tether endpoint probe
#[derive(Parser, Debug)]
#[command(name = "tether-probe")]
#[command(about = "Exercise tether endpoints in-process and report counters")]
#[command(version)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Push frames to a pull endpoint
    PushPull {
        /// Sender configuration file (pattern, address and attach are overridden)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of frames
        #[arg(short = 'n', long, default_value = "1000")]
        count: usize,

        /// Frame size in bytes
        #[arg(short, long, default_value = "64")]
        size: usize,

        /// Queue buffer size
        #[arg(short, long, default_value = "1000")]
        buffer: usize,
    },

    /// Sequential request/reply round trips
    ReqRep {
        /// Number of requests
        #[arg(short = 'n', long, default_value = "100")]
        count: usize,
    },

    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "tether.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match args.command {
        Commands::PushPull {
            config,
            count,
            size,
            buffer,
        } => cmd_push_pull(config, count, size, buffer).await,
        Commands::ReqRep { count } => cmd_req_rep(count).await,
        Commands::GenConfig { output } => cmd_gen_config(output),
        Commands::Validate { config } => cmd_validate(config),
    }
}

fn endpoint(
    transport: &InprocTransport,
    base: EndpointConfig,
    pattern: &str,
    address: &str,
    connect: bool,
) -> Result<Endpoint, Box<dyn std::error::Error>> {
    let config = EndpointConfig {
        pattern: pattern.to_string(),
        address: address.to_string(),
        attach: connect,
        ..base
    };
    let transport: Arc<dyn Transport> = Arc::new(transport.clone());
    Ok(Endpoint::new(config, transport)?)
}

async fn wait_bound(transport: &InprocTransport, address: &str) {
    for _ in 0..500 {
        if transport.bound_addresses().iter().any(|a| a == address) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    tracing::warn!(address, "address not bound yet, relying on reconnect");
}

async fn cmd_push_pull(
    config: Option<PathBuf>,
    count: usize,
    size: usize,
    buffer: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let sender_base = match config {
        Some(path) => EndpointConfig::from_file(path)?,
        None => EndpointConfig::builder().buffer_size(buffer).build(),
    };
    let receiver_base = EndpointConfig::builder().buffer_size(buffer).build();

    let address = "inproc://probe-push-pull";
    let transport = InprocTransport::new();
    let pull = endpoint(&transport, receiver_base, "pull", address, false)?;
    let push = endpoint(&transport, sender_base, "push", address, true)?;

    println!("Tether Probe v{}", env!("CARGO_PKG_VERSION"));
    println!("=====================================");
    println!("push/pull: {} frames x {} bytes, buffer {}", count, size, buffer);
    println!();

    pull.start_consumer()?;
    wait_bound(&transport, address).await;
    push.start_publisher()?;

    let start = Instant::now();
    let producer = {
        let push = push.clone();
        tokio::spawn(async move {
            for i in 0..count {
                let mut frame = vec![0u8; size.max(8)];
                frame[..8].copy_from_slice(&(i as u64).to_be_bytes());
                if push.send(frame).await.is_err() {
                    break;
                }
            }
        })
    };

    let mut received = 0;
    let mut out_of_order = 0;
    while received < count {
        match tokio::time::timeout(Duration::from_secs(5), pull.recv_outbound()).await {
            Ok(Some(frame)) => {
                let mut seq = [0u8; 8];
                seq.copy_from_slice(&frame[..8]);
                if u64::from_be_bytes(seq) != received as u64 {
                    out_of_order += 1;
                }
                received += 1;
            }
            Ok(None) => break,
            Err(_) => {
                tracing::warn!(received, "no frame within 5s, giving up");
                break;
            }
        }
    }
    let elapsed = start.elapsed();
    producer.await?;

    let push_leftovers = push.shutdown().await.err().map(|e| e.leftovers());
    let pull_leftovers = pull.shutdown().await.err().map(|e| e.leftovers());

    println!("Received {} / {} in {:.3}s", received, count, elapsed.as_secs_f64());
    if elapsed.as_secs_f64() > 0.0 {
        println!(
            "Throughput: {:.0} msg/s",
            received as f64 / elapsed.as_secs_f64()
        );
    }
    println!("Out of order: {}", out_of_order);
    println!();
    print_stats("push", &push.stats(), push_leftovers);
    print_stats("pull", &pull.stats(), pull_leftovers);
    Ok(())
}

async fn cmd_req_rep(count: usize) -> Result<(), Box<dyn std::error::Error>> {
    let address = "inproc://probe-req-rep";
    let transport = InprocTransport::new();
    let base = EndpointConfig::default();
    let rep = endpoint(&transport, base.clone(), "rep", address, false)?;
    let req = endpoint(&transport, base, "req", address, true)?;

    println!("Tether Probe v{}", env!("CARGO_PKG_VERSION"));
    println!("=====================================");
    println!("req/rep: {} round trips", count);
    println!();

    rep.start_responser()?;
    wait_bound(&transport, address).await;
    req.start_requester()?;

    let echo = {
        let rep = rep.clone();
        tokio::spawn(async move {
            while let Some(request) = rep.recv_outbound().await {
                if rep.send(request).await.is_err() {
                    break;
                }
            }
        })
    };

    let mut latencies = Vec::with_capacity(count);
    let mut empty = 0;
    for i in 0..count {
        let start = Instant::now();
        req.send(i.to_string().into_bytes()).await?;
        match req.recv_outbound().await {
            Some(reply) if reply.is_empty() => empty += 1,
            Some(_) => latencies.push(start.elapsed()),
            None => break,
        }
    }

    let req_leftovers = req.shutdown().await.err().map(|e| e.leftovers());
    let rep_leftovers = rep.shutdown().await.err().map(|e| e.leftovers());
    echo.await?;

    latencies.sort();
    if let (Some(min), Some(max)) = (latencies.first(), latencies.last()) {
        let p50 = latencies[latencies.len() / 2];
        println!("Round trips: {} ({} unanswered)", latencies.len(), empty);
        println!(
            "Latency: min {:?}, p50 {:?}, max {:?}",
            min, p50, max
        );
    } else {
        println!("No round trip completed ({} unanswered)", empty);
    }
    println!();
    print_stats("req", &req.stats(), req_leftovers);
    print_stats("rep", &rep.stats(), rep_leftovers);
    Ok(())
}

fn print_stats(name: &str, stats: &StatsSnapshot, leftovers: Option<BufferInfo>) {
    println!(
        "  {:<5} sent={} received={} dropped={} restarts={} rate={:.1}/s",
        name,
        stats.sent,
        stats.received,
        stats.dropped,
        stats.restarts,
        stats.send_rate()
    );
    if let Some(leftovers) = leftovers {
        println!("        released with leftovers: {}", leftovers);
    }
}

fn cmd_gen_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = EndpointConfig::builder()
        .pattern("push")
        .address("inproc://jobs")
        .attach(true)
        .buffer_size(1000)
        .retry_attempts(5)
        .retry_interval(Duration::from_millis(500))
        .exit_wait_timeout(Duration::from_secs(10))
        .registry_address("inproc://registry")
        .register_interval(Duration::from_secs(5))
        .build();

    let toml_str = toml::to_string_pretty(&config)?;

    // Add comments
    let content = format!(
        r#"# Tether Endpoint Configuration
# Generated by tether-probe gen-config

{}
"#,
        toml_str
    );

    std::fs::write(&output, content)?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

fn cmd_validate(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    match EndpointConfig::from_file(&config_path) {
        Ok(config) => {
            let pattern: tether::Pattern = config.pattern.parse()?;
            let caps = pattern.queue_capacities(config.buffer_size);
            println!("Configuration valid!");
            println!();
            println!("Pattern: {}", pattern);
            let mode = if config.attach { "connect" } else { "bind" };
            println!("Address: {} ({})", config.address, mode);
            println!(
                "Queues:  in={} out={} retry={}",
                caps.inbound, caps.outbound, caps.retry
            );
            println!(
                "Retry:   {} attempts every {:?}",
                config.retry_attempts,
                config.retry_interval()
            );
            match &config.registry_address {
                Some(registry) => println!(
                    "Registry: {} every {:?}",
                    registry,
                    config.register_interval()
                ),
                None => println!("Registry: disabled"),
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}
