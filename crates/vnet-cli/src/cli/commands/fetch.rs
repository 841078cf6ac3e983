//! `vnet fetch` – download one slice from a simulated network.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use vnet_core::config::VnetConfig;
use vnet_core::protocol::ContentId;
use vnet_core::sim::{NodeBehavior, SimNetwork, SimNode};
use vnet_core::{DownloadResult, Slice, SliceDownloader, TransportContext};

/// Network shape and slice to fetch.
#[derive(Debug, Clone, Args)]
pub struct FetchArgs {
    /// Number of regular peer nodes.
    #[arg(long, default_value = "3", value_name = "N")]
    pub regular: usize,
    /// Number of fallback (server) nodes.
    #[arg(long, default_value = "1", value_name = "N")]
    pub fallback: usize,
    /// Slice size in bytes.
    #[arg(long, default_value = "4000000", value_name = "BYTES")]
    pub size: u32,
    /// Slice identifier.
    #[arg(long, default_value = "0")]
    pub slice_id: u16,
    /// Content id (24 characters of [0-9a-z]).
    #[arg(long, default_value = "movie0000000000000000001")]
    pub content: String,
    /// Relative deadline in milliseconds.
    #[arg(long, default_value = "5000", value_name = "MS")]
    pub deadline_ms: i64,
    /// Base reply latency of a node; each further node is 5ms slower.
    #[arg(long, default_value = "10", value_name = "MS")]
    pub latency_ms: u64,
    /// How many regular nodes never answer.
    #[arg(long, default_value = "0", value_name = "N")]
    pub silent: usize,
    /// How many regular nodes answer "busy" to their first two requests.
    #[arg(long, default_value = "0", value_name = "N")]
    pub busy: usize,
    /// How many regular nodes do not hold the slice.
    #[arg(long, default_value = "0", value_name = "N")]
    pub no_slice: usize,
    /// Print the session summary as JSON.
    #[arg(long)]
    pub json: bool,
    /// Write the assembled slice to this file.
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}

impl FetchArgs {
    /// Simulated nodes: the misbehaving regular nodes first, in flag order.
    pub fn nodes(&self) -> Vec<SimNode> {
        let mut nodes = Vec::with_capacity(self.regular + self.fallback);
        for i in 0..self.regular {
            let behavior = if i < self.silent {
                NodeBehavior::SilentFirst(u32::MAX)
            } else if i < self.silent + self.busy {
                NodeBehavior::BusyFirst {
                    count: 2,
                    hint_ms: 100,
                }
            } else if i < self.silent + self.busy + self.no_slice {
                NodeBehavior::NoSlice
            } else {
                NodeBehavior::Serve
            };
            nodes.push(
                SimNode::regular(format!("peer{i}"))
                    .latency_ms(self.latency_ms + 5 * i as u64)
                    .behavior(behavior),
            );
        }
        for i in 0..self.fallback {
            nodes.push(SimNode::fallback(format!("server{i}")).latency_ms(self.latency_ms));
        }
        nodes
    }
}

pub async fn run_fetch(cfg: &VnetConfig, args: &FetchArgs) -> Result<()> {
    if args.silent + args.busy + args.no_slice > args.regular {
        bail!("--silent, --busy and --no-slice together exceed --regular");
    }
    let content = ContentId::parse(&args.content)
        .with_context(|| format!("invalid content id {:?}", args.content))?;
    let ctx = Arc::new(TransportContext::new(content));
    let slice = Slice {
        id: args.slice_id,
        size: args.size,
    };

    let net = SimNetwork::new(args.nodes());
    let downloader = SliceDownloader::new(cfg.clone(), net.collaborators())?;
    let handle = downloader.download_slice(
        Arc::clone(&ctx),
        slice,
        Box::new(|result: DownloadResult, ctx: &TransportContext, slice: &Slice| {
            tracing::info!(content = %ctx.content, slice = slice.id, code = result.code(), "done");
        }),
        args.deadline_ms,
    )?;
    let summary = handle.finished().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("result:      {} ({})", summary.result, summary.result.code());
        println!(
            "chunks:      {}/{} ({} bytes)",
            summary.chunks_completed, summary.chunks_total, summary.bytes
        );
        println!(
            "requests:    {} ({} to fallback nodes)",
            summary.requests_issued, summary.fallback_requests
        );
        println!(
            "failures:    {} chunk timeouts, {} busy replies, {} nodes dropped",
            summary.chunk_timeouts, summary.busy_replies, summary.dead_nodes
        );
        println!("connections: {}", summary.connections_opened);
        println!("elapsed:     {} ms", summary.elapsed_ms);
        if let Some(digest) = &summary.sha256 {
            println!("sha256:      {}", digest);
        }
    }

    if !summary.result.is_success() {
        bail!("slice download failed: {}", summary.result);
    }
    if let Some(path) = &args.out {
        let data = net
            .store()
            .contents(&ctx, &slice)
            .context("assembled slice missing from store")?;
        std::fs::write(path, data).with_context(|| format!("write {}", path.display()))?;
    }
    Ok(())
}
