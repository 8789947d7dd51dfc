//! Line-oriented command shell over a running cache

use super::build_cache;
use anyhow::{bail, Result};
use ringcache_core::{CacheManager, ConfigManager, PrometheusExporter, TargetStatus};
use serde_json::Value;
use std::path::Path;
use std::str::FromStr;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::broadcast;
use tracing::{debug, info};

const PROMPT: &str = "ringcache> ";

const HELP: &str = "\
Commands:
  set <key> <json-value> [ttl_ms]   store a value on every replica
  get <key>                         read the first live replica
  del <key>                         delete from every replica
  add-vnode <vnode> <shard>         register a vnode
  del-vnode <vnode>                 remove a vnode and its data
  add-shard <shard>                 create an empty shard
  del-shard <shard>                 remove an empty shard
  owners <key>                      vnodes responsible for a key
  view [json]                       print the ring
  stats                             print metrics
  help                              show this text
  quit                              leave the shell
Values that are not valid JSON are stored as strings.";

#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    Set {
        key: String,
        value: Value,
        ttl_ms: Option<u64>,
    },
    Get { key: String },
    Del { key: String },
    AddVNode { vnode: String, shard: String },
    DelVNode { vnode: String },
    AddShard { shard: String },
    DelShard { shard: String },
    Owners { key: String },
    View { json: bool },
    Stats,
    Help,
    Quit,
}

impl FromStr for ShellCommand {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim();
        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };
        let args: Vec<&str> = rest.split_whitespace().collect();

        let command = match name.to_lowercase().as_str() {
            "set" => parse_set(rest)?,
            "get" => ShellCommand::Get {
                key: one_arg(&args, "get <key>")?,
            },
            "del" => ShellCommand::Del {
                key: one_arg(&args, "del <key>")?,
            },
            "add-vnode" => match args.as_slice() {
                [vnode, shard] => ShellCommand::AddVNode {
                    vnode: vnode.to_string(),
                    shard: shard.to_string(),
                },
                _ => bail!("usage: add-vnode <vnode> <shard>"),
            },
            "del-vnode" => ShellCommand::DelVNode {
                vnode: one_arg(&args, "del-vnode <vnode>")?,
            },
            "add-shard" => ShellCommand::AddShard {
                shard: one_arg(&args, "add-shard <shard>")?,
            },
            "del-shard" => ShellCommand::DelShard {
                shard: one_arg(&args, "del-shard <shard>")?,
            },
            "owners" => ShellCommand::Owners {
                key: one_arg(&args, "owners <key>")?,
            },
            "view" => match args.as_slice() {
                [] => ShellCommand::View { json: false },
                ["json"] => ShellCommand::View { json: true },
                _ => bail!("usage: view [json]"),
            },
            "stats" => ShellCommand::Stats,
            "help" | "?" => ShellCommand::Help,
            "quit" | "exit" => ShellCommand::Quit,
            "" => bail!("empty command"),
            other => bail!("unknown command: {} (try 'help')", other),
        };
        Ok(command)
    }
}

fn one_arg(args: &[&str], usage: &str) -> Result<String> {
    match args {
        [arg] => Ok(arg.to_string()),
        _ => bail!("usage: {}", usage),
    }
}

fn parse_set(rest: &str) -> Result<ShellCommand> {
    let Some((key, value_part)) = rest.split_once(char::is_whitespace) else {
        bail!("usage: set <key> <json-value> [ttl_ms]");
    };
    let value_part = value_part.trim();

    let (value, ttl_ms) = match serde_json::from_str::<Value>(value_part) {
        Ok(value) => (value, None),
        Err(_) => match value_part.rsplit_once(char::is_whitespace) {
            Some((head, tail)) if tail.parse::<u64>().is_ok() => {
                let head = head.trim();
                let value = serde_json::from_str(head)
                    .unwrap_or_else(|_| Value::String(head.to_string()));
                (value, tail.parse::<u64>().ok())
            }
            _ => (Value::String(value_part.to_string()), None),
        },
    };

    if ttl_ms == Some(0) {
        bail!("ttl_ms must be greater than 0");
    }

    Ok(ShellCommand::Set {
        key: key.to_string(),
        value,
        ttl_ms,
    })
}

/// Executes shell commands against one cache
pub struct Shell {
    cache: CacheManager,
    exporter: PrometheusExporter,
}

impl Shell {
    pub fn new(cache: CacheManager) -> Result<Self> {
        let exporter =
            PrometheusExporter::new(cache.stats().clone(), cache.vnode_manager().clone())?;
        Ok(Self { cache, exporter })
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Run one command, returning the text to print
    pub fn execute(&self, command: ShellCommand) -> Result<String> {
        let manager = self.cache.vnode_manager();

        let output = match command {
            ShellCommand::Set { key, value, ttl_ms } => {
                let report = self.cache.add(&key, value, ttl_ms);
                format!(
                    "stored on {}/{} replica(s): {}",
                    report.reached(),
                    report.requested,
                    join_or(&report.vnode_keys(), "-")
                )
            }
            ShellCommand::Get { key } => match self.cache.get(&key) {
                Some(value) => value.to_string(),
                None => "(nil)".to_string(),
            },
            ShellCommand::Del { key } => {
                let report = self.cache.remove(&key);
                format!(
                    "removed from {} of {} replica(s)",
                    report.count(TargetStatus::Removed),
                    report.reached()
                )
            }
            ShellCommand::AddVNode { vnode, shard } => {
                manager.add_vnode(&vnode, &shard)?;
                format!("added vnode {} to {}", vnode, shard)
            }
            ShellCommand::DelVNode { vnode } => {
                if manager.delete_vnode(&vnode) {
                    format!("deleted vnode {}", vnode)
                } else {
                    format!("no vnode named {}", vnode)
                }
            }
            ShellCommand::AddShard { shard } => {
                manager.add_shard(&shard)?;
                format!("added shard {}", shard)
            }
            ShellCommand::DelShard { shard } => {
                manager.remove_shard(&shard)?;
                format!("deleted shard {}", shard)
            }
            ShellCommand::Owners { key } => {
                let owners = self.cache.owners(&key);
                let owners: Vec<&str> = owners.iter().map(String::as_str).collect();
                join_or(&owners, "(no vnodes)")
            }
            ShellCommand::View { json } => {
                let snapshot = self.cache.snapshot();
                if json {
                    snapshot.to_json()?
                } else {
                    snapshot.to_string().trim_end().to_string()
                }
            }
            ShellCommand::Stats => self.exporter.render()?.trim_end().to_string(),
            ShellCommand::Help => HELP.to_string(),
            ShellCommand::Quit => String::new(),
        };
        Ok(output)
    }

    /// Read commands from `reader` until `quit` or end of input.
    ///
    /// Command errors are written to `writer` and do not end the session.
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();

        writer.write_all(PROMPT.as_bytes()).await?;
        writer.flush().await?;

        while let Some(line) = lines.next_line().await? {
            if !line.trim().is_empty() {
                debug!(line = line.as_str(), "shell command");

                let output = match line.parse::<ShellCommand>() {
                    Ok(ShellCommand::Quit) => break,
                    Ok(command) => self
                        .execute(command)
                        .unwrap_or_else(|e| format!("error: {}", e)),
                    Err(e) => format!("error: {}", e),
                };
                writer.write_all(output.as_bytes()).await?;
                writer.write_all(b"\n").await?;
            }

            writer.write_all(PROMPT.as_bytes()).await?;
            writer.flush().await?;
        }

        writer.flush().await?;
        Ok(())
    }
}

fn join_or(items: &[&str], empty: &str) -> String {
    if items.is_empty() {
        empty.to_string()
    } else {
        items.join(", ")
    }
}

pub async fn execute_shell(path: &Path) -> Result<()> {
    let config_manager = ConfigManager::new(path.to_path_buf())?;
    let config = config_manager.get_config().await;
    let cache = build_cache(&config)?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let sweeper = config
        .cache
        .sweep_interval()
        .map(|interval| cache.spawn_sweeper(interval, shutdown_rx));

    info!(
        config = %config_manager.config_path().display(),
        vnodes = cache.vnode_manager().vnode_count(),
        replication_count = cache.replication_count(),
        "shell ready"
    );

    let shell = Shell::new(cache)?;
    shell
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await?;

    // No receiver is left when the sweeper is disabled
    let _ = shutdown_tx.send(());
    if let Some(handle) = sweeper {
        handle.await?;
    }
    Ok(())
}
