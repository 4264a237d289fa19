//! Node Configuration
//!
//! Startup parameters of one mesh node, read from command-line flags with environment
//! fallbacks. The partition map itself lives in the topology document named by
//! `--topology`.

use crate::state::{StateLayout, state_file_name};
use crate::table::table_file_name;
use crate::topology::NodeName;

use anyhow::{Context, bail};
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_TOPOLOGY_PATH: &str = "config.json";
pub const DEFAULT_DATA_DIR: &str = ".";

pub const USAGE: &str = "Usage: record_mesh --node <id> --bind <addr:port> \
[--user <id>] [--topology <path>] [--data-dir <dir>] [--columns <n>] \
[--history-capacity <n>] [--routed-capacity <n>] [--max-destinations <n>]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    pub node_id: NodeName,
    /// Names the durable state file. Defaults to the node id.
    pub user_id: String,
    pub bind_addr: SocketAddr,
    pub topology_path: PathBuf,
    pub data_dir: PathBuf,
    pub table_columns: usize,
    pub history_capacity: u64,
    pub routed_capacity: u64,
    pub max_destinations: u64,
}

impl NodeConfig {
    /// Parses process arguments (including the program name) and `MESH_*` variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let args: Vec<String> = std::env::args().collect();
        Self::parse(&args, |key| std::env::var(key).ok())
    }

    pub fn parse(
        args: &[String],
        env: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let mut node_id = env("MESH_NODE");
        let mut user_id = None;
        let mut bind_addr = env("MESH_BIND");
        let mut topology_path = env("MESH_TOPOLOGY");
        let mut data_dir = env("MESH_DATA_DIR");
        let mut table_columns = crate::table::local::DEFAULT_COLUMNS;
        let mut layout = StateLayout::default();

        let mut i = 1;
        while i < args.len() {
            let flag = args[i].as_str();
            let value = || {
                args.get(i + 1)
                    .cloned()
                    .with_context(|| format!("{} requires a value", flag))
            };
            match flag {
                "--node" => node_id = Some(value()?),
                "--user" => user_id = Some(value()?),
                "--bind" => bind_addr = Some(value()?),
                "--topology" => topology_path = Some(value()?),
                "--data-dir" => data_dir = Some(value()?),
                "--columns" => table_columns = parse_number(flag, &value()?)?,
                "--history-capacity" => layout.history_capacity = parse_number(flag, &value()?)?,
                "--routed-capacity" => layout.routed_capacity = parse_number(flag, &value()?)?,
                "--max-destinations" => layout.max_destinations = parse_number(flag, &value()?)?,
                _ => {
                    tracing::warn!("Ignoring unknown argument {}", flag);
                    i += 1;
                    continue;
                }
            }
            i += 2;
        }

        let Some(node_id) = node_id.filter(|id| !id.trim().is_empty()) else {
            bail!("--node (or MESH_NODE) is required\n{}", USAGE);
        };
        let Some(bind_addr) = bind_addr else {
            bail!("--bind (or MESH_BIND) is required\n{}", USAGE);
        };
        let bind_addr: SocketAddr = bind_addr
            .parse()
            .with_context(|| format!("invalid bind address {:?}", bind_addr))?;

        if table_columns == 0 {
            bail!("--columns must be at least 1");
        }
        layout
            .validate()
            .context("invalid state file capacities")?;

        Ok(Self {
            user_id: user_id.unwrap_or_else(|| node_id.clone()),
            node_id: NodeName::new(node_id),
            bind_addr,
            topology_path: PathBuf::from(
                topology_path.unwrap_or_else(|| DEFAULT_TOPOLOGY_PATH.to_string()),
            ),
            data_dir: PathBuf::from(data_dir.unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())),
            table_columns,
            history_capacity: layout.history_capacity,
            routed_capacity: layout.routed_capacity,
            max_destinations: layout.max_destinations,
        })
    }

    pub fn layout(&self) -> StateLayout {
        StateLayout {
            history_capacity: self.history_capacity,
            routed_capacity: self.routed_capacity,
            max_destinations: self.max_destinations,
        }
    }

    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join(state_file_name(&self.user_id))
    }

    pub fn table_path(&self) -> PathBuf {
        self.data_dir.join(table_file_name(self.node_id.as_str()))
    }
}

fn parse_number<T: std::str::FromStr>(flag: &str, value: &str) -> anyhow::Result<T> {
    match value.parse() {
        Ok(n) => Ok(n),
        Err(_) => bail!("{} expects a number, got {:?}", flag, value),
    }
}
