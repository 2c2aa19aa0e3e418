//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api::{self, AppState, NodeJson, ValidationResponse};
use crate::config::{AppConfig, BackendKind};
use serde::Serialize;
use std::time::Instant;
use tangle_core::{
    Clock, Node, NodeId, NodeRepository, StorageBackend, SystemClock, Tangle, TangleError,
    WalkParams,
};

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(config: &AppConfig) -> Result<(), TangleError> {
    let tangle = open_tangle(config)?;
    let walk = config.walk.params();
    walk.validate()?;

    println!("Tangle Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", config.server.host);
    println!("  Port:     {}", config.server.port);
    println!("  Backend:  {}", tangle.store().name());
    println!("  Database: {:?}", config.storage.path);
    println!("  Walk:     alpha={} max_steps={}", walk.alpha, walk.max_steps);
    println!();
    println!("Endpoints:");
    println!("  POST /nodes                           - Admit a record");
    println!("  POST /nodes/approve                   - Approve existing records");
    println!("  GET  /nodes                           - List records");
    println!("  GET  /nodes/tips                      - List tips");
    println!("  GET  /nodes/highest-weight            - Most approved record");
    println!("  GET  /nodes/highest-cumulative-weight - Heaviest record");
    println!("  GET  /nodes/tip-selection             - MCMC tip selection");
    println!("  GET  /nodes/{{id}}                      - Fetch one record");
    println!("  GET  /sync/validate                   - Consistency report");
    println!("  POST /checkpoints                     - Create a checkpoint");
    println!("  GET  /checkpoints/latest              - Latest checkpoint");
    println!("  GET  /status                          - Graph status");
    println!("  GET  /health                          - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let state = AppState::new(tangle).with_walk_defaults(walk);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    api::run_server(&addr, state, &config.security).await
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show graph status.
pub fn cmd_status(config: &AppConfig, json_mode: bool) -> Result<(), TangleError> {
    let tangle = open_tangle(config)?;
    let node_count = tangle.node_count()?;
    let tip_count = tangle.tips()?.len();
    let latest = tangle.store().get_latest_checkpoint()?;

    if json_mode {
        return print_json(&serde_json::json!({
            "database": config.storage.path.to_string_lossy(),
            "backend": tangle.store().name(),
            "node_count": node_count,
            "tip_count": tip_count,
            "latest_checkpoint": latest.as_ref().map(|cp| cp.id.clone()),
        }));
    }

    println!("Tangle Status");
    println!("=============");
    println!("Database: {:?}", config.storage.path);
    println!("Backend:  {}", tangle.store().name());
    println!();
    println!("Nodes:      {}", node_count);
    println!("Tips:       {}", tip_count);
    match latest {
        Some(cp) => println!("Checkpoint: {} ({} nodes)", cp.id, cp.node_count),
        None => println!("Checkpoint: none"),
    }

    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new empty database.
pub fn cmd_init(config: &AppConfig, force: bool) -> Result<(), TangleError> {
    let path = &config.storage.path;

    if config.storage.backend == BackendKind::Memory {
        println!("Memory backend selected, nothing to initialize");
        return Ok(());
    }

    if path.exists() {
        if !force {
            return Err(TangleError::IoError(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(path).map_err(|e| {
            TangleError::IoError(format!("Cannot remove '{}': {}", path.display(), e))
        })?;
    }

    let tangle = open_tangle(config)?;
    if tangle.store().is_persistent() {
        println!("Initialized new redb database at {:?}", path);
    }
    Ok(())
}

// =============================================================================
// MUTATION COMMANDS
// =============================================================================

/// Admit a record with no parents.
pub fn cmd_add(config: &AppConfig, json_mode: bool, id: String) -> Result<(), TangleError> {
    let mut tangle = open_tangle(config)?;
    let node = tangle.add_node(NodeId::new(id))?;
    print_node("Added", &node, json_mode)
}

/// Admit a record approving `parents`.
pub fn cmd_approve(
    config: &AppConfig,
    json_mode: bool,
    id: String,
    parents: Vec<String>,
) -> Result<(), TangleError> {
    let mut tangle = open_tangle(config)?;
    let parents = parents.into_iter().map(NodeId::new).collect();
    let approval = tangle.approve_node(NodeId::new(id), parents)?;

    if json_mode {
        return print_json(&serde_json::json!({
            "node": NodeJson::from(&approval.node),
            "warnings": approval
                .warnings
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
        }));
    }

    print_node("Approved", &approval.node, false)?;
    for warning in &approval.warnings {
        println!("  warning: {}", warning);
    }
    Ok(())
}

/// Create a checkpoint.
pub fn cmd_checkpoint(config: &AppConfig, json_mode: bool, id: &str) -> Result<(), TangleError> {
    let mut tangle = open_tangle(config)?;
    let checkpoint = tangle.create_checkpoint(id)?;

    if json_mode {
        return print_json(&checkpoint);
    }

    println!("Checkpoint {} created", checkpoint.id);
    println!("  Nodes:     {}", checkpoint.node_count);
    println!("  Root hash: {}", checkpoint.root_hash);
    println!("  Timestamp: {}", checkpoint.timestamp);
    Ok(())
}

// =============================================================================
// QUERY COMMANDS
// =============================================================================

/// Show one record.
pub fn cmd_show(config: &AppConfig, json_mode: bool, id: String) -> Result<(), TangleError> {
    let tangle = open_tangle(config)?;
    let node = tangle.get_node(&NodeId::new(id))?;
    print_node("Node", &node, json_mode)
}

/// List every record, or only the tips.
pub fn cmd_list(config: &AppConfig, json_mode: bool, tips_only: bool) -> Result<(), TangleError> {
    let tangle = open_tangle(config)?;

    if tips_only {
        let tips = tangle.tips()?;
        if json_mode {
            let ids: Vec<String> = tips.iter().map(ToString::to_string).collect();
            return print_json(&ids);
        }
        println!("Tips ({}):", tips.len());
        for tip in &tips {
            println!("  {}", tip);
        }
        return Ok(());
    }

    let nodes = tangle.get_all_nodes()?;
    if json_mode {
        let nodes: Vec<NodeJson> = nodes.iter().map(NodeJson::from).collect();
        return print_json(&nodes);
    }

    println!("Nodes ({}):", nodes.len());
    for node in &nodes {
        println!(
            "  {:<24} weight={:<6} cumulative={:<8} parents=[{}]",
            node.id,
            node.weight,
            node.cumulative_weight,
            join_ids(&node.parents)
        );
    }
    Ok(())
}

/// Record with the highest direct or cumulative weight.
pub fn cmd_highest(
    config: &AppConfig,
    json_mode: bool,
    cumulative: bool,
) -> Result<(), TangleError> {
    let tangle = open_tangle(config)?;
    let node = if cumulative {
        tangle.highest_cumulative_weight_node()?
    } else {
        tangle.highest_weight_node()?
    };
    print_node("Highest", &node, json_mode)
}

/// Select a tip.
pub fn cmd_tip(
    config: &AppConfig,
    json_mode: bool,
    alpha: Option<f64>,
    max_steps: Option<usize>,
) -> Result<(), TangleError> {
    let mut tangle = open_tangle(config)?;
    let params = WalkParams::new(
        alpha.unwrap_or(config.walk.alpha),
        max_steps.unwrap_or(config.walk.max_steps),
    );
    let node = tangle.select_tip(params)?;
    print_node("Selected tip", &node, json_mode)
}

/// Recompute cumulative weights and report drift.
pub fn cmd_validate(config: &AppConfig, json_mode: bool) -> Result<(), TangleError> {
    let tangle = open_tangle(config)?;
    let validation_time = SystemClock.now_ms();
    let started = Instant::now();
    let report = tangle.validate_consistency()?;
    let duration_micros = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);

    if json_mode {
        return print_json(&ValidationResponse::from_report(
            &report,
            validation_time,
            duration_micros,
        ));
    }

    println!("Consistency Validation");
    println!("======================");
    println!("Status:      {:?}", report.status);
    println!("Total nodes: {}", report.total_nodes);
    println!("Valid nodes: {}", report.valid_nodes);
    println!(
        "Consistency: {}.{:04}%",
        report.consistency_millionths / 10_000,
        report.consistency_millionths % 10_000
    );
    println!("Duration:    {} us", duration_micros);

    if !report.mismatches.is_empty() {
        println!();
        println!("Inconsistencies:");
        for m in &report.mismatches {
            println!(
                "  {:<24} expected={:<8} actual={:<8} difference={}",
                m.node_id, m.expected, m.actual, m.difference
            );
        }
    }
    Ok(())
}

/// Show the most recent checkpoint.
pub fn cmd_latest_checkpoint(config: &AppConfig, json_mode: bool) -> Result<(), TangleError> {
    let tangle = open_tangle(config)?;
    let checkpoint = tangle.latest_checkpoint()?;

    if json_mode {
        return print_json(&checkpoint);
    }

    println!("Latest checkpoint: {}", checkpoint.id);
    println!("  Nodes:     {}", checkpoint.node_count);
    println!("  Root hash: {}", checkpoint.root_hash);
    println!("  Timestamp: {}", checkpoint.timestamp);
    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Open the engine over the configured backend.
pub fn open_tangle(config: &AppConfig) -> Result<Tangle<StorageBackend>, TangleError> {
    let store = match config.storage.backend {
        BackendKind::Redb => StorageBackend::redb(&config.storage.path)?,
        BackendKind::Memory => StorageBackend::default(),
    };

    let tangle = Tangle::new(store)?;
    Ok(match config.walk.seed {
        Some(seed) => tangle.with_seed(seed),
        None => tangle,
    })
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), TangleError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| TangleError::SerializationError(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

fn print_node(label: &str, node: &Node, json_mode: bool) -> Result<(), TangleError> {
    if json_mode {
        return print_json(&NodeJson::from(node));
    }

    println!("{}: {}", label, node.id);
    println!("  Weight:            {}", node.weight);
    println!("  Cumulative weight: {}", node.cumulative_weight);
    println!("  Parents:           [{}]", join_ids(&node.parents));
    println!("  Created at:        {}", node.created_at);
    Ok(())
}

fn join_ids(ids: &[NodeId]) -> String {
    ids.iter()
        .map(NodeId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.storage.backend = BackendKind::Memory;
        config
    }

    #[test]
    fn open_memory_backend() {
        let tangle = open_tangle(&memory_config()).expect("open");
        assert_eq!(tangle.store().name(), "memory");
        assert_eq!(tangle.node_count().expect("count"), 0);
    }

    #[test]
    fn redb_backend_persists_between_commands() {
        let temp = tempfile::tempdir().expect("temp dir");
        let mut config = AppConfig::default();
        config.storage.path = temp.path().join("cli.redb");

        cmd_init(&config, false).expect("init");
        cmd_add(&config, true, "genesis".to_string()).expect("add");
        cmd_approve(&config, true, "child".to_string(), vec!["genesis".to_string()])
            .expect("approve");
        cmd_checkpoint(&config, true, "cp-1").expect("checkpoint");

        let tangle = open_tangle(&config).expect("reopen");
        assert_eq!(tangle.node_count().expect("count"), 2);
        let genesis = tangle.get_node(&NodeId::new("genesis")).expect("genesis");
        assert_eq!(genesis.weight, 1);
        assert_eq!(tangle.latest_checkpoint().expect("checkpoint").id, "cp-1");
    }

    #[test]
    fn init_refuses_existing_database_without_force() {
        let temp = tempfile::tempdir().expect("temp dir");
        let mut config = AppConfig::default();
        config.storage.path = temp.path().join("cli.redb");

        cmd_init(&config, false).expect("first init");
        cmd_add(&config, true, "a".to_string()).expect("add");
        assert!(cmd_init(&config, false).is_err());

        cmd_init(&config, true).expect("forced init");
        let tangle = open_tangle(&config).expect("reopen");
        assert_eq!(tangle.node_count().expect("count"), 0);
    }

    #[test]
    fn join_ids_formats_parents() {
        let ids = vec![NodeId::new("a"), NodeId::new("b")];
        assert_eq!(join_ids(&ids), "a, b");
        assert_eq!(join_ids(&[]), "");
    }
}
