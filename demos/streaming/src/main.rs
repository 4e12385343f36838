use anyhow::{Context, Result};
use helix::config::{HelixConfig, MemoryConfig};
use helix::init_logging;
use helix::protocol::TracePayload;
use helix::{AnalysisRequest, HelixEngine};
use helix_test_utils::{HashEmbedder, ScriptedReasoner};
use std::io::{self, Write};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let query = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "How did expression change across samples?".to_string());

    let config = HelixConfig::builder()
        .memory(MemoryConfig {
            path: Some(".helix/memory".to_string()),
            index_path: Some(".helix/index.json".to_string()),
            ..MemoryConfig::default()
        })
        .build();

    // Deterministic fakes stand in for real model backends so the demo
    // runs offline.
    let reasoner = ScriptedReasoner::default()
        .with_thinking(vec![
            "Scanning session memory for related results".to_string(),
            "Comparing expression levels across samples".to_string(),
        ])
        .with_answer(
            "Expression roughly doubled between samples.\n```chart\n{\"type\":\"bar\",\"title\":\"Expression by sample\",\"data\":{\"labels\":[\"S1\",\"S2\"],\"values\":[12,25]}}\n```",
        );
    let engine = HelixEngine::new(
        config,
        Arc::new(HashEmbedder::default()),
        Arc::new(reasoner),
    )
    .context("failed to build engine")?;

    let mut stream = engine
        .analyze_stream(AnalysisRequest::query(query))
        .context("failed to start analysis")?;
    println!("session: {}", stream.session_id());
    println!("--- streaming ---");

    while let Some(event) = stream.next_event().await {
        match event.payload {
            TracePayload::Thinking(step) => {
                println!("[thinking] {step}");
            }
            TracePayload::Response(fragment) => {
                if let Err(err) = io::stdout().write_all(fragment.as_bytes()) {
                    eprintln!("failed to write fragment: {err}");
                }
                if let Err(err) = io::stdout().flush() {
                    eprintln!("failed to flush stdout: {err}");
                }
            }
            TracePayload::Chart(spec) => {
                println!(
                    "\n[chart] {} ({})",
                    spec.title,
                    serde_json::to_string(&spec.data).unwrap_or_default()
                );
            }
            TracePayload::Complete(info) => {
                if let Some(warning) = info.warning {
                    eprintln!("\nwarning: {warning}");
                }
                break;
            }
            TracePayload::Error(info) => {
                eprintln!("\nanalysis failed ({}): {}", info.code, info.message);
                break;
            }
        }
    }

    let result = stream.finish().await?;
    println!("\n--- done ---");
    println!(
        "charts: {}, context records used: {}",
        result.chart_specs.len(),
        result.memory_context_used.len()
    );

    Ok(())
}
