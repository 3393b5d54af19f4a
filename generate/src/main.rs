#![cfg_attr(test, allow(clippy::disallowed_methods))]
// Forbid unwrap() in production code to prevent panics on bad input.
// Test code is allowed to use unwrap() for convenience.
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
use std::sync::Arc;

use generate::functions::{PERIODIC, RANGE};
use generate::output::{GenerateTemplate, LineSink, TemplateTerm};
use generate::{
    BindStage, BlankNodeScope, EngineConfig, ExecutionContext, Expression, IteratorStage, Pipeline,
    Value, Variable, run,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const EX: &str = "http://example.org/";

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "generate=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration from environment variables
    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        "Loaded configuration: contribution_buffer={}, ordered_rounds={}, max_nesting_depth={}, source_directory={}",
        config.contribution_buffer,
        config.ordered_rounds,
        config.max_nesting_depth,
        config.source_directory.display()
    );

    let mode = std::env::args().nth(1).unwrap_or_else(|| "double".to_owned());
    let pipeline = match mode.as_str() {
        "double" => double_pipeline(),
        "periodic" => periodic_pipeline(),
        other => {
            tracing::error!("Unknown mode '{other}', expected 'double' or 'periodic'");
            std::process::exit(2);
        }
    };

    let context = ExecutionContext::new(tokio::runtime::Handle::current(), config);
    let sink = Arc::new(LineSink::new(std::io::stdout()));
    let handle = match run(
        Arc::new(pipeline),
        Vec::new(),
        BlankNodeScope::new(),
        sink,
        context,
    ) {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!("Invalid pipeline: {e}");
            std::process::exit(1);
        }
    };

    let cancel = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling");
            cancel.cancel();
        }
    });

    match handle.wait().await {
        Ok(summary) => tracing::info!(
            "done: {} rows, {} facts, {} rounds",
            summary.bindings_materialized,
            summary.facts_emitted,
            summary.rounds
        ),
        Err(e) if e.is_cancelled() => tracing::info!("stopped"),
        Err(e) => {
            tracing::error!("Run failed: {e}");
            std::process::exit(1);
        }
    }
}

/// `?x` in 1..4, `?y = ?x * 2`, one keyed blank node per `?x`.
fn double_pipeline() -> Pipeline {
    Pipeline::new("double")
        .stage(IteratorStage::new(
            vec![Variable::new("x")],
            RANGE,
            vec![
                Expression::constant(Value::integer(1)),
                Expression::constant(Value::integer(4)),
            ],
        ))
        .stage(BindStage::new(
            Variable::new("y"),
            Expression::multiply(Expression::var("x"), Expression::constant(Value::integer(2))),
        ))
        .template(GenerateTemplate::new().triple(
            TemplateTerm::keyed_blank("n", &["x"]),
            TemplateTerm::iri(format!("{EX}double")),
            TemplateTerm::var("y"),
        ))
}

/// One fact per second until interrupted.
fn periodic_pipeline() -> Pipeline {
    Pipeline::new("periodic")
        .stage(IteratorStage::new(
            vec![Variable::new("tick")],
            PERIODIC,
            vec![Expression::constant(Value::integer(1000))],
        ))
        .stage(BindStage::new(
            Variable::new("label"),
            Expression::concat(vec![
                Expression::constant(Value::string("tick ")),
                Expression::var("tick"),
            ]),
        ))
        .template(
            GenerateTemplate::new()
                .triple(
                    TemplateTerm::row_blank("event"),
                    TemplateTerm::iri(format!("{EX}count")),
                    TemplateTerm::var("tick"),
                )
                .triple(
                    TemplateTerm::row_blank("event"),
                    TemplateTerm::iri(format!("{EX}label")),
                    TemplateTerm::var("label"),
                ),
        )
}
