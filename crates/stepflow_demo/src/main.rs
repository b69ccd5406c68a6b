//! Order pipeline demo CLI.
//!
//! Builds and validates the order-processing workflow, logs every statically
//! known vertex, then previews how a sample order would fan out and route.
//!
//! # Usage
//!
//! ```bash
//! stepflow-demo [pretty|compact|json]
//! ```
//!
//! `RUST_LOG` narrows or widens the output, for example
//! `RUST_LOG=stepflow_dag=debug stepflow-demo compact`.

use std::process::ExitCode;

use stepflow_demo::telemetry::{TracingConfig, TracingFormat};
use stepflow_demo::{DemoError, Line, Order, build_order_pipeline};

fn sample_order() -> Order {
    Order::new(
        "ORD-1042",
        vec![
            Line {
                sku: "desk-lamp".to_string(),
                quantity: 2,
                unit_cents: 3_450,
            },
            Line {
                sku: "notebook".to_string(),
                quantity: 5,
                unit_cents: 899,
            },
        ],
    )
}

fn run() -> Result<(), DemoError> {
    let pipeline = build_order_pipeline()?;

    for id in pipeline.static_ids()? {
        tracing::info!(vertex = %id, "static vertex");
    }

    let order = sample_order();
    let preview = pipeline.preview(&order)?;
    for id in &preview.fulfilment_ids {
        tracing::info!(vertex = %id, "fulfilment instance");
    }
    tracing::info!(
        order = %order.id,
        total_cents = preview.total_cents,
        routes = ?preview.routes,
        "order preview complete"
    );
    Ok(())
}

fn main() -> ExitCode {
    let format = match std::env::args().nth(1) {
        Some(arg) => match arg.parse::<TracingFormat>() {
            Ok(format) => format,
            Err(err) => {
                TracingConfig::new().init();
                tracing::error!(%err, "invalid arguments");
                return ExitCode::FAILURE;
            }
        },
        None => TracingFormat::default(),
    };
    TracingConfig::new().with_format(format).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "order pipeline failed");
            ExitCode::FAILURE
        }
    }
}
