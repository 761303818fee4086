//! Decorated operation example.
//!
//! Run with `RUST_LOG=debug` to see the plan and decorator chain.

use std::sync::Arc;

use parking_lot::Mutex;
use rabt::prelude::*;
use tracing_subscriber::EnvFilter;

// === Services ===

trait Operation: Send + Sync {
    fn perform(&self, a: i32, b: i32) -> i32;
    fn name(&self) -> String;
}

struct BasicOperation;

impl Operation for BasicOperation {
    fn perform(&self, a: i32, b: i32) -> i32 {
        a + b
    }

    fn name(&self) -> String {
        "BasicOperation".to_string()
    }
}

#[derive(Default)]
struct OperationLog {
    entries: Mutex<Vec<String>>,
}

impl OperationLog {
    fn record(&self, entry: String) {
        println!("[LOG] {entry}");
        self.entries.lock().push(entry);
    }
}

// === Decorators ===

struct LoggingDecorator {
    inner: Arc<dyn Operation>,
    log: Arc<OperationLog>,
}

impl Operation for LoggingDecorator {
    fn perform(&self, a: i32, b: i32) -> i32 {
        self.log.record(format!("{}({a}, {b})", self.inner.name()));
        let result = self.inner.perform(a, b);
        self.log.record(format!("{} returned {result}", self.inner.name()));
        result
    }

    fn name(&self) -> String {
        format!("Logging({})", self.inner.name())
    }
}

struct CheckedDecorator {
    inner: Arc<dyn Operation>,
}

impl Operation for CheckedDecorator {
    fn perform(&self, a: i32, b: i32) -> i32 {
        a.checked_add(b).map_or(i32::MAX, |_| self.inner.perform(a, b))
    }

    fn name(&self) -> String {
        format!("Checked({})", self.inner.name())
    }
}

// === Declarations ===

struct OperationsProvider;

impl ComponentProvider for OperationsProvider {
    fn describe(&self, index: &mut MetadataIndexBuilder) {
        index
            .push(Component::new(|_| Ok(OperationLog::default())).self_service(LifetimeKind::Singleton))
            .push(
                Component::new(|_| Ok(BasicOperation))
                    .implements::<dyn Operation>(|it| it as Arc<dyn Operation>)
                    .service::<dyn Operation>(LifetimeKind::Scoped),
            )
            .push(
                Component::new(|r: &dyn Resolver| {
                    Ok(LoggingDecorator {
                        inner: r.resolve()?,
                        log: r.resolve()?,
                    })
                })
                .implements::<dyn Operation>(|it| it as Arc<dyn Operation>)
                .decorates::<dyn Operation>(0),
            )
            .push(
                Component::new(|r: &dyn Resolver| Ok(CheckedDecorator { inner: r.resolve()? }))
                    .implements::<dyn Operation>(|it| it as Arc<dyn Operation>)
                    .decorates::<dyn Operation>(1),
            );
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let index = MetadataIndex::builder().add_provider(&OperationsProvider).build();
    let plan = Autowiring::new(&index).build_plan()?;
    println!("Registration plan:\n{plan}");

    let container = Container::build(plan)?;
    let scope = container.create_scope();

    let operation: Arc<dyn Operation> = scope.resolve()?;
    println!("Resolved {}", operation.name());
    println!("5 + 7 = {}", operation.perform(5, 7));
    println!("MAX + 1 = {}", operation.perform(i32::MAX, 1));

    let log: Arc<OperationLog> = scope.resolve()?;
    println!("{} log entries", log.entries.lock().len());

    Ok(())
}
