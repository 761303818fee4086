mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use rabt::prelude::*;

trait Ping: Send + Sync {}
trait Pong: Send + Sync {}

struct PingImpl {
    _pong: Arc<dyn Pong>,
}
struct PongImpl {
    _ping: Arc<dyn Ping>,
}

impl Ping for PingImpl {}
impl Pong for PongImpl {}

struct Config {
    url: String,
}

struct Connection {
    url: String,
}

#[test]
fn cycle_through_autowired_components_is_reported() {
    common::init_tracing();
    let index = MetadataIndex::builder()
        .component(
            Component::new(|r: &dyn Resolver| Ok(PingImpl { _pong: r.resolve()? }))
                .implements::<dyn Ping>(|it| it as Arc<dyn Ping>)
                .service::<dyn Ping>(LifetimeKind::Transient),
        )
        .component(
            Component::new(|r: &dyn Resolver| Ok(PongImpl { _ping: r.resolve()? }))
                .implements::<dyn Pong>(|it| it as Arc<dyn Pong>)
                .service::<dyn Pong>(LifetimeKind::Transient),
        )
        .build();
    let container = Container::builder().autowire(index).build().unwrap();

    match container.resolve::<dyn Ping>().err().unwrap() {
        RabtError::CircularDependency(e) => {
            assert_eq!(e.chain.len(), 3);
            assert_eq!(e.chain[0], TypeRef::of::<dyn Ping>());
            assert_eq!(e.chain[1], TypeRef::of::<dyn Pong>());
            assert_eq!(e.chain[2], TypeRef::of::<dyn Ping>());
        }
        other => panic!("Expected CircularDependency, got: {other:?}"),
    }
}

#[test]
fn singleton_is_built_once_across_threads() {
    common::init_tracing();
    let built = Arc::new(AtomicUsize::new(0));
    let counter = built.clone();
    let index = MetadataIndex::builder()
        .component(
            Component::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Config {
                    url: "postgres://localhost".to_string(),
                })
            })
            .self_service(LifetimeKind::Singleton),
        )
        .build();
    let container = Container::builder().autowire(index).build().unwrap();

    let container = &container;
    let configs: Vec<Arc<Config>> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| s.spawn(move || container.create_scope().resolve::<Config>().unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(built.load(Ordering::SeqCst), 1);
    assert!(configs.iter().all(|c| Arc::ptr_eq(c, &configs[0])));
}

#[test]
fn construction_errors_propagate_to_the_caller() {
    common::init_tracing();
    let index = MetadataIndex::builder()
        .component(
            Component::new(|r: &dyn Resolver| {
                let config: Arc<Config> = r.resolve()?;
                if config.url.is_empty() {
                    return Err(RabtError::construction(TypeRef::of::<Connection>(), "empty url"));
                }
                Ok(Connection { url: config.url.clone() })
            })
            .self_service(LifetimeKind::Transient),
        )
        .build();

    let empty = Container::builder()
        .seed(RegistrationDescriptor::instance(Arc::new(Config { url: String::new() })))
        .autowire(index.clone())
        .build()
        .unwrap();
    let err = empty.resolve::<Connection>().err().unwrap();
    assert!(err.to_string().contains("empty url"));

    let configured = Container::builder()
        .seed(RegistrationDescriptor::instance(Arc::new(Config {
            url: "postgres://db".to_string(),
        })))
        .autowire(index)
        .build()
        .unwrap();
    assert_eq!(configured.resolve::<Connection>().unwrap().url, "postgres://db");
}

#[test]
fn failed_scoped_construction_is_not_cached() {
    common::init_tracing();
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let index = MetadataIndex::builder()
        .component(
            Component::new(move |_| {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err(RabtError::construction(TypeRef::of::<Config>(), "warming up"));
                }
                Ok(Config { url: "ok".to_string() })
            })
            .self_service(LifetimeKind::Scoped),
        )
        .build();
    let container = Container::builder().autowire(index).build().unwrap();
    let scope = container.create_scope();

    assert!(scope.resolve::<Config>().is_err());
    let first = scope.resolve::<Config>().unwrap();
    let second = scope.resolve::<Config>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn missing_service_suggests_similar_names() {
    common::init_tracing();
    let index = MetadataIndex::builder()
        .component(Component::new(|_| Ok(Config { url: String::new() })).self_service(LifetimeKind::Singleton))
        .build();
    let container = Container::builder().autowire(index).build().unwrap();

    match container.resolve::<Connection>().err().unwrap() {
        RabtError::NotRegistered(e) => {
            assert_eq!(e.suggestions.len(), 1);
            assert!(e.suggestions[0].ends_with("Config"));
        }
        other => panic!("Expected NotRegistered, got: {other:?}"),
    }
}
