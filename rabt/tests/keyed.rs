mod common;

use std::sync::Arc;

use rabt::prelude::*;

trait Store: Send + Sync {
    fn location(&self) -> &'static str;
}

struct DiskStore;
struct MemoryStore;

impl Store for DiskStore {
    fn location(&self) -> &'static str {
        "disk"
    }
}

impl Store for MemoryStore {
    fn location(&self) -> &'static str {
        "memory"
    }
}

fn disk() -> Component<DiskStore> {
    Component::new(|_| Ok(DiskStore)).implements::<dyn Store>(|it| it as Arc<dyn Store>)
}

fn memory() -> Component<MemoryStore> {
    Component::new(|_| Ok(MemoryStore)).implements::<dyn Store>(|it| it as Arc<dyn Store>)
}

#[test]
fn keyed_services_resolve_by_key() {
    common::init_tracing();
    let index = MetadataIndex::builder()
        .component(disk().keyed::<dyn Store>("primary", LifetimeKind::Singleton))
        .component(memory().keyed::<dyn Store>(2i64, LifetimeKind::Transient))
        .build();
    let container = Container::builder().autowire(index).build().unwrap();

    let primary = container.resolve_keyed::<dyn Store>("primary").unwrap();
    assert_eq!(primary.location(), "disk");
    assert!(Arc::ptr_eq(&primary, &container.resolve_keyed::<dyn Store>("primary").unwrap()));

    let second = container.resolve_keyed::<dyn Store>(2i64).unwrap();
    assert_eq!(second.location(), "memory");
    assert!(!Arc::ptr_eq(&second, &container.resolve_keyed::<dyn Store>(2i64).unwrap()));
}

#[test]
fn keyed_registration_is_invisible_to_unkeyed_resolution() {
    common::init_tracing();
    let index = MetadataIndex::builder()
        .component(disk().keyed::<dyn Store>("primary", LifetimeKind::Singleton))
        .build();
    let container = Container::builder().autowire(index).build().unwrap();

    assert!(matches!(
        container.resolve::<dyn Store>().err().unwrap(),
        RabtError::NotRegistered(_)
    ));
    assert!(container.resolve_all::<dyn Store>().unwrap().is_empty());
}

#[test]
fn unknown_key_reports_the_key() {
    common::init_tracing();
    let index = MetadataIndex::builder()
        .component(disk().keyed::<dyn Store>("primary", LifetimeKind::Singleton))
        .build();
    let container = Container::builder().autowire(index).build().unwrap();

    let err = container.resolve_keyed::<dyn Store>("backup").err().unwrap();
    assert!(err.to_string().contains("key=\"backup\""));
}

#[test]
fn keyed_and_plain_registrations_coexist() {
    common::init_tracing();
    let index = MetadataIndex::builder()
        .component(
            memory()
                .service::<dyn Store>(LifetimeKind::Singleton)
                .keyed::<dyn Store>("cache", LifetimeKind::Singleton),
        )
        .component(disk().keyed::<dyn Store>("primary", LifetimeKind::Scoped))
        .build();
    let container = Container::builder().autowire(index).build().unwrap();

    let plain = container.resolve::<dyn Store>().unwrap();
    let cached = container.resolve_keyed::<dyn Store>("cache").unwrap();
    assert_eq!(plain.location(), "memory");
    assert!(!Arc::ptr_eq(&plain, &cached));

    let scope = container.create_scope();
    let a = scope.resolve_keyed::<dyn Store>("primary").unwrap();
    let b = scope.resolve_keyed::<dyn Store>("primary").unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn duplicate_key_fails_the_build() {
    common::init_tracing();
    let index = MetadataIndex::builder()
        .component(disk().keyed::<dyn Store>("primary", LifetimeKind::Singleton))
        .component(memory().keyed::<dyn Store>("primary", LifetimeKind::Singleton))
        .build();

    match Container::builder().autowire(index).build().unwrap_err() {
        RabtError::DuplicateKey(e) => {
            assert_eq!(e.key, ServiceKey::from("primary"));
            assert_eq!(e.first, TypeRef::of::<DiskStore>());
            assert_eq!(e.second, TypeRef::of::<MemoryStore>());
        }
        other => panic!("Expected DuplicateKey, got: {other:?}"),
    }
}

#[test]
fn seeded_key_collides_with_autowired_key() {
    common::init_tracing();
    let index = MetadataIndex::builder()
        .component(disk().keyed::<dyn Store>("primary", LifetimeKind::Singleton))
        .build();

    let result = Container::builder()
        .seed_keyed("primary", RegistrationDescriptor::instance::<dyn Store>(Arc::new(MemoryStore)))
        .autowire(index)
        .build();
    assert!(matches!(result.unwrap_err(), RabtError::DuplicateKey(_)));
}

#[test]
fn same_key_on_different_services_is_allowed() {
    common::init_tracing();
    let index = MetadataIndex::builder()
        .component(disk().keyed::<dyn Store>("primary", LifetimeKind::Singleton))
        .component(disk().keyed_self("primary", LifetimeKind::Singleton))
        .build();
    let container = Container::builder().autowire(index).build().unwrap();

    assert_eq!(container.resolve_keyed::<dyn Store>("primary").unwrap().location(), "disk");
    assert!(container.resolve_keyed::<DiskStore>("primary").is_ok());
}

#[test]
fn keyed_bindings_reject_deduplicating_lifetimes() {
    common::init_tracing();
    let index = MetadataIndex::builder()
        .component(disk().keyed::<dyn Store>("primary", LifetimeKind::TryAddSingleton))
        .build();

    match Container::builder().autowire(index).build().unwrap_err() {
        RabtError::UnsupportedLifetime(e) => assert_eq!(e.tag, "TryAddSingleton"),
        other => panic!("Expected UnsupportedLifetime, got: {other:?}"),
    }
}

#[test]
fn keyed_services_can_be_switched_off() {
    common::init_tracing();
    let index = MetadataIndex::builder()
        .component(disk().keyed::<dyn Store>("primary", LifetimeKind::Singleton))
        .build();
    let settings = AutowiringSettings {
        keyed_services: false,
        ..AutowiringSettings::default()
    };
    let container = Container::builder().settings(settings).autowire(index).build().unwrap();

    assert!(container.is_empty());
}
