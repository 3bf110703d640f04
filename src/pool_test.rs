use super::*;

fn rect_pool(registry: &mut PoolRegistry, canvas_id: &str, size: usize) -> PoolKey {
    registry.initialize(canvas_id, &PoolConfig::of_kind("rect", size));
    PoolKey::new(canvas_id, "rect")
}

#[test]
fn key_display_joins_canvas_and_type() {
    assert_eq!(PoolKey::new("c1", "rect").to_string(), "c1:rect");
}

#[test]
fn initialize_prepopulates_pool() {
    let mut registry = PoolRegistry::new();
    let key = rect_pool(&mut registry, "c1", 3);

    let stats = registry.stats(&key).unwrap();
    assert_eq!(stats.available, 3);
    assert_eq!(stats.active, 0);
}

#[test]
fn initialize_is_idempotent() {
    let mut registry = PoolRegistry::new();
    let key = rect_pool(&mut registry, "c1", 2);
    let held = registry.acquire(&key).unwrap();

    assert!(!registry.initialize("c1", &PoolConfig::of_kind("rect", 10)));

    let stats = registry.stats(&key).unwrap();
    assert_eq!(stats.available, 1);
    assert_eq!(stats.active, 1);
    assert!(registry.is_active(&key, &held.id));
}

#[test]
fn factory_output_is_used() {
    let mut registry = PoolRegistry::new();
    let config = PoolConfig::new("text", 1, || {
        CanvasObject::new("text").with_props(serde_json::json!({"text": "label"}))
    });
    registry.initialize("c1", &config);

    let obj = registry.acquire(&PoolKey::new("c1", "text")).unwrap();
    assert_eq!(obj.props["text"], "label");
}

#[test]
fn acquire_moves_object_from_free_to_active() {
    let mut registry = PoolRegistry::new();
    let key = rect_pool(&mut registry, "c1", 2);

    let obj = registry.acquire(&key).unwrap();

    assert!(registry.is_active(&key, &obj.id));
    assert!(!registry.is_parked(&key, &obj.id));
}

#[test]
fn acquire_exhausts_after_initial_size() {
    let mut registry = PoolRegistry::new();
    let key = rect_pool(&mut registry, "c1", 2);

    assert!(registry.acquire(&key).is_some());
    assert!(registry.acquire(&key).is_some());
    assert!(registry.acquire(&key).is_none());

    let stats = registry.stats(&key).unwrap();
    assert_eq!(stats.acquired, 2);
    assert_eq!(stats.misses, 1);
}

#[test]
fn acquire_unknown_pool_is_none_without_miss() {
    let mut registry = PoolRegistry::new();
    let key = PoolKey::new("c1", "rect");
    assert!(registry.acquire(&key).is_none());
    assert!(registry.stats(&key).is_none());
}

#[test]
fn release_then_acquire_is_lifo() {
    let mut registry = PoolRegistry::new();
    let key = rect_pool(&mut registry, "c1", 3);

    let obj = registry.acquire(&key).unwrap();
    let id = obj.id;
    registry.release(&key, obj).unwrap();

    let again = registry.acquire(&key).unwrap();
    assert_eq!(again.id, id);
}

#[test]
fn release_resets_transform_and_parks() {
    let mut registry = PoolRegistry::new();
    let key = rect_pool(&mut registry, "c1", 1);

    let mut obj = registry.acquire(&key).unwrap();
    obj.x = 300.0;
    obj.rotation = 90.0;
    obj.opacity = 0.1;
    let id = obj.id;
    registry.release(&key, obj).unwrap();

    assert!(registry.is_parked(&key, &id));
    assert!(!registry.is_active(&key, &id));
    let back = registry.acquire(&key).unwrap();
    assert!(back.has_default_transform());
    assert_eq!(registry.stats(&key).unwrap().released, 1);
}

#[test]
fn release_foreign_object_is_rejected() {
    let mut registry = PoolRegistry::new();
    let key = rect_pool(&mut registry, "c1", 1);
    let stranger = CanvasObject::new("rect");
    let stranger_id = stranger.id;

    let err = registry.release(&key, stranger).unwrap_err();

    assert_eq!(err, ReleaseError::NotActive { key: key.clone(), object_id: stranger_id });
    assert_eq!(registry.stats(&key).unwrap().available, 1);
}

#[test]
fn release_to_unknown_pool_is_rejected() {
    let mut registry = PoolRegistry::new();
    let key = PoolKey::new("c1", "rect");
    let err = registry.release(&key, CanvasObject::new("rect")).unwrap_err();
    assert_eq!(err, ReleaseError::UnknownPool(key));
}

#[test]
fn grow_adds_objects_from_factory() {
    let mut registry = PoolRegistry::new();
    let key = rect_pool(&mut registry, "c1", 0);

    assert_eq!(registry.grow(&key, 4), Some(4));
    assert_eq!(registry.stats(&key).unwrap().available, 4);
    assert_eq!(registry.grow(&PoolKey::new("c1", "line"), 4), None);
}

#[test]
fn forget_active_only_touches_that_canvas() {
    let mut registry = PoolRegistry::new();
    let key = rect_pool(&mut registry, "c1", 1);
    let obj = registry.acquire(&key).unwrap();

    assert!(!registry.forget_active("c2", &obj.id));
    assert!(registry.is_active(&key, &obj.id));

    assert!(registry.forget_active("c1", &obj.id));
    assert!(!registry.is_active(&key, &obj.id));
}

#[test]
fn remove_canvas_matches_exact_canvas_id() {
    let mut registry = PoolRegistry::new();
    rect_pool(&mut registry, "c1", 1);
    registry.initialize("c1", &PoolConfig::of_kind("ellipse", 1));
    let neighbour = rect_pool(&mut registry, "c10", 1);

    assert_eq!(registry.remove_canvas("c1"), 2);

    assert!(!registry.contains(&PoolKey::new("c1", "rect")));
    assert!(registry.contains(&neighbour));
}

#[test]
fn totals_sum_free_and_active() {
    let mut registry = PoolRegistry::new();
    let a = rect_pool(&mut registry, "c1", 3);
    rect_pool(&mut registry, "c2", 2);
    registry.acquire(&a).unwrap();

    assert_eq!(registry.totals(), (4, 1));
    assert_eq!(registry.canvas_totals("c1"), (1, 2, 1));
    assert_eq!(registry.canvas_totals("missing"), (0, 0, 0));
}
