//! Library-level tests for the cost rollup and the order state machine

use ferp::core::{
    allowed_transitions, compute_breakdown, compute_breakdown_with, CostError, CreateOrder,
    ManufacturingOrderStateMachine, MemoryStore, MoAction, MoError, MoWorkflowConfig, Store,
    StoreError,
};
use ferp::entities::{BillOfMaterials, ManufacturingOrder, Material, MoState, MoStatus};
use rust_decimal::Decimal;

fn material(name: &str, cost: i64) -> Material {
    Material::new(name.to_string(), Decimal::from(cost), "test".to_string())
}

/// Gyoza <- (Dough <- Flour, Water) + Meat
struct Catalog {
    store: MemoryStore,
    gyoza: Material,
    dough: Material,
    flour: Material,
    meat: Material,
    top: BillOfMaterials,
    dough_bom: BillOfMaterials,
}

fn catalog() -> Catalog {
    let gyoza = material("Gyoza", 9000);
    let dough = material("Dough", 0);
    let flour = material("Flour", 10000);
    let water = material("Water", 0);
    let meat = material("Minced chicken", 40000);

    let dough_bom = BillOfMaterials::new(dough.id.to_string(), "test".to_string())
        .with_component(flour.id.to_string(), 0.8)
        .with_component(water.id.to_string(), 0.2);
    let top = BillOfMaterials::new(gyoza.id.to_string(), "test".to_string())
        .with_component(dough.id.to_string(), 0.5)
        .with_component(meat.id.to_string(), 0.25);

    let store = MemoryStore::new()
        .with_material(gyoza.clone())
        .with_material(dough.clone())
        .with_material(flour.clone())
        .with_material(water)
        .with_material(meat.clone())
        .with_bom(dough_bom.clone())
        .with_bom(top.clone());

    Catalog {
        store,
        gyoza,
        dough,
        flour,
        meat,
        top,
        dough_bom,
    }
}

// ============================================================================
// Cost rollup
// ============================================================================

#[test]
fn test_nested_rollup_uses_sub_bom_cost() {
    let c = catalog();
    let breakdown = compute_breakdown_with(&c.store, &c.top, 10.0).unwrap();

    let dough_line = &breakdown.components[0];
    assert_eq!(dough_line.material_id, c.dough.id.to_string());
    assert_eq!(dough_line.component_unit_cost, Decimal::from(8000));
    assert!((dough_line.scaled_qty - 5.0).abs() < 1e-9);

    let sub = dough_line.sub_breakdown.as_ref().unwrap();
    assert_eq!(sub.bom_id, c.dough_bom.id.to_string());
    assert!((sub.components[0].scaled_qty - 4.0).abs() < 1e-9);

    assert_eq!(breakdown.boms_unit_cost, Decimal::from(14000));
    assert_eq!(breakdown.boms_cost, Decimal::from(140000));
    // Catalog cost is reported alongside, not reconciled
    assert_eq!(breakdown.product_total_cost, Decimal::from(90000));
    assert_eq!(breakdown.flatten().len(), 4);
}

#[test]
fn test_scaling_is_linear_at_every_level() {
    let c = catalog();
    let one = compute_breakdown_with(&c.store, &c.top, 1.0).unwrap();

    for qty in [0.001, 0.3, 7.0, 12.5, 1000.0] {
        let scaled = compute_breakdown_with(&c.store, &c.top, qty).unwrap();
        for ((_, base), (_, line)) in one.flatten().into_iter().zip(scaled.flatten()) {
            assert_eq!(base.material_id, line.material_id);
            let expected = base.scaled_qty * qty;
            assert!(
                (line.scaled_qty - expected).abs() <= 1e-9 * expected.max(1.0),
                "{} at qty {}: {} != {}",
                line.name,
                qty,
                line.scaled_qty,
                expected
            );
        }
    }
}

#[test]
fn test_rollup_is_idempotent() {
    let c = catalog();
    let first = compute_breakdown_with(&c.store, &c.top, 3.0).unwrap();
    let second = compute_breakdown_with(&c.store, &c.top, 3.0).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_cycle_is_detected() {
    let a = material("A", 1);
    let b = material("B", 1);
    let bom_a = BillOfMaterials::new(a.id.to_string(), "test".to_string())
        .with_component(b.id.to_string(), 1.0);
    let bom_b = BillOfMaterials::new(b.id.to_string(), "test".to_string())
        .with_component(a.id.to_string(), 1.0);
    let store = MemoryStore::new()
        .with_material(a.clone())
        .with_material(b.clone())
        .with_bom(bom_a.clone())
        .with_bom(bom_b);

    match compute_breakdown_with(&store, &bom_a, 1.0) {
        Err(CostError::CyclicBomReference { path }) => {
            assert_eq!(
                path,
                vec![a.id.to_string(), b.id.to_string(), a.id.to_string()]
            );
        }
        other => panic!("expected cycle, got {:?}", other),
    }
}

#[test]
fn test_self_reference_is_a_cycle() {
    let a = material("A", 1);
    let bom = BillOfMaterials::new(a.id.to_string(), "test".to_string())
        .with_component(a.id.to_string(), 2.0);
    let store = MemoryStore::new().with_material(a).with_bom(bom.clone());

    assert!(matches!(
        compute_breakdown_with(&store, &bom, 1.0),
        Err(CostError::CyclicBomReference { .. })
    ));
}

#[test]
fn test_shared_sub_bom_is_not_a_cycle() {
    // The same sub-assembly on two branches is a diamond, not a loop
    let c = catalog();
    let combo = material("Combo pack", 0);
    let bom = BillOfMaterials::new(combo.id.to_string(), "test".to_string())
        .with_component(c.dough.id.to_string(), 1.0)
        .with_component(c.gyoza.id.to_string(), 2.0);
    c.store.insert_material(combo);

    let breakdown = compute_breakdown_with(&c.store, &bom, 1.0).unwrap();
    assert_eq!(breakdown.components.len(), 2);
}

#[test]
fn test_collaborator_errors_propagate() {
    let c = catalog();
    let result = compute_breakdown(
        &c.top,
        1.0,
        |_| {
            Err(StoreError::NotFound {
                kind: "Bill of materials",
                id: "BOM-OFFLINE".to_string(),
            })
        },
        |id| c.store.fetch_material(id),
    );
    match result {
        Err(CostError::Store(StoreError::NotFound { id, .. })) => assert_eq!(id, "BOM-OFFLINE"),
        other => panic!("expected store error, got {:?}", other),
    }
}

// ============================================================================
// Manufacturing orders
// ============================================================================

fn new_order(c: &Catalog, qty: f64) -> ManufacturingOrder {
    ManufacturingOrderStateMachine::new(&c.store, MoWorkflowConfig::default())
        .create_and_persist(CreateOrder {
            product_id: c.gyoza.id.to_string(),
            bom_id: c.top.id.to_string(),
            qty,
            reference: None,
            author: "test".to_string(),
        })
        .unwrap()
}

#[test]
fn test_order_components_are_first_level_lines() {
    let c = catalog();
    let order = new_order(&c, 10.0);

    let ids: Vec<&str> = order.components.iter().map(|l| l.material_id.as_str()).collect();
    assert_eq!(ids, vec![c.dough.id.to_string(), c.meat.id.to_string()]);
    assert!(!ids.contains(&c.flour.id.to_string().as_str()));
    assert!((order.components[1].required_qty - 2.5).abs() < 1e-9);
}

#[test]
fn test_advance_is_monotonic_and_stops_at_done() {
    let c = catalog();
    let sm = ManufacturingOrderStateMachine::new(&c.store, MoWorkflowConfig::default());
    let id = new_order(&c, 1.0).id.to_string();

    let mut last = MoState::Draft;
    for _ in 0..4 {
        let order = sm.transition(&id, MoAction::Advance).unwrap();
        assert!(order.state > last);
        assert_eq!(Some(order.state), last.next());
        last = order.state;
    }
    assert_eq!(last, MoState::Done);

    assert!(matches!(
        sm.transition(&id, MoAction::Advance),
        Err(MoError::AlreadyDone(_))
    ));
    let stored = c.store.fetch_manufacturing_order(&id).unwrap();
    assert_eq!(stored.state, MoState::Done);
    assert!(allowed_transitions(&stored).is_empty());
}

#[test]
fn test_cancel_from_confirmed() {
    let c = catalog();
    let sm = ManufacturingOrderStateMachine::new(&c.store, MoWorkflowConfig::default());
    let id = new_order(&c, 1.0).id.to_string();

    sm.transition(&id, MoAction::Advance).unwrap();
    let cancelled = sm.transition(&id, MoAction::Cancel).unwrap();
    assert_eq!(cancelled.state, MoState::Confirmed);
    assert_eq!(cancelled.status, MoStatus::Failed);

    for action in [MoAction::Advance, MoAction::Cancel] {
        assert!(matches!(
            sm.transition(&id, action),
            Err(MoError::OrderCancelled(_))
        ));
    }
}

#[test]
fn test_rejected_transition_leaves_order_untouched() {
    let c = catalog();
    let sm = ManufacturingOrderStateMachine::new(&c.store, MoWorkflowConfig::default());
    let order = new_order(&c, 1.0);
    let confirmed = sm.advance(&order).unwrap();
    let snapshot = confirmed.clone();

    assert!(matches!(
        sm.set_quantity(&confirmed, 50.0),
        Err(MoError::OrderLocked { .. })
    ));
    assert!(matches!(
        sm.apply(
            &confirmed,
            MoAction::Relink {
                product_id: c.dough.id.to_string(),
                bom_id: c.dough_bom.id.to_string(),
            }
        ),
        Err(MoError::OrderLocked { .. })
    ));
    assert_eq!(confirmed, snapshot);
}

#[test]
fn test_relink_to_foreign_bom_is_mismatch() {
    let c = catalog();
    let sm = ManufacturingOrderStateMachine::new(&c.store, MoWorkflowConfig::default());
    let order = new_order(&c, 1.0);

    assert!(matches!(
        sm.relink(&order, &c.gyoza.id.to_string(), &c.dough_bom.id.to_string()),
        Err(MoError::BomMismatch { .. })
    ));
}

#[test]
fn test_concurrent_transitions_one_wins() {
    let c = catalog();
    let sm = ManufacturingOrderStateMachine::new(&c.store, MoWorkflowConfig::default());
    let order = new_order(&c, 1.0);

    // Two callers read the same snapshot
    let advanced = sm.advance(&order).unwrap();
    let cancelled = sm.cancel(&order).unwrap();

    c.store.persist_manufacturing_order(&advanced).unwrap();
    assert!(matches!(
        c.store.persist_manufacturing_order(&cancelled),
        Err(StoreError::RevisionConflict { .. })
    ));

    let stored = c.store.fetch_manufacturing_order(&order.id.to_string()).unwrap();
    assert_eq!(stored.state, MoState::Confirmed);
    assert_eq!(stored.status, MoStatus::Process);
}

#[test]
fn test_cyclic_bom_surfaces_through_order() {
    let a = material("A", 1);
    let b = material("B", 1);
    let bom_a = BillOfMaterials::new(a.id.to_string(), "test".to_string())
        .with_component(b.id.to_string(), 1.0);
    let bom_b = BillOfMaterials::new(b.id.to_string(), "test".to_string())
        .with_component(a.id.to_string(), 1.0);
    let store = MemoryStore::new()
        .with_material(a.clone())
        .with_material(b)
        .with_bom(bom_a.clone())
        .with_bom(bom_b);

    let sm = ManufacturingOrderStateMachine::new(&store, MoWorkflowConfig::default());
    let result = sm.create(CreateOrder {
        product_id: a.id.to_string(),
        bom_id: bom_a.id.to_string(),
        qty: 1.0,
        reference: None,
        author: "test".to_string(),
    });
    assert!(matches!(result, Err(MoError::CyclicBomReference { .. })));
}

#[test]
fn test_out_of_range_cost_is_an_error() {
    let c = catalog();
    c.store.insert_material({
        let mut meat = c.meat.clone();
        meat.unit_cost = Decimal::from(1_000_000_000i64);
        meat
    });

    assert!(matches!(
        compute_breakdown_with(&c.store, &c.top, 1e21),
        Err(CostError::Overflow { .. })
    ));

    let sm = ManufacturingOrderStateMachine::new(&c.store, MoWorkflowConfig::default());
    let result = sm.create(CreateOrder {
        product_id: c.gyoza.id.to_string(),
        bom_id: c.top.id.to_string(),
        qty: 1e21,
        reference: None,
        author: "test".to_string(),
    });
    assert!(matches!(result, Err(MoError::Overflow { .. })));
}
