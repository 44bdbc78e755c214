//! Edge cases: relocation-buffer spill, deadline interruption, and heap
//! growth under the escalation ladder.

mod common;

use common::{context_with, test_config, walk_heap, BLOCK_TAG};
use ome_rt::object;
use ome_rt::{CollectOutcome, RuntimeConfig, Value};

/// Alternating dead/live pairs force one relocation entry per survivor, so
/// enough pairs overflow the bounded relocation buffer mid-compaction.
/// A 64 KB heap has a 256-entry buffer; 700 movers flush it twice.
#[test]
fn test_relocation_buffer_spill() {
    let mut ctx = context_with(RuntimeConfig {
        // Large enough that building 700 pairs does not trigger an early
        // cycle, small enough to keep the relocation buffer tiny.
        initial_heap_size: 0x10000,
        max_heap_size: 64 * 1024 * 1024,
        stack_size: 1024,
        ..Default::default()
    });
    const PAIRS: usize = 700;
    let frame = ctx.push_frame(PAIRS).unwrap();

    for i in 0..PAIRS {
        // Dead filler first, so every survivor has to move.
        let dead = ctx.allocate_data(8);
        assert!(dead > 0);
        let live = ctx.allocate_slots(1);
        unsafe {
            object::set_slot(live, 0, Value::integer(i as i64));
        }
        ctx.set_stack_slot(frame + i, Value::pointer(BLOCK_TAG, live));
    }
    let used_before = ctx.heap.used();

    ctx.collect_full();

    assert!(ctx.heap.used() < used_before, "dead fillers not reclaimed");
    let mut addresses = std::collections::HashSet::new();
    for i in 0..PAIRS {
        let value = ctx.stack_slot(frame + i);
        assert!(value.is_pointer());
        let body = value.untag_pointer();
        assert!(addresses.insert(body), "object visited twice: {:#x}", body);
        unsafe {
            assert_eq!(object::slot(body, 0), Value::integer(i as i64));
        }
    }
    walk_heap(&ctx);
}

#[test]
fn test_zero_deadline_interrupts_marking() {
    let mut ctx = context_with(RuntimeConfig {
        latency_ms: 0,
        ..test_config()
    });
    let frame = ctx.push_frame(1).unwrap();
    common::build_chain(&mut ctx, frame, 2000);

    let outcome = ctx.collect();
    assert_eq!(outcome, CollectOutcome::Interrupted);

    // Nothing moved: the heap stays traversable and the graph intact.
    walk_heap(&ctx);
    common::assert_chain(&ctx, frame, 2000);
}

#[test]
fn test_interrupted_cycle_then_full_collect_recovers_everything() {
    let mut ctx = context_with(RuntimeConfig {
        latency_ms: 0,
        ..test_config()
    });
    let frame = ctx.push_frame(2).unwrap();

    common::build_chain(&mut ctx, frame, 1500);
    common::build_chain(&mut ctx, frame + 1, 500);
    ctx.set_stack_slot(frame + 1, Value::FALSE);

    assert_eq!(ctx.collect(), CollectOutcome::Interrupted);

    // The full collection recovers exactly what a single full collection
    // would have: a second one finds nothing more to move or free.
    ctx.collect_full();
    let pointer_after = ctx.heap.pointer();
    common::assert_chain(&ctx, frame, 1500);

    ctx.collect_full();
    assert_eq!(ctx.heap.pointer(), pointer_after);
    common::assert_chain(&ctx, frame, 1500);
    walk_heap(&ctx);
}

#[test]
fn test_empty_reachable_set_with_expired_deadline_skips_compaction() {
    let mut ctx = context_with(RuntimeConfig {
        latency_ms: 0,
        ..test_config()
    });
    // No roots: marking drains instantly, the expired deadline then skips
    // compaction.
    let garbage = ctx.allocate_data(64);
    assert!(garbage > 0);
    assert_eq!(ctx.collect(), CollectOutcome::SkippedCompact);
}

#[test]
fn test_heap_grows_within_reservation() {
    let mut ctx = context_with(RuntimeConfig {
        initial_heap_size: 0x10000,
        max_heap_size: 16 * 1024 * 1024,
        stack_size: 64,
        ..Default::default()
    });
    let frame = ctx.push_frame(1).unwrap();
    let initial_size = ctx.heap.size();

    // ~1.5 MB of live links cannot fit in 64 KB; the ladder must grow the
    // heap rather than abort, and the graph must survive the resizes.
    common::build_chain(&mut ctx, frame, 32_000);

    assert!(ctx.heap.size() > initial_size);
    assert!(ctx.heap.size() <= ctx.heap.reserved_size());
    common::assert_chain(&ctx, frame, 32_000);
}

#[test]
fn test_descriptor_table_growth_pushes_free_limit_down() {
    let mut ctx = context_with(test_config());
    let frame = ctx.push_frame(8).unwrap();

    // Eight live big objects leave eight descriptors between the bump
    // region and limit.
    for i in 0..8 {
        let body = ctx.allocate(256 * 1024, 0, 0);
        ctx.set_stack_slot(frame + i, Value::pointer(BLOCK_TAG, body));
    }
    assert_eq!(ctx.heap.big_object_count(), 8);

    ctx.collect_full();
    assert_eq!(ctx.heap.big_object_count(), 8);
    for i in 0..8 {
        assert!(ctx.stack_slot(frame + i).is_pointer());
    }
}
