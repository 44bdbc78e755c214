//! Stress workloads: large object graphs built under continuous
//! incremental collection pressure.

mod common;

use common::{assert_chain, build_chain, test_context, walk_heap};
use ome_rt::Value;

#[test]
fn test_hundred_thousand_link_chain() {
    let mut ctx = test_context();
    let frame = ctx.push_frame(1).unwrap();

    // Grows the heap from 64 KB through several resizes and dozens of
    // incremental cycles; every link must survive with its fields intact.
    build_chain(&mut ctx, frame, 100_000);
    ctx.collect_full();

    assert_chain(&ctx, frame, 100_000);
    walk_heap(&ctx);
}

#[test]
fn test_repeated_build_and_drop_cycles() {
    let mut ctx = test_context();
    let frame = ctx.push_frame(1).unwrap();

    for round in 0..20 {
        build_chain(&mut ctx, frame, 2000);
        assert_chain(&ctx, frame, 2000);
        ctx.set_stack_slot(frame, Value::FALSE);
        if round % 3 == 0 {
            ctx.collect();
        }
    }

    ctx.collect_full();
    assert_eq!(ctx.heap.used(), 0, "dropped chains kept space alive");
}

#[test]
fn test_interleaved_live_and_dead_chains() {
    let mut ctx = test_context();
    let keep = ctx.push_frame(2).unwrap();
    let scratch = keep + 1;

    build_chain(&mut ctx, keep, 5000);
    for _ in 0..10 {
        build_chain(&mut ctx, scratch, 1000);
        ctx.set_stack_slot(scratch, Value::FALSE);
        assert_chain(&ctx, keep, 5000);
    }

    ctx.collect_full();
    assert_chain(&ctx, keep, 5000);
    walk_heap(&ctx);
}

#[test]
fn test_incremental_cycles_keep_heap_consistent() {
    let mut ctx = test_context();
    let frame = ctx.push_frame(1).unwrap();

    build_chain(&mut ctx, frame, 4000);
    for _ in 0..5 {
        ctx.collect();
        assert_chain(&ctx, frame, 4000);
    }
}
