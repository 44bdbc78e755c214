//! Shared fixtures for the runtime integration tests.

#![allow(dead_code)]

use ome_rt::heap::header::{is_header_aligned, Header, HEADER_SIZE};
use ome_rt::object;
use ome_rt::{Context, RuntimeConfig, Value};

/// Tag for test block objects; any pointer-class tag works for the
/// collector.
pub const BLOCK_TAG: u64 = 4;

/// Fields per chain link: next, two integer payloads, and a spare.
pub const LINK_FIELDS: usize = 4;

pub fn test_config() -> RuntimeConfig {
    RuntimeConfig {
        initial_heap_size: 0x10000,
        max_heap_size: 64 * 1024 * 1024,
        stack_size: 2048,
        ..Default::default()
    }
}

pub fn test_context() -> Context {
    Context::new(test_config()).expect("context should stand up")
}

pub fn context_with(config: RuntimeConfig) -> Context {
    Context::new(config).expect("context should stand up")
}

/// Build a linked chain of `len` block objects rooted in operand slot
/// `slot_index`, newest link first. Every link carries its index and its
/// doubled index as integer payloads.
///
/// The head is re-read from the operand stack after every allocation,
/// since an allocation may compact the heap and move the links.
pub fn build_chain(ctx: &mut Context, slot_index: usize, len: usize) {
    ctx.set_stack_slot(slot_index, Value::FALSE);
    for i in 0..len {
        let body = ctx.allocate_slots(LINK_FIELDS);
        let head = ctx.stack_slot(slot_index);
        unsafe {
            object::set_slot(body, 0, head);
            object::set_slot(body, 1, Value::integer(i as i64));
            object::set_slot(body, 2, Value::integer(2 * i as i64));
            object::set_slot(body, 3, Value::FALSE);
        }
        ctx.set_stack_slot(slot_index, Value::pointer(BLOCK_TAG, body));
    }
}

/// Walk the chain rooted at `slot_index`, checking payload fields, and
/// return every link's body address, newest link first.
pub fn chain_addresses(ctx: &Context, slot_index: usize) -> Vec<usize> {
    let mut addresses = Vec::new();
    let mut cur = ctx.stack_slot(slot_index);
    while cur != Value::FALSE {
        assert!(cur.is_pointer(), "chain link is not a pointer: {:?}", cur);
        let body = cur.untag_pointer();
        addresses.push(body);
        cur = unsafe { object::slot(body, 0) };
    }
    let len = addresses.len();
    for (pos, &body) in addresses.iter().enumerate() {
        let index = (len - 1 - pos) as i64;
        unsafe {
            assert_eq!(object::slot(body, 1), Value::integer(index));
            assert_eq!(object::slot(body, 2), Value::integer(2 * index));
            assert_eq!(object::slot(body, 3), Value::FALSE);
        }
    }
    addresses
}

/// Assert the chain has `len` distinct links with intact payloads.
pub fn assert_chain(ctx: &Context, slot_index: usize, len: usize) {
    let addresses = chain_addresses(ctx, slot_index);
    assert_eq!(addresses.len(), len, "chain length changed");
    let distinct: std::collections::HashSet<usize> = addresses.iter().copied().collect();
    assert_eq!(distinct.len(), len, "chain links alias each other");
}

/// Walk the heap as a header chain from base to pointer, asserting the
/// alignment, non-overlap, and zeroed-mark-link invariants. Returns the
/// non-padding object count.
pub fn walk_heap(ctx: &Context) -> usize {
    let mut objects = 0;
    let mut cur = ctx.heap.base();
    let end = ctx.heap.pointer();
    while cur < end {
        let header = unsafe { *(cur as *const Header) };
        if !header.is_padding() {
            assert!(
                is_header_aligned(cur),
                "misaligned header at {:#x}",
                cur
            );
            objects += 1;
        }
        assert_eq!(header.mark_next(), 0, "stale mark link at {:#x}", cur);
        cur += (header.size() + 1) * HEADER_SIZE;
    }
    assert_eq!(cur, end, "header chain overshoots the bump pointer");
    objects
}
