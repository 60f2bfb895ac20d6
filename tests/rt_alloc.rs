use acqring::harness::SyntheticStream;
use acqring::{ColumnMetadata, DataBuffer, SampleBlock, SourceNode, TtlEvent};
use std::alloc::{GlobalAlloc, Layout};
use std::cell::RefCell;

thread_local! {
    static ALLOC_COUNT: RefCell<usize> = const { RefCell::new(0) };
}

struct CountingAllocator;

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let _ = ALLOC_COUNT.try_with(|c| *c.borrow_mut() += 1);
        unsafe { std::alloc::System.alloc(layout) }
    }
    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { std::alloc::System.dealloc(ptr, layout) }
    }
}

#[global_allocator]
static A: CountingAllocator = CountingAllocator;

fn allocations() -> usize {
    ALLOC_COUNT.with(|c| *c.borrow())
}

#[test]
fn rt_alloc_invariant() {
    let (mut writer, mut reader) = DataBuffer::new(8, 1024).unwrap().split();
    let mut stream = SyntheticStream::new(8, 30_000.0).with_ttl_period(5);
    // Pre-generate one batch so the harness buffers are already sized.
    let (samples, numbers, stamps, codes) = stream.next_batch(64);
    let (samples, numbers, stamps, codes) =
        (samples.to_vec(), numbers.to_vec(), stamps.to_vec(), codes.to_vec());
    let mut block = SampleBlock::new(8, 64);
    let mut meta = ColumnMetadata::with_capacity(64);

    let after_new = allocations();
    for _ in 0..10_000 {
        writer.add_to_buffer(&samples, &numbers, &stamps, &codes);
        reader.read_all_from_buffer(&mut block, &mut meta, 64);
    }
    assert_eq!(allocations(), after_new, "add/read should not allocate");
}

#[test]
fn source_process_does_not_allocate() {
    let (mut writer, reader) = DataBuffer::new(4, 512).unwrap().split();
    let mut node = SourceNode::new(32);
    node.add_stream(reader, 4, 8);
    let mut stream = SyntheticStream::new(4, 30_000.0).with_ttl_period(3);
    stream.write_batch(&mut writer, 32);
    let mut block = SampleBlock::new(node.total_channels(), 32);
    let mut events: Vec<TtlEvent> = Vec::with_capacity(1024);

    let after_setup = allocations();
    for _ in 0..100 {
        node.process(&mut block, &mut events);
        events.clear();
    }
    assert_eq!(allocations(), after_setup, "process should not allocate");
}
