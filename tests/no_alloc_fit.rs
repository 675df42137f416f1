use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicUsize, Ordering};

use cogni::{Activation, Dataset, FitConfig, Init, Network, NetworkBuilder};

/// Counts allocation events (fresh allocations and reallocations) process-wide.
struct CountingAlloc {
    events: AtomicUsize,
    bytes: AtomicUsize,
}

unsafe impl GlobalAlloc for CountingAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        self.record(layout.size());
        unsafe { System.alloc(layout) }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        self.record(layout.size());
        unsafe { System.alloc_zeroed(layout) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        self.record(new_size);
        unsafe { System.realloc(ptr, layout, new_size) }
    }
}

impl CountingAlloc {
    fn record(&self, size: usize) {
        self.events.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(size, Ordering::Relaxed);
    }

    fn reset(&self) {
        self.events.store(0, Ordering::Relaxed);
        self.bytes.store(0, Ordering::Relaxed);
    }

    /// `(events, bytes)` since the last reset.
    fn counts(&self) -> (usize, usize) {
        (
            self.events.load(Ordering::Relaxed),
            self.bytes.load(Ordering::Relaxed),
        )
    }
}

#[global_allocator]
static ALLOC: CountingAlloc = CountingAlloc {
    events: AtomicUsize::new(0),
    bytes: AtomicUsize::new(0),
};

fn make_dataset(len: usize, input_dim: usize, target_dim: usize) -> Dataset {
    let inputs = vec![0.1_f32; len * input_dim];
    let targets = vec![0.0_f32; len * target_dim];
    Dataset::from_flat(inputs, targets, input_dim, target_dim).unwrap()
}

fn network(input_dim: usize, hidden: usize, output_dim: usize) -> Network {
    NetworkBuilder::new(input_dim)
        .unwrap()
        .init(Init::Xavier)
        .unwrap()
        .add_layer(hidden, Activation::LeakyReLU)
        .unwrap()
        .add_layer(hidden, Activation::Sigmoid)
        .unwrap()
        .add_layer(output_dim, Activation::Identity)
        .unwrap()
        .build_with_seed(0)
        .unwrap()
}

// One test per binary: the counter is process-wide, so a second test running on another
// thread would pollute the counts.
#[test]
fn training_does_not_allocate_per_step() {
    fit_allocations_do_not_depend_on_step_count();
    train_step_is_allocation_free();
}

fn fit_allocations_do_not_depend_on_step_count() {
    let input_dim = 32;
    let hidden = 64;
    let output_dim = 8;

    let base = network(input_dim, hidden, output_dim);
    let train_small = make_dataset(4, input_dim, output_dim);
    let train_large = make_dataset(4 * 64, input_dim, output_dim);

    let cfg = FitConfig {
        epochs: 3,
        learning_rate: 1e-3,
        log_every: 0,
    };

    let mut net_small = base.clone();
    ALLOC.reset();
    net_small.fit(&train_small, &cfg).unwrap();
    let small = ALLOC.counts();

    let mut net_large = base;
    ALLOC.reset();
    net_large.fit(&train_large, &cfg).unwrap();
    let large = ALLOC.counts();

    assert_eq!(
        small.0, large.0,
        "allocation events should not depend on the number of steps: \
         small (events, bytes) = {small:?}, large = {large:?}"
    );
}

fn train_step_is_allocation_free() {
    let mut net = network(4, 8, 2);
    let input = [0.5_f32, -0.25, 1.0, 0.0];
    let target = [1.0_f32, 0.0];
    let mut d_output = [0.0_f32; 2];

    net.train_step(&input, &target, 1e-2, &mut d_output);

    ALLOC.reset();
    for _ in 0..100 {
        net.train_step(&input, &target, 1e-2, &mut d_output);
    }
    assert_eq!(ALLOC.counts(), (0, 0));
}
